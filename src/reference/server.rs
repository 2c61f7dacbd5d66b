//! Line-oriented JSON-RPC server for the reference regulatory tools.
//!
//! Reads one request per stdin line and writes one response per stdout line.
//! Logs never go to stdout.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::rules;
use crate::adapters::tool_protocol::{
    JsonRpcRequest, JsonRpcResponse, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
};
use crate::adapters::ToolName;
use crate::core::regulatory::nutrition::Amount;
use crate::domain::validation::lenient_string_list;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ToolArguments {
    #[serde(deserialize_with = "lenient_string_list")]
    ingredients: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list")]
    additives: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list")]
    claims: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list", alias = "allergens")]
    declared_allergens: Vec<String>,

    nutritional_data: BTreeMap<String, Value>,
}

impl ToolArguments {
    /// Readable amounts only; an unreadable value counts as not provided
    fn nutrition(&self) -> BTreeMap<String, Amount> {
        self.nutritional_data
            .iter()
            .filter_map(|(k, v)| {
                let amount = serde_json::from_value::<Amount>(v.clone()).ok()?;
                Some((k.clone(), amount))
            })
            .collect()
    }
}

fn tool_descriptions() -> Value {
    let tools: Vec<Value> = ToolName::ALL
        .iter()
        .map(|tool| {
            let description = match tool {
                ToolName::ValidateIngredients => "FDA approval, GRAS status and warnings per ingredient",
                ToolName::CheckAdditiveStatus => "Regulatory status of food additives",
                ToolName::ValidateNutritionalClaims => "Nutrient content claims against per-serving thresholds",
                ToolName::CheckAllergenRequirements => "Detected major allergens versus declared allergens",
            };
            json!({ "name": tool.as_str(), "description": description })
        })
        .collect();
    json!({ "tools": tools })
}

fn run_tool(tool: ToolName, args: &ToolArguments) -> Value {
    match tool {
        ToolName::ValidateIngredients => rules::validate_ingredients(&args.ingredients),
        ToolName::CheckAdditiveStatus => rules::check_additive_status(&args.additives),
        ToolName::ValidateNutritionalClaims => {
            rules::validate_nutritional_claims(&args.claims, &args.nutrition())
        }
        ToolName::CheckAllergenRequirements => {
            rules::check_allergen_requirements(&args.ingredients, &args.declared_allergens)
        }
    }
}

/// Answer one request line
pub fn handle_request(line: &str) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return JsonRpcResponse::rpc_error(Value::Null, PARSE_ERROR, format!("parse error: {}", e)),
    };
    let id = json!(request.id);

    match request.method.as_str() {
        METHOD_TOOLS_LIST => JsonRpcResponse::tool_result(id, &tool_descriptions()),
        METHOD_TOOLS_CALL => {
            let Some(params) = request.params else {
                return JsonRpcResponse::rpc_error(id, INVALID_PARAMS, "missing params");
            };
            let tool: ToolName = match params.name.parse() {
                Ok(tool) => tool,
                Err(e) => return JsonRpcResponse::rpc_error(id, INVALID_PARAMS, e),
            };
            let args: ToolArguments = if params.arguments.is_null() {
                ToolArguments::default()
            } else {
                match serde_json::from_value(params.arguments) {
                    Ok(args) => args,
                    Err(e) => {
                        return JsonRpcResponse::tool_failure(id, format!("invalid arguments: {}", e))
                    }
                }
            };

            debug!(tool = %tool, "Running tool");
            JsonRpcResponse::tool_result(id, &run_tool(tool, &args))
        }
        other => JsonRpcResponse::rpc_error(id, METHOD_NOT_FOUND, format!("unknown method '{}'", other)),
    }
}

/// Serve requests line by line until the input closes
pub fn serve<R: BufRead, W: Write>(input: R, mut output: W) -> Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line.context("Failed to read request")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_request(&line);
        if response.error.is_some() {
            warn!(line = %line, "Rejected request");
        }
        let encoded = serde_json::to_string(&response).context("Failed to encode response")?;
        writeln!(output, "{}", encoded).context("Failed to write response")?;
        output.flush().context("Failed to flush response")?;
        handled += 1;
    }
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tool_protocol::decode_stdout;

    fn call(tool: ToolName, arguments: Value) -> Value {
        let request = JsonRpcRequest::tool_call(1, tool, arguments);
        let line = serde_json::to_string(&request).unwrap();
        handle_request(&line).into_payload().unwrap()
    }

    #[test]
    fn test_validate_ingredients_call() {
        let payload = call(ToolName::ValidateIngredients, json!({"ingredients": ["water", "salt"]}));
        assert_eq!(payload["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_claims_accept_string_amounts() {
        let payload = call(
            ToolName::ValidateNutritionalClaims,
            json!({"claims": ["low sodium"], "nutritionalData": {"sodium": "120 mg"}}),
        );
        assert_eq!(payload["results"][0]["isValid"], true);
    }

    #[test]
    fn test_claims_accept_bounded_amounts() {
        let payload = call(
            ToolName::ValidateNutritionalClaims,
            json!({
                "claims": ["sodium free", "fat free"],
                "nutritionalData": {"sodium": {"amount": 5, "lessThan": true}, "totalFat": "<0.5g"}
            }),
        );
        assert_eq!(payload["results"][0]["isValid"], true);
        assert_eq!(payload["results"][1]["isValid"], true);
    }

    #[test]
    fn test_protocol_errors() {
        let garbage = handle_request("not json");
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);

        let unknown = handle_request(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"launch_rockets","arguments":{}}}"#,
        );
        assert_eq!(unknown.error.unwrap().code, INVALID_PARAMS);

        let method = handle_request(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#);
        assert_eq!(method.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_serve_answers_each_line() {
        let request = JsonRpcRequest::tool_call(7, ToolName::CheckAllergenRequirements, json!({
            "ingredients": ["peanuts"],
            "declaredAllergens": []
        }));
        let input = format!("{}\n\n{}", request.to_line().unwrap(), r#"{"jsonrpc":"2.0","id":8,"method":"tools/list"}"#);
        let mut output = Vec::new();

        let handled = serve(input.as_bytes(), &mut output).unwrap();

        assert_eq!(handled, 2);
        let stdout = String::from_utf8(output).unwrap();
        let tools = decode_stdout(&stdout).unwrap();
        assert_eq!(tools["tools"].as_array().unwrap().len(), 4);
        let first = stdout.lines().next().unwrap();
        let allergens = crate::adapters::tool_protocol::decode_response(first).unwrap();
        assert_eq!(allergens["undeclaredAllergens"], json!(["peanuts"]));
    }
}
