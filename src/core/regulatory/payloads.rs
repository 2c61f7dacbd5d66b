//! Typed tool payloads.
//!
//! Regulatory tools answer in slightly different shapes (`fdaApproved` vs
//! `approved`, a bare array vs `{"results": [...]}`). Everything is decoded
//! here, once, into the types below.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::adapters::ToolError;
use crate::domain::validation::lenient_string_list;

/// GRAS classification of an ingredient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrasStatus {
    Gras,
    NotGras,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for GrasStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(serde_json::Value::Bool(true)) => Self::Gras,
            Some(serde_json::Value::Bool(false)) => Self::NotGras,
            Some(serde_json::Value::String(s)) => {
                let s = s.to_lowercase().replace(['-', ' '], "_");
                match s.as_str() {
                    "gras" | "yes" | "true" | "generally_recognized_as_safe" | "affirmed" => Self::Gras,
                    "not_gras" | "no" | "false" | "not_listed" => Self::NotGras,
                    _ => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        })
    }
}

/// Result for one ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientCheck {
    #[serde(alias = "name")]
    pub ingredient: String,

    #[serde(default, alias = "fda_approved", alias = "approved")]
    pub fda_approved: bool,

    #[serde(default, alias = "gras_status", alias = "gras")]
    pub gras_status: GrasStatus,

    #[serde(default, deserialize_with = "lenient_string_list", alias = "safetyWarnings")]
    pub warnings: Vec<String>,
}

/// Result for one additive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditiveCheck {
    #[serde(alias = "name", alias = "ingredient")]
    pub additive: String,

    /// `approved`, `gras`, `restricted`, `prohibited` or `unknown`
    #[serde(default = "unknown_status")]
    pub status: String,

    #[serde(default)]
    pub notes: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl AdditiveCheck {
    pub fn is_prohibited(&self) -> bool {
        matches!(self.status.as_str(), "prohibited" | "banned" | "not_approved")
    }

    pub fn is_restricted(&self) -> bool {
        self.status == "restricted"
    }

    pub fn is_permitted(&self) -> bool {
        matches!(self.status.as_str(), "approved" | "gras")
    }
}

/// Result for one claim; `is_valid: None` means the tool could not verify it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCheck {
    pub claim: String,

    #[serde(default, alias = "valid", alias = "is_valid")]
    pub is_valid: Option<bool>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub threshold: Option<String>,
}

/// Allergen declaration check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllergenReport {
    #[serde(deserialize_with = "lenient_string_list", alias = "detected")]
    pub detected_allergens: Vec<String>,

    #[serde(deserialize_with = "lenient_string_list", alias = "declared")]
    pub declared_allergens: Vec<String>,

    #[serde(
        deserialize_with = "lenient_string_list",
        alias = "missingDeclarations",
        alias = "undeclared"
    )]
    pub undeclared_allergens: Vec<String>,
}

/// Decode a list payload that is either a bare array or an object holding one
pub fn decode_list<T: DeserializeOwned>(
    payload: serde_json::Value,
    keys: &[&str],
) -> Result<Vec<T>, ToolError> {
    let list = match payload {
        serde_json::Value::Array(_) => payload,
        serde_json::Value::Object(mut map) => keys
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(value @ serde_json::Value::Array(_)) => Some(value),
                _ => None,
            })
            .ok_or_else(|| {
                ToolError::Malformed(format!("payload has none of the keys: {}", keys.join(", ")))
            })?,
        other => {
            return Err(ToolError::Malformed(format!(
                "expected a list payload, got {}",
                other
            )))
        }
    };

    serde_json::from_value(list).map_err(|e| ToolError::Malformed(e.to_string()))
}

/// Decode an object payload
pub fn decode_object<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, ToolError> {
    if !payload.is_object() {
        return Err(ToolError::Malformed(format!("expected an object payload, got {}", payload)));
    }
    serde_json::from_value(payload).map_err(|e| ToolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ingredient_shapes() {
        let canonical = json!({"results": [
            {"ingredient": "water", "fdaApproved": true, "grasStatus": "GRAS", "warnings": []}
        ]});
        let variant = json!([
            {"name": "red 40", "approved": true, "gras": false, "safetyWarnings": "Artificial color"}
        ]);

        let a: Vec<IngredientCheck> = decode_list(canonical, &["results", "ingredients"]).unwrap();
        assert_eq!(a[0].ingredient, "water");
        assert!(a[0].fda_approved);
        assert_eq!(a[0].gras_status, GrasStatus::Gras);

        let b: Vec<IngredientCheck> = decode_list(variant, &["results"]).unwrap();
        assert_eq!(b[0].ingredient, "red 40");
        assert_eq!(b[0].gras_status, GrasStatus::NotGras);
        assert_eq!(b[0].warnings, vec!["Artificial color"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let checks: Vec<IngredientCheck> = decode_list(json!([{"ingredient": "mystery"}]), &[]).unwrap();
        assert!(!checks[0].fda_approved);
        assert_eq!(checks[0].gras_status, GrasStatus::Unknown);
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_list::<IngredientCheck>(json!({"other": []}), &["results"]).is_err());
        assert!(decode_list::<IngredientCheck>(json!("nope"), &["results"]).is_err());
        assert!(decode_object::<AllergenReport>(json!([1])).is_err());
    }

    #[test]
    fn test_claim_and_allergen_aliases() {
        let claims: Vec<ClaimCheck> =
            decode_list(json!({"claims": [{"claim": "low fat", "valid": false, "reason": "too much"}]}), &["results", "claims"]).unwrap();
        assert_eq!(claims[0].is_valid, Some(false));

        let report: AllergenReport =
            decode_object(json!({"detected": ["milk"], "missingDeclarations": ["milk"]})).unwrap();
        assert_eq!(report.undeclared_allergens, vec!["milk"]);
        assert!(report.declared_allergens.is_empty());
    }
}
