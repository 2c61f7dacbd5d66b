//! Regulatory cross-check stage.
//!
//! Sends extracted ingredients and claims to the regulatory tool service and
//! normalizes the answers into findings. Tool failures become WARNING findings
//! tagged with the tool name; the stage itself never fails.

pub mod nutrition;
pub mod payloads;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::adapters::{ToolClient, ToolError, ToolName};
use crate::domain::{Finding, FindingSet, Severity, StructuredLabel};

pub use payloads::{AdditiveCheck, AllergenReport, ClaimCheck, GrasStatus, IngredientCheck};

pub const SOURCE: &str = "regulatory";

const NO_INGREDIENTS_MESSAGE: &str = "No ingredients to validate";

/// What the stage checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulatoryInput {
    pub ingredients: Vec<String>,
    pub claims: Vec<String>,
    pub allergens: Vec<String>,
    pub nutritional_info: BTreeMap<String, String>,
    pub regulations: Vec<String>,
}

impl RegulatoryInput {
    pub fn from_label(label: &StructuredLabel, regulations: &[String]) -> Self {
        Self {
            ingredients: label.ingredients.clone(),
            claims: label.claims.clone(),
            allergens: label.allergens.clone(),
            nutritional_info: label.nutritional_info.clone(),
            regulations: regulations.to_vec(),
        }
    }
}

/// Aggregate counts for the summary finding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub approved: usize,
    pub total: usize,
    pub with_warnings: usize,
    pub claims_valid: usize,
    pub claims_total: usize,
}

/// Everything the stage learned in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegulatoryReport {
    /// Whether the tool service was called at all
    pub invoked: bool,
    pub ingredients: Vec<IngredientCheck>,
    pub claims: Vec<ClaimCheck>,
    pub additives: Vec<AdditiveCheck>,
    pub allergens: Option<AllergenReport>,
    pub summary: CheckSummary,
    pub findings: FindingSet,
    /// Tool name to failure message
    pub tool_failures: BTreeMap<String, String>,
    pub processing_time_ms: u64,
}

impl RegulatoryReport {
    pub fn is_degraded(&self) -> bool {
        !self.tool_failures.is_empty()
    }
}

/// Regulatory cross-check stage
pub struct RegulatoryStage {
    client: Arc<dyn ToolClient>,
}

impl RegulatoryStage {
    pub fn new(client: Arc<dyn ToolClient>) -> Self {
        Self { client }
    }

    pub fn transport_name(&self) -> &str {
        self.client.name()
    }

    /// Cross-check ingredients, additives, allergens and claims
    #[instrument(skip(self, input), fields(ingredients = input.ingredients.len(), claims = input.claims.len()))]
    pub async fn check(&self, input: &RegulatoryInput) -> RegulatoryReport {
        let start = Instant::now();
        let mut report = RegulatoryReport::default();

        if input.ingredients.is_empty() {
            report.findings.push(Finding::new(
                "no_ingredients",
                Severity::Info,
                NO_INGREDIENTS_MESSAGE,
                SOURCE,
                self.client.name(),
            ));
            report.processing_time_ms = start.elapsed().as_millis() as u64;
            return report;
        }

        report.invoked = true;
        let additives: Vec<&String> = input
            .ingredients
            .iter()
            .filter(|i| nutrition::looks_like_additive(i))
            .collect();

        let (ingredients, additive_status, allergens, claims) = tokio::join!(
            self.call(
                ToolName::ValidateIngredients,
                json!({ "ingredients": input.ingredients, "regulations": input.regulations }),
            ),
            async {
                if additives.is_empty() {
                    return None;
                }
                Some(
                    self.call(ToolName::CheckAdditiveStatus, json!({ "additives": additives }))
                        .await,
                )
            },
            self.call(
                ToolName::CheckAllergenRequirements,
                json!({ "ingredients": input.ingredients, "declaredAllergens": input.allergens }),
            ),
            async {
                if input.claims.is_empty() {
                    return None;
                }
                let data = nutrition::normalize(&input.nutritional_info);
                Some(
                    self.call(
                        ToolName::ValidateNutritionalClaims,
                        json!({ "claims": input.claims, "nutritionalData": data }),
                    )
                    .await,
                )
            },
        );

        match ingredients.and_then(|p| payloads::decode_list::<IngredientCheck>(p, &["results", "ingredients"])) {
            Ok(checks) => {
                ingredient_findings(&checks, &mut report.findings, &mut report.summary);
                report.ingredients = checks;
            }
            Err(e) => tool_failure(&mut report, ToolName::ValidateIngredients, e),
        }

        match additive_status.map(|r| r.and_then(|p| payloads::decode_list::<AdditiveCheck>(p, &["results", "additives"]))) {
            Some(Ok(checks)) => {
                additive_findings(&checks, &mut report.findings);
                report.additives = checks;
            }
            Some(Err(e)) => tool_failure(&mut report, ToolName::CheckAdditiveStatus, e),
            None => {}
        }

        match allergens.and_then(payloads::decode_object::<AllergenReport>) {
            Ok(allergen_report) => {
                allergen_findings(&allergen_report, &mut report.findings);
                report.allergens = Some(allergen_report);
            }
            Err(e) => tool_failure(&mut report, ToolName::CheckAllergenRequirements, e),
        }

        match claims.map(|r| r.and_then(|p| payloads::decode_list::<ClaimCheck>(p, &["results", "claims"]))) {
            Some(Ok(checks)) => {
                claim_findings(&checks, &mut report.findings, &mut report.summary);
                report.claims = checks;
            }
            Some(Err(e)) => tool_failure(&mut report, ToolName::ValidateNutritionalClaims, e),
            None => {}
        }

        if !report.ingredients.is_empty() {
            report.findings.push(summary_finding(&report.summary));
        }

        report.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            approved = report.summary.approved,
            total = report.summary.total,
            failures = report.tool_failures.len(),
            "Regulatory check complete"
        );
        report
    }

    async fn call(&self, tool: ToolName, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.client.call_tool(tool, arguments).await
    }
}

fn tool_failure(report: &mut RegulatoryReport, tool: ToolName, error: ToolError) {
    warn!(tool = %tool, error = %error, "Regulatory tool failed");

    let finding = if error.is_unavailable() {
        Finding::new(
            "service_unavailable",
            Severity::Warning,
            format!("Regulatory service temporarily unavailable ({}): {}", tool, error),
            SOURCE,
            tool.as_str(),
        )
    } else {
        Finding::new(
            "regulatory_tool_error",
            Severity::Warning,
            format!("Regulatory tool {} returned an unusable response: {}", tool, error),
            SOURCE,
            tool.as_str(),
        )
    };
    report.findings.push(finding);
    report.tool_failures.insert(tool.to_string(), error.to_string());
}

fn ingredient_findings(checks: &[IngredientCheck], set: &mut FindingSet, summary: &mut CheckSummary) {
    let tag = ToolName::ValidateIngredients.as_str();
    summary.total = checks.len();

    for check in checks {
        if check.fda_approved {
            summary.approved += 1;
            let gras = match check.gras_status {
                GrasStatus::Gras => " (GRAS)",
                _ => "",
            };
            set.recommend(
                Finding::new(
                    "approved_ingredient",
                    Severity::Info,
                    format!("{} is FDA approved{}", check.ingredient, gras),
                    SOURCE,
                    tag,
                )
                .with_ingredient(&check.ingredient),
            );
        } else {
            set.push(
                Finding::new(
                    "unapproved_ingredient",
                    Severity::Compliance,
                    format!("{} is not on the FDA approved list", check.ingredient),
                    SOURCE,
                    tag,
                )
                .with_ingredient(&check.ingredient),
            );
        }

        if !check.warnings.is_empty() {
            summary.with_warnings += 1;
        }
        for warning in &check.warnings {
            set.push(
                Finding::new(
                    "ingredient_warning",
                    Severity::Warning,
                    format!("{}: {}", check.ingredient, warning),
                    SOURCE,
                    tag,
                )
                .with_ingredient(&check.ingredient),
            );
        }
    }
}

fn additive_findings(checks: &[AdditiveCheck], set: &mut FindingSet) {
    let tag = ToolName::CheckAdditiveStatus.as_str();
    for check in checks {
        let note = check.notes.as_deref().map(|n| format!(": {}", n)).unwrap_or_default();
        let finding = if check.is_prohibited() {
            Finding::new(
                "prohibited_additive",
                Severity::Compliance,
                format!("{} is a prohibited additive{}", check.additive, note),
                SOURCE,
                tag,
            )
        } else if check.is_restricted() {
            Finding::new(
                "restricted_additive",
                Severity::Warning,
                format!("{} is a restricted additive{}", check.additive, note),
                SOURCE,
                tag,
            )
        } else if check.is_permitted() {
            set.recommend(
                Finding::new(
                    "permitted_additive",
                    Severity::Info,
                    format!("{} is a permitted additive", check.additive),
                    SOURCE,
                    tag,
                )
                .with_ingredient(&check.additive),
            );
            continue;
        } else {
            Finding::new(
                "unknown_additive",
                Severity::Info,
                format!("No status on record for additive {}", check.additive),
                SOURCE,
                tag,
            )
        };
        set.push(finding.with_ingredient(&check.additive));
    }
}

fn allergen_findings(report: &AllergenReport, set: &mut FindingSet) {
    let tag = ToolName::CheckAllergenRequirements.as_str();
    for allergen in &report.undeclared_allergens {
        set.push(
            Finding::new(
                "undeclared_allergen",
                Severity::Compliance,
                format!("Allergen {} is present but not declared in a Contains statement", allergen),
                SOURCE,
                tag,
            )
            .with_ingredient(allergen),
        );
    }
    if !report.detected_allergens.is_empty() && report.undeclared_allergens.is_empty() {
        set.recommend(Finding::new(
            "allergens_declared",
            Severity::Info,
            format!("All detected allergens are declared: {}", report.detected_allergens.join(", ")),
            SOURCE,
            tag,
        ));
    }
}

fn claim_findings(checks: &[ClaimCheck], set: &mut FindingSet, summary: &mut CheckSummary) {
    let tag = ToolName::ValidateNutritionalClaims.as_str();
    summary.claims_total = checks.len();

    for check in checks {
        let reason = check.reason.clone().unwrap_or_default();
        match check.is_valid {
            Some(true) => {
                summary.claims_valid += 1;
                set.recommend(
                    Finding::new(
                        "valid_claim",
                        Severity::Info,
                        format!("Claim '{}' is supported. {}", check.claim, reason).trim_end().to_string(),
                        SOURCE,
                        tag,
                    )
                    .with_claim(&check.claim),
                );
            }
            Some(false) => set.push(
                Finding::new(
                    "invalid_claim",
                    Severity::Compliance,
                    format!("Claim '{}' is not supported. {}", check.claim, reason).trim_end().to_string(),
                    SOURCE,
                    tag,
                )
                .with_claim(&check.claim),
            ),
            None => set.push(
                Finding::new(
                    "unverified_claim",
                    Severity::Warning,
                    format!("Claim '{}' could not be verified. {}", check.claim, reason).trim_end().to_string(),
                    SOURCE,
                    tag,
                )
                .with_claim(&check.claim),
            ),
        }
    }
}

fn summary_finding(summary: &CheckSummary) -> Finding {
    let mut message = format!(
        "{}/{} ingredients approved, {}/{} with warnings",
        summary.approved, summary.total, summary.with_warnings, summary.total
    );
    if summary.claims_total > 0 {
        message.push_str(&format!(
            ", {}/{} claims valid",
            summary.claims_valid, summary.claims_total
        ));
    }
    Finding::new(
        "regulatory_summary",
        Severity::Info,
        message,
        SOURCE,
        ToolName::ValidateIngredients.as_str(),
    )
}

/// Findings for a regulatory report
pub fn findings(report: &RegulatoryReport) -> FindingSet {
    report.findings.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers from a fixed table and records calls
    struct TableClient {
        answers: BTreeMap<&'static str, Result<serde_json::Value, ToolError>>,
        calls: Mutex<Vec<String>>,
    }

    impl TableClient {
        fn new(answers: Vec<(ToolName, Result<serde_json::Value, ToolError>)>) -> Self {
            Self {
                answers: answers.into_iter().map(|(t, a)| (t.as_str(), a)).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolClient for TableClient {
        fn name(&self) -> &str {
            "table"
        }

        async fn call_tool(
            &self,
            tool: ToolName,
            _arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            self.calls.lock().unwrap().push(tool.to_string());
            self.answers
                .get(tool.as_str())
                .cloned()
                .unwrap_or(Err(ToolError::EmptyOutput))
        }
    }

    fn input(ingredients: &[&str]) -> RegulatoryInput {
        RegulatoryInput {
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_ingredients_skip_tools() {
        let client = Arc::new(TableClient::new(vec![]));
        let stage = RegulatoryStage::new(client.clone());

        let report = stage.check(&input(&[])).await;

        assert!(!report.invoked);
        assert!(client.calls.lock().unwrap().is_empty());
        assert_eq!(report.findings.findings.len(), 1);
        assert_eq!(report.findings.findings[0].kind, "no_ingredients");
        assert_eq!(report.findings.findings[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_unapproved_and_warning_findings() {
        let client = Arc::new(TableClient::new(vec![
            (
                ToolName::ValidateIngredients,
                Ok(json!({"results": [
                    {"ingredient": "water", "fdaApproved": true, "grasStatus": "gras", "warnings": []},
                    {"ingredient": "unobtainium", "fdaApproved": false, "warnings": ["Not a food"]}
                ]})),
            ),
            (
                ToolName::CheckAllergenRequirements,
                Ok(json!({"detectedAllergens": [], "declaredAllergens": [], "undeclaredAllergens": []})),
            ),
        ]));
        let stage = RegulatoryStage::new(client);

        let report = stage.check(&input(&["water", "unobtainium"])).await;

        assert_eq!(report.summary.approved, 1);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.findings.count(Severity::Compliance), 1);
        assert_eq!(report.findings.count(Severity::Warning), 1);
        let unapproved = report
            .findings
            .findings
            .iter()
            .find(|f| f.kind == "unapproved_ingredient")
            .unwrap();
        assert_eq!(unapproved.ingredient.as_deref(), Some("unobtainium"));
        assert_eq!(unapproved.source_tag, "validate_ingredients");
        assert_eq!(report.findings.recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_service_unavailable() {
        let client = Arc::new(TableClient::new(vec![(
            ToolName::ValidateIngredients,
            Err(ToolError::Timeout {
                tool: "validate_ingredients".into(),
                timeout: std::time::Duration::from_secs(5),
            }),
        )]));
        let stage = RegulatoryStage::new(client);

        let report = stage.check(&input(&["water"])).await;

        let unavailable = report
            .findings
            .findings
            .iter()
            .find(|f| f.kind == "service_unavailable")
            .unwrap();
        assert_eq!(unavailable.severity, Severity::Warning);
        assert!(unavailable.message.contains("temporarily unavailable"));
        assert!(report.is_degraded());
        assert!(!report.findings.findings.iter().any(|f| f.kind == "regulatory_summary"));
    }

    #[tokio::test]
    async fn test_claims_only_checked_when_present() {
        let client = Arc::new(TableClient::new(vec![
            (ToolName::ValidateIngredients, Ok(json!([{"ingredient": "oats", "fdaApproved": true}]))),
            (ToolName::CheckAllergenRequirements, Ok(json!({}))),
            (
                ToolName::ValidateNutritionalClaims,
                Ok(json!([{"claim": "low fat", "isValid": false, "reason": "5g exceeds the 3g threshold"}])),
            ),
        ]));
        let stage = RegulatoryStage::new(client.clone());

        let mut with_claims = input(&["oats"]);
        with_claims.claims = vec!["low fat".into()];
        with_claims.nutritional_info.insert("Total Fat".into(), "5g".into());
        let report = stage.check(&with_claims).await;

        let calls = client.calls.lock().unwrap().clone();
        assert!(calls.contains(&"validate_nutritional_claims".to_string()));
        assert!(!calls.contains(&"check_additive_status".to_string()));
        let invalid = report.findings.findings.iter().find(|f| f.kind == "invalid_claim").unwrap();
        assert_eq!(invalid.claim.as_deref(), Some("low fat"));
        assert!(invalid.message.contains("3g"));
        assert_eq!(report.summary.claims_total, 1);
    }

    #[tokio::test]
    async fn test_additives_and_allergens() {
        let client = Arc::new(TableClient::new(vec![
            (ToolName::ValidateIngredients, Ok(json!([
                {"ingredient": "milk", "fdaApproved": true},
                {"ingredient": "red 3", "fdaApproved": true}
            ]))),
            (ToolName::CheckAdditiveStatus, Ok(json!([{"additive": "red 3", "status": "prohibited"}]))),
            (
                ToolName::CheckAllergenRequirements,
                Ok(json!({"detectedAllergens": ["milk"], "undeclaredAllergens": ["milk"]})),
            ),
        ]));
        let stage = RegulatoryStage::new(client);

        let report = stage.check(&input(&["milk", "red 3"])).await;

        let kinds: Vec<&str> = report.findings.findings.iter().map(|f| f.kind.as_str()).collect();
        assert!(kinds.contains(&"prohibited_additive"));
        assert!(kinds.contains(&"undeclared_allergen"));
        assert_eq!(report.findings.count(Severity::Compliance), 2);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_tool_error() {
        let client = Arc::new(TableClient::new(vec![
            (ToolName::ValidateIngredients, Ok(json!("not a list"))),
            (ToolName::CheckAllergenRequirements, Ok(json!({}))),
        ]));
        let stage = RegulatoryStage::new(client);

        let report = stage.check(&input(&["water"])).await;

        let error = report.findings.findings.iter().find(|f| f.kind == "regulatory_tool_error").unwrap();
        assert_eq!(error.severity, Severity::Warning);
        assert!(report.tool_failures.contains_key("validate_ingredients"));
    }
}
