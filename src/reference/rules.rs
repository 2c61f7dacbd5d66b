//! Embedded rule table for the reference regulatory tool server.
//!
//! A small, fixed subset of US food labeling rules. It exists so the pipeline
//! can run end to end without the real regulatory data service.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::core::regulatory::nutrition::{self, Amount};

/// Ingredients treated as approved and GRAS
const KNOWN_SAFE: &[&str] = &[
    "water", "salt", "sea salt", "sugar", "cane sugar", "brown sugar", "flour", "wheat flour",
    "enriched flour", "whole wheat flour", "rice", "rice flour", "oats", "whole grain oats",
    "corn", "cornstarch", "corn syrup", "milk", "skim milk", "cream", "butter", "eggs", "egg",
    "soybean oil", "canola oil", "olive oil", "sunflower oil", "palm oil", "vegetable oil",
    "yeast", "baking soda", "sodium bicarbonate", "baking powder", "vinegar", "honey",
    "cocoa", "cocoa butter", "vanilla", "vanilla extract", "natural flavor", "natural flavors",
    "citric acid", "ascorbic acid", "lecithin", "soy lecithin", "peanuts", "almonds", "tomatoes",
    "tomato paste", "garlic", "onion", "spices", "pectin", "gelatin", "whey", "cheese",
];

/// Major food allergens and the ingredient words that reveal them.
/// Words match whole words, singular or plural.
const ALLERGENS: &[(&str, &[&str])] = &[
    ("milk", &["milk", "buttermilk", "cream", "butter", "cheese", "whey", "casein", "lactose", "yogurt"]),
    ("eggs", &["egg", "albumin", "mayonnaise"]),
    ("fish", &["fish", "anchovy", "anchovies", "cod", "salmon", "tuna"]),
    ("shellfish", &["shrimp", "crab", "lobster", "shellfish"]),
    ("tree nuts", &["almond", "cashew", "walnut", "pecan", "hazelnut", "pistachio"]),
    ("peanuts", &["peanut"]),
    ("wheat", &["wheat", "flour", "semolina", "spelt", "durum"]),
    ("soybeans", &["soy", "soybean", "tofu"]),
    ("sesame", &["sesame", "tahini"]),
];

/// Phrases that contain an allergen word without containing the allergen
const ALLERGEN_EXCLUSIONS: &[(&str, &str)] = &[
    ("rice flour", "wheat"),
    ("corn flour", "wheat"),
    ("oat flour", "wheat"),
    ("coconut flour", "wheat"),
    ("almond flour", "wheat"),
    ("chickpea flour", "wheat"),
    ("cocoa butter", "milk"),
    ("peanut butter", "milk"),
    ("almond butter", "milk"),
    ("shea butter", "milk"),
    ("apple butter", "milk"),
    ("coconut milk", "milk"),
    ("coconut cream", "milk"),
    ("almond milk", "milk"),
    ("oat milk", "milk"),
    ("soy milk", "milk"),
    ("cream of tartar", "milk"),
];

/// Additive status: `approved`, `restricted` or `prohibited`, with a note
const ADDITIVES: &[(&str, &str, &str)] = &[
    ("red 40", "restricted", "Artificial color; requires declaration by name"),
    ("yellow 5", "restricted", "Artificial color; must be declared, may cause sensitivity"),
    ("yellow 6", "restricted", "Artificial color; requires declaration by name"),
    ("blue 1", "restricted", "Artificial color; requires declaration by name"),
    ("red 3", "prohibited", "Erythrosine is no longer authorized in food"),
    ("brominated vegetable oil", "prohibited", "No longer authorized in food"),
    ("sodium benzoate", "approved", "Preservative, GRAS at limited levels"),
    ("potassium sorbate", "approved", "Preservative"),
    ("sodium nitrite", "restricted", "Limited to cured meats"),
    ("aspartame", "restricted", "Requires phenylketonurics statement"),
    ("sucralose", "approved", "Sweetener"),
    ("carrageenan", "approved", "Thickener"),
    ("monosodium glutamate", "approved", "Flavor enhancer, GRAS"),
    ("titanium dioxide", "restricted", "Color additive; limited to 1% by weight"),
];

/// Nutrient content claim thresholds, per serving
#[derive(Debug, Clone, Copy)]
struct ClaimRule {
    claim: &'static str,
    nutrient: &'static str,
    limit: f64,
    unit: &'static str,
    kind: Bound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    AtMost,
    LessThan,
    AtLeast,
}

const CLAIM_RULES: &[ClaimRule] = &[
    ClaimRule { claim: "low fat", nutrient: "totalFat", limit: 3.0, unit: "g", kind: Bound::AtMost },
    ClaimRule { claim: "fat free", nutrient: "totalFat", limit: 0.5, unit: "g", kind: Bound::LessThan },
    ClaimRule { claim: "low sodium", nutrient: "sodium", limit: 140.0, unit: "mg", kind: Bound::AtMost },
    ClaimRule { claim: "very low sodium", nutrient: "sodium", limit: 35.0, unit: "mg", kind: Bound::AtMost },
    ClaimRule { claim: "sodium free", nutrient: "sodium", limit: 5.0, unit: "mg", kind: Bound::LessThan },
    ClaimRule { claim: "low calorie", nutrient: "calories", limit: 40.0, unit: "kcal", kind: Bound::AtMost },
    ClaimRule { claim: "calorie free", nutrient: "calories", limit: 5.0, unit: "kcal", kind: Bound::LessThan },
    ClaimRule { claim: "sugar free", nutrient: "totalSugars", limit: 0.5, unit: "g", kind: Bound::LessThan },
    ClaimRule { claim: "low cholesterol", nutrient: "cholesterol", limit: 20.0, unit: "mg", kind: Bound::AtMost },
    ClaimRule { claim: "cholesterol free", nutrient: "cholesterol", limit: 2.0, unit: "mg", kind: Bound::LessThan },
    ClaimRule { claim: "high fiber", nutrient: "dietaryFiber", limit: 5.0, unit: "g", kind: Bound::AtLeast },
    ClaimRule { claim: "good source of fiber", nutrient: "dietaryFiber", limit: 2.5, unit: "g", kind: Bound::AtLeast },
    ClaimRule { claim: "high protein", nutrient: "protein", limit: 10.0, unit: "g", kind: Bound::AtLeast },
];

impl ClaimRule {
    fn threshold(&self) -> String {
        let op = match self.kind {
            Bound::AtMost => "≤",
            Bound::LessThan => "<",
            Bound::AtLeast => "≥",
        };
        format!("{} {}{}{} per serving", self.nutrient, op, fmt_amount(self.limit), self.unit)
    }

    fn holds(&self, amount: Amount) -> bool {
        // "<X" means strictly below X, so it satisfies any upper bound at or above X
        match (self.kind, amount.less_than) {
            (Bound::AtMost, false) => amount.value <= self.limit,
            (Bound::LessThan, false) => amount.value < self.limit,
            (Bound::AtMost | Bound::LessThan, true) => amount.value <= self.limit,
            (Bound::AtLeast, false) => amount.value >= self.limit,
            (Bound::AtLeast, true) => false,
        }
    }

    fn measure(&self, amount: Amount) -> String {
        let prefix = if amount.less_than { "<" } else { "" };
        format!("{}{}{}", prefix, fmt_amount(amount.value), self.unit)
    }
}

fn fmt_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace("fd&c ", "")
        .replace("no. ", "")
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_matches(token: &str, word: &str) -> bool {
    token
        .strip_prefix(word)
        .is_some_and(|rest| matches!(rest, "" | "s" | "es"))
}

fn allergens_in(ingredient: &str) -> Vec<&'static str> {
    let name = normalize_name(ingredient);
    ALLERGENS
        .iter()
        .filter(|(allergen, words)| {
            let mut remaining = name.clone();
            for (phrase, excluded) in ALLERGEN_EXCLUSIONS {
                if excluded == allergen {
                    remaining = remaining.replace(phrase, " ");
                }
            }
            remaining
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| words.iter().any(|w| word_matches(token, w)))
        })
        .map(|(allergen, _)| *allergen)
        .collect()
}

/// Whether a declaration names the allergen itself or one of its sources
fn declares(declaration: &str, allergen: &str) -> bool {
    let declaration = normalize_name(declaration);
    if declaration.is_empty() {
        return false;
    }
    declaration.contains(allergen)
        || allergen.contains(declaration.as_str())
        || allergens_in(&declaration).contains(&allergen)
}

fn additive(name: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    let name = normalize_name(name);
    ADDITIVES.iter().find(|(additive, _, _)| name.contains(additive))
}

/// `validate_ingredients`: approval, GRAS status and warnings per ingredient
pub fn validate_ingredients(ingredients: &[String]) -> Value {
    let results: Vec<Value> = ingredients
        .iter()
        .map(|ingredient| {
            let name = normalize_name(ingredient);
            let known = KNOWN_SAFE.contains(&name.as_str());
            let additive = additive(ingredient);

            let mut warnings: Vec<String> = allergens_in(ingredient)
                .into_iter()
                .map(|allergen| format!("Contains major allergen: {}", allergen))
                .collect();
            if let Some((_, status, note)) = additive {
                if *status != "approved" {
                    warnings.push(format!("Artificial additive ({}): {}", status, note));
                }
            }

            let approved = known || matches!(additive, Some((_, status, _)) if *status != "prohibited");
            let gras = if known || matches!(additive, Some((_, "approved", _))) {
                "GRAS"
            } else {
                "not_listed"
            };

            json!({
                "ingredient": ingredient,
                "fdaApproved": approved,
                "grasStatus": gras,
                "warnings": warnings,
            })
        })
        .collect();

    json!({ "results": results })
}

/// `check_additive_status`: status and note per additive
pub fn check_additive_status(additives: &[String]) -> Value {
    let results: Vec<Value> = additives
        .iter()
        .map(|name| match additive(name) {
            Some((_, status, note)) => json!({ "additive": name, "status": status, "notes": note }),
            None => json!({ "additive": name, "status": "unknown" }),
        })
        .collect();

    json!({ "results": results })
}

/// `check_allergen_requirements`: detected allergens versus declared ones
pub fn check_allergen_requirements(ingredients: &[String], declared: &[String]) -> Value {
    let mut detected: Vec<&str> = ingredients.iter().flat_map(|i| allergens_in(i)).collect();
    detected.sort_unstable();
    detected.dedup();

    let undeclared: Vec<&str> = detected
        .iter()
        .copied()
        .filter(|allergen| !declared.iter().any(|d| declares(d, allergen)))
        .collect();

    json!({
        "detectedAllergens": detected,
        "declaredAllergens": declared,
        "undeclaredAllergens": undeclared,
    })
}

/// `validate_nutritional_claims`: each claim against its threshold
pub fn validate_nutritional_claims(claims: &[String], data: &BTreeMap<String, Amount>) -> Value {
    let results: Vec<Value> = claims
        .iter()
        .map(|claim| {
            let name = normalize_name(claim);
            let Some(rule) = CLAIM_RULES.iter().find(|r| r.claim == name) else {
                return json!({
                    "claim": claim,
                    "isValid": null,
                    "reason": "No threshold on record for this claim",
                });
            };

            let threshold = rule.threshold();
            let amount = data
                .get(rule.nutrient)
                .copied()
                .or_else(|| {
                    data.iter()
                        .find(|(k, _)| nutrition::canonical_nutrient(k) == Some(rule.nutrient))
                        .map(|(_, v)| *v)
                });

            match amount {
                None => json!({
                    "claim": claim,
                    "isValid": null,
                    "threshold": threshold,
                    "reason": format!("No {} value provided to verify {}", rule.nutrient, threshold),
                }),
                Some(amount) if rule.holds(amount) => json!({
                    "claim": claim,
                    "isValid": true,
                    "threshold": threshold,
                    "reason": format!("{} meets {}", rule.measure(amount), threshold),
                }),
                Some(amount) => json!({
                    "claim": claim,
                    "isValid": false,
                    "threshold": threshold,
                    "reason": format!("{} fails {}", rule.measure(amount), threshold),
                }),
            }
        })
        .collect();

    json!({ "results": results })
}
