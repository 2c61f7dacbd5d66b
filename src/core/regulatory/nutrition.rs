//! Nutrition data normalization and additive detection.
//!
//! Labels and models spell nutrients many ways ("Total Fat", "total_fat",
//! "fat"); claim checks need one numeric value per canonical camelCase key.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<|less than)?\s*(\d+(?:\.\d+)?)\s*(mcg|mg|g|kcal|cal)?").expect("static regex")
});

static ADDITIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\be\s?-?\d{3}[a-z]?\b|\b(?:fd&c\s+)?(?:red|yellow|blue|green)\s+(?:no\.?\s*)?\d+\b|\b(?:lake)\b|benzoate|sorbate|nitrite|nitrate|sulfite|propionate|aspartame|sucralose|acesulfame|saccharin|cyclamate|\bbha\b|\bbht\b|\btbhq\b|carrageenan|monosodium glutamate|\bmsg\b|brominated|artificial (?:color|colour|flavor|flavour)s?|caramel color|titanium dioxide)",
    )
    .expect("static regex")
});

/// Canonical key for a nutrient name, if it is one the claim rules use
pub fn canonical_nutrient(name: &str) -> Option<&'static str> {
    let squashed: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let key = match squashed.as_str() {
        "calories" | "calorie" | "energy" | "kcal" => "calories",
        "totalfat" | "fat" => "totalFat",
        "saturatedfat" | "satfat" | "saturated" => "saturatedFat",
        "transfat" | "trans" => "transFat",
        "cholesterol" => "cholesterol",
        "sodium" | "salt" => "sodium",
        "totalcarbohydrate" | "totalcarbohydrates" | "carbohydrate" | "carbohydrates" | "carbs" => {
            "totalCarbohydrate"
        }
        "dietaryfiber" | "fiber" | "fibre" | "dietaryfibre" => "dietaryFiber",
        "totalsugars" | "totalsugar" | "sugars" | "sugar" => "totalSugars",
        "addedsugars" | "addedsugar" | "incladdedsugars" => "addedSugars",
        "protein" => "protein",
        _ => return None,
    };
    Some(key)
}

/// A per-serving amount as printed on the label.
///
/// Labels print "<5mg" or "less than 0.5g" for trace amounts; `less_than`
/// means the true value is strictly below `value`. On the wire an exact
/// amount is a bare number and a bounded one is `{"amount": 5, "lessThan": true}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub less_than: bool,
}

impl Amount {
    pub fn exact(value: f64) -> Self {
        Self { value, less_than: false }
    }

    pub fn below(value: f64) -> Self {
        Self { value, less_than: true }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundedAmount {
    amount: f64,
    #[serde(default)]
    less_than: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Number(f64),
    Text(String),
    Bounded(BoundedAmount),
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.less_than {
            BoundedAmount { amount: self.value, less_than: true }.serialize(serializer)
        } else {
            serializer.serialize_f64(self.value)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match AmountRepr::deserialize(deserializer)? {
            AmountRepr::Number(value) => Ok(Amount::exact(value)),
            AmountRepr::Bounded(b) => Ok(Amount { value: b.amount, less_than: b.less_than }),
            AmountRepr::Text(text) => parse_amount(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("unreadable amount '{}'", text))),
        }
    }
}

/// Parse an amount such as "2g", "140 mg", "<1g" or "2.5". Micrograms become milligrams.
pub fn parse_amount(value: &str) -> Option<Amount> {
    let caps = AMOUNT_RE.captures(value)?;
    let mut amount: f64 = caps[2].parse().ok()?;
    if caps.get(3).map(|m| m.as_str().to_lowercase()).as_deref() == Some("mcg") {
        amount /= 1000.0;
    }
    Some(Amount {
        value: amount,
        less_than: caps.get(1).is_some(),
    })
}

/// Nutrition data keyed by canonical nutrient
pub fn normalize(info: &BTreeMap<String, String>) -> BTreeMap<String, Amount> {
    let mut data = BTreeMap::new();
    for (name, value) in info {
        if let (Some(key), Some(amount)) = (canonical_nutrient(name), parse_amount(value)) {
            data.entry(key.to_string()).or_insert(amount);
        }
    }
    data
}

/// Whether an ingredient looks like a food additive worth a status check
pub fn looks_like_additive(ingredient: &str) -> bool {
    ADDITIVE_RE.is_match(ingredient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_nutrient() {
        assert_eq!(canonical_nutrient("Total Fat"), Some("totalFat"));
        assert_eq!(canonical_nutrient("total_fat"), Some("totalFat"));
        assert_eq!(canonical_nutrient("totalFat"), Some("totalFat"));
        assert_eq!(canonical_nutrient("Trans Fat"), Some("transFat"));
        assert_eq!(canonical_nutrient("Total Carbohydrates"), Some("totalCarbohydrate"));
        assert_eq!(canonical_nutrient("Vitamin D"), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("2g"), Some(Amount::exact(2.0)));
        assert_eq!(parse_amount("140 mg"), Some(Amount::exact(140.0)));
        assert_eq!(parse_amount("<1g"), Some(Amount::below(1.0)));
        assert_eq!(parse_amount("Less than 0.5g"), Some(Amount::below(0.5)));
        assert_eq!(parse_amount("2.5"), Some(Amount::exact(2.5)));
        assert_eq!(parse_amount("500mcg"), Some(Amount::exact(0.5)));
        assert_eq!(parse_amount("trace"), None);
    }

    #[test]
    fn test_normalize() {
        let info: BTreeMap<String, String> = [
            ("Total Fat".to_string(), "2g".to_string()),
            ("sodium".to_string(), "140mg".to_string()),
            ("Vitamin C".to_string(), "10%".to_string()),
        ]
        .into_iter()
        .collect();

        let data = normalize(&info);
        assert_eq!(data.get("totalFat"), Some(&Amount::exact(2.0)));
        assert_eq!(data.get("sodium"), Some(&Amount::exact(140.0)));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_amount_wire_format() {
        assert_eq!(serde_json::to_value(Amount::exact(2.0)).unwrap(), serde_json::json!(2.0));
        assert_eq!(
            serde_json::to_value(Amount::below(5.0)).unwrap(),
            serde_json::json!({ "amount": 5.0, "lessThan": true })
        );

        let decoded: BTreeMap<String, Amount> = serde_json::from_value(serde_json::json!({
            "sodium": { "amount": 5, "lessThan": true },
            "totalFat": 2,
            "protein": "<1g",
        }))
        .unwrap();
        assert_eq!(decoded["sodium"], Amount::below(5.0));
        assert_eq!(decoded["totalFat"], Amount::exact(2.0));
        assert_eq!(decoded["protein"], Amount::below(1.0));
    }

    #[test]
    fn test_additive_detection() {
        assert!(looks_like_additive("FD&C Red No. 40"));
        assert!(looks_like_additive("Red 40"));
        assert!(looks_like_additive("E211"));
        assert!(looks_like_additive("Sodium Benzoate (preservative)"));
        assert!(looks_like_additive("Artificial Flavors"));
        assert!(!looks_like_additive("Water"));
        assert!(!looks_like_additive("Whole Grain Oats"));
        assert!(!looks_like_additive("Sea Salt"));
    }
}
