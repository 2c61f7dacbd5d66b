//! Local extraction used when no provider produced a usable answer.
//!
//! Works only from detected sections and simple patterns; its output is
//! deliberately conservative.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::regulatory::nutrition::canonical_nutrient;
use crate::domain::{ExtractionResult, StructuredLabel};

static NUTRIENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(calories|total fat|saturated fat|trans fat|cholesterol|sodium|total carbohydrates?|dietary fiber|total sugars|added sugars|protein)\b\s*:?\s*(<?\s*\d+(?:\.\d+)?)\s*(mg|mcg|g|kcal)?",
    )
    .expect("static regex")
});

static CLAIM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(very low sodium|low sodium|sodium[- ]free|salt[- ]free|low[- ]fat|fat[- ]free|low saturated fat|low[- ]calorie|calorie[- ]free|sugar[- ]free|no added sugar|low cholesterol|cholesterol[- ]free|high fiber|good source of fiber|high protein|gluten[- ]free|organic|non[- ]gmo)\b",
    )
    .expect("static regex")
});

/// Split a comma/semicolon list, keeping parenthesized sub-lists together
pub fn split_list(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for ch in body.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(ch);
            }
            ',' | ';' if depth <= 0 => items.push(std::mem::take(&mut current)),
            '\n' | '\r' => current.push(' '),
            _ => current.push(ch),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| {
            item.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end_matches('.')
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// Nutrient amounts printed as "Total Fat 2g" style rows
pub fn nutrition_rows(text: &str) -> BTreeMap<String, String> {
    let mut rows = BTreeMap::new();
    for caps in NUTRIENT_RE.captures_iter(text) {
        let key = match canonical_nutrient(&caps[1]) {
            Some(key) => key.to_string(),
            None => continue,
        };
        let amount = caps[2].split_whitespace().collect::<String>();
        let unit = caps.get(3).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        rows.entry(key).or_insert_with(|| format!("{}{}", amount, unit));
    }
    rows
}

/// Claim phrases printed on the label, lower-cased, in order of appearance
pub fn claims(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in CLAIM_RE.find_iter(text) {
        let claim = m.as_str().to_lowercase().replace('-', " ");
        if !found.contains(&claim) {
            found.push(claim);
        }
    }
    found
}

/// Best-effort structured label from an extraction alone
pub fn extract(extraction: &ExtractionResult) -> StructuredLabel {
    let ingredients = extraction
        .section("ingredients")
        .or_else(|| extraction.section("inactiveIngredients"))
        .map(split_list)
        .unwrap_or_default();

    let allergens = extraction.section("allergens").map(split_list).unwrap_or_default();

    let warnings = extraction
        .section("warnings")
        .map(|w| vec![w.split_whitespace().collect::<Vec<_>>().join(" ")])
        .unwrap_or_default();

    let manufacturer = extraction
        .section("manufacturer")
        .and_then(|m| m.lines().next())
        .map(|m| m.trim().to_string());

    StructuredLabel {
        manufacturer,
        ingredients,
        allergens,
        nutritional_info: nutrition_rows(&extraction.text),
        warnings,
        claims: claims(&extraction.text),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extraction::from_text;

    #[test]
    fn test_split_list_keeps_sub_lists() {
        assert_eq!(
            split_list("Enriched Flour (Wheat Flour, Niacin), Sugar; Salt."),
            vec!["Enriched Flour (Wheat Flour, Niacin)", "Sugar", "Salt"]
        );
        assert_eq!(split_list("Water,\nSea\nSalt"), vec!["Water", "Sea Salt"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_nutrition_rows() {
        let rows = nutrition_rows("Calories 120\nTotal Fat 2g\nSodium 140 mg\nTotal Sugars <1g\nProtein 3g");
        assert_eq!(rows.get("calories").unwrap(), "120");
        assert_eq!(rows.get("totalFat").unwrap(), "2g");
        assert_eq!(rows.get("sodium").unwrap(), "140mg");
        assert_eq!(rows.get("totalSugars").unwrap(), "<1g");
        assert_eq!(rows.get("protein").unwrap(), "3g");
    }

    #[test]
    fn test_claims() {
        assert_eq!(
            claims("LOW-FAT yogurt. Gluten Free! low fat"),
            vec!["low fat", "gluten free"]
        );
    }

    #[test]
    fn test_extract_from_sections() {
        let extraction = from_text(
            "CRUNCHY OATS\nIngredients: Whole Grain Oats, Sugar, Salt.\nContains: Wheat\nTotal Fat 2g\nLow Fat",
        );
        let label = extract(&extraction);

        assert_eq!(label.ingredients, vec!["Whole Grain Oats", "Sugar", "Salt"]);
        assert_eq!(label.claims, vec!["low fat"]);
        assert_eq!(label.nutritional_info.get("totalFat").unwrap(), "2g");
        assert!(label.product_name.is_none());
    }
}
