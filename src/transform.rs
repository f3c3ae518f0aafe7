//! Raw search results → typed product records.

use serde_json::Value;

use crate::error::SkipReason;
use crate::extract::{RawRecord, dedup, list_or_text, packaging};
use crate::normalize::{TextNormalizer, capitalize_text};

const BARCODE_KEY: &str = "code";
const NAME_KEYS: &[&str] = &["product_name", "product_name_en", "generic_name"];
const BRAND_KEYS: &[&str] = &["brands", "brand"];
const NUTRIMENTS_KEY: &str = "nutriments";
const PER_100G_SUFFIX: &str = "_100g";
const UNIT_SUFFIX: &str = "_unit";

#[derive(Debug, Clone, PartialEq)]
pub struct ProductFacts {
    pub barcode: String,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub packaging: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutrientFact {
    pub name: String,
    pub value_per_100g: f64,
    pub unit: Option<String>,
}

/// Child entities stored as a plain name per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Ingredient,
    Category,
    Country,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::Ingredient, TagKind::Category, TagKind::Country];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Ingredient => "ingredient",
            TagKind::Category => "category",
            TagKind::Country => "country",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRecord {
    pub product: ProductFacts,
    pub nutrients: Vec<NutrientFact>,
    pub ingredients: Vec<String>,
    pub categories: Vec<String>,
    pub countries: Vec<String>,
}

impl TransformedRecord {
    pub fn barcode(&self) -> &str {
        &self.product.barcode
    }

    pub fn tags(&self, kind: TagKind) -> &[String] {
        match kind {
            TagKind::Ingredient => &self.ingredients,
            TagKind::Category => &self.categories,
            TagKind::Country => &self.countries,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordTransformer {
    normalizer: TextNormalizer,
}

impl RecordTransformer {
    pub fn new(normalizer: TextNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn transform(&self, raw: &RawRecord) -> Result<TransformedRecord, SkipReason> {
        if raw.as_object().is_none() {
            return Err(SkipReason::NotAnObject);
        }
        let barcode = barcode(raw)?;

        let product = ProductFacts {
            barcode,
            product_name: self.first_text(raw, NAME_KEYS),
            brand: self.first_text(raw, BRAND_KEYS),
            packaging: packaging(&self.normalizer, raw),
        };

        // capitalizing can fold names that were distinct before
        let countries = dedup(
            list_or_text(&self.normalizer, raw, "countries_tags", "countries")
                .into_iter()
                .filter_map(|name| capitalize_text(Some(&name))),
        );

        Ok(TransformedRecord {
            product,
            nutrients: nutrients(raw),
            ingredients: list_or_text(&self.normalizer, raw, "ingredients_tags", "ingredients_text"),
            categories: list_or_text(&self.normalizer, raw, "categories_tags", "categories"),
            countries,
        })
    }

    fn first_text(&self, raw: &RawRecord, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| raw.str_field(key))
            .and_then(|text| self.normalizer.normalize(Some(text)))
    }
}

fn barcode(raw: &RawRecord) -> Result<String, SkipReason> {
    match raw.field(BARCODE_KEY) {
        None => Err(SkipReason::MissingBarcode),
        Some(Value::String(code)) => {
            let code = code.trim();
            if code.is_empty() {
                Err(SkipReason::MissingBarcode)
            } else {
                Ok(code.to_string())
            }
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| n.to_string())
            .ok_or_else(|| SkipReason::InvalidBarcode(n.to_string())),
        Some(other) => Err(SkipReason::InvalidBarcode(other.to_string())),
    }
}

/// `<name>_100g` entries of the nutriments object. Unparseable values are
/// dropped one by one.
fn nutrients(raw: &RawRecord) -> Vec<NutrientFact> {
    let Some(nutriments) = raw.object_field(NUTRIMENTS_KEY) else {
        return Vec::new();
    };

    nutriments
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_suffix(PER_100G_SUFFIX)?.trim();
            if name.is_empty() {
                return None;
            }
            let Some(value_per_100g) = parse_amount(value) else {
                log::debug!("Dropping nutrient {} with unusable value {}", name, value);
                return None;
            };
            let unit = nutriments
                .get(&format!("{name}{UNIT_SUFFIX}"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string);
            Some(NutrientFact {
                name: name.to_string(),
                value_per_100g,
                unit,
            })
        })
        .collect()
}

fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transform(value: Value) -> Result<TransformedRecord, SkipReason> {
        RecordTransformer::default().transform(&RawRecord::from(value))
    }

    #[test]
    fn test_transform_full_record() {
        let record = transform(json!({
            "code": "5449000000996",
            "product_name": "coca-cola  original taste",
            "brands": "Coca-Cola",
            "packaging_tags": ["en:plastic-bottle"],
            "ingredients_tags": ["en:carbonated-water", "en:sugar"],
            "categories": "Beverages, Sodas",
            "countries_tags": ["en:france", "en:bosnia-and-herzegovina"],
            "nutriments": {
                "energy-kcal_100g": 42,
                "energy-kcal_unit": "kcal",
                "sugars_100g": "10,6",
                "sugars_unit": " g ",
                "fat": 0
            }
        }))
        .unwrap();

        assert_eq!(record.barcode(), "5449000000996");
        assert_eq!(record.product.product_name.as_deref(), Some("Coca-cola Original Taste"));
        assert_eq!(record.product.brand.as_deref(), Some("Coca-cola"));
        assert_eq!(record.product.packaging.as_deref(), Some("Plastic Bottle"));
        assert_eq!(record.ingredients, vec!["Carbonated Water", "Sugar"]);
        assert_eq!(record.categories, vec!["Beverages", "Sodas"]);
        assert_eq!(record.countries, vec!["France", "Bosnia And Herzegovina"]);
        assert_eq!(
            record.nutrients,
            vec![
                NutrientFact {
                    name: "energy-kcal".to_string(),
                    value_per_100g: 42.0,
                    unit: Some("kcal".to_string()),
                },
                NutrientFact {
                    name: "sugars".to_string(),
                    value_per_100g: 10.6,
                    unit: Some("g".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_missing_barcode_is_skipped() {
        assert_eq!(transform(json!({ "product_name": "x" })), Err(SkipReason::MissingBarcode));
        assert_eq!(transform(json!({ "code": "   " })), Err(SkipReason::MissingBarcode));
        assert_eq!(transform(json!({ "code": null })), Err(SkipReason::MissingBarcode));
    }

    #[test]
    fn test_unusable_barcode_and_shape() {
        assert_eq!(transform(json!([1, 2])), Err(SkipReason::NotAnObject));
        assert!(matches!(
            transform(json!({ "code": true })),
            Err(SkipReason::InvalidBarcode(_))
        ));
        assert!(matches!(
            transform(json!({ "code": -5 })),
            Err(SkipReason::InvalidBarcode(_))
        ));
        assert_eq!(transform(json!({ "code": 3017620422003u64 })).unwrap().barcode(), "3017620422003");
    }

    #[test]
    fn test_bad_nutrients_are_dropped_individually() {
        let record = transform(json!({
            "code": "1",
            "nutriments": {
                "fat_100g": "n/a",
                "salt_100g": [1],
                "proteins_100g": 3.5,
                "_100g": 1
            }
        }))
        .unwrap();
        assert_eq!(record.nutrients.len(), 1);
        assert_eq!(record.nutrients[0].name, "proteins");
        assert_eq!(record.nutrients[0].unit, None);
    }

    #[test]
    fn test_mistyped_fields_become_absent() {
        let record = transform(json!({
            "code": "42",
            "product_name": 7,
            "product_name_en": "  dark chocolate ",
            "brands": ["not", "text"],
            "ingredients_tags": "en:cocoa",
            "ingredients_text": "cocoa mass; sugar;  ;",
            "nutriments": "none"
        }))
        .unwrap();
        assert_eq!(record.product.product_name.as_deref(), Some("Dark Chocolate"));
        assert_eq!(record.product.brand, None);
        assert_eq!(record.product.packaging, None);
        assert_eq!(record.ingredients, vec!["Cocoa Mass", "Sugar"]);
        assert!(record.nutrients.is_empty());
        assert!(record.countries.is_empty());
    }

    #[test]
    fn test_countries_differing_only_in_case_collapse() {
        let record = transform(json!({ "code": "1", "countries": "USA, usa, France" })).unwrap();
        assert_eq!(record.countries, vec!["Usa", "France"]);
    }
}
