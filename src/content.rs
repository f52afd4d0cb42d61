//! Label Content Model - the market-resolved data the layout consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::crisis::{crisis_communication, CrisisRegistry, CrisisType};
use crate::generation::{GeneratedContent, GeneratedNutrient};
use crate::pipeline::LabelError;
use crate::regulations::{nutrient_key, Market, MarketProfile, RegulationRegistry};

/// Display metadata for nutrient keys callers commonly supply.
pub struct NutrientSpec {
    pub key: &'static str,
    pub display_name: &'static str,
    pub unit: &'static str,
    pub major: bool,
    pub indented: bool,
}

pub const NUTRIENT_CATALOG: &[NutrientSpec] = &[
    NutrientSpec { key: "total_fat", display_name: "Total Fat", unit: "g", major: true, indented: false },
    NutrientSpec { key: "saturated_fat", display_name: "Saturated Fat", unit: "g", major: false, indented: true },
    NutrientSpec { key: "trans_fat", display_name: "Trans Fat", unit: "g", major: false, indented: true },
    NutrientSpec { key: "cholesterol", display_name: "Cholesterol", unit: "mg", major: true, indented: false },
    NutrientSpec { key: "sodium", display_name: "Sodium", unit: "mg", major: true, indented: false },
    NutrientSpec { key: "salt", display_name: "Salt", unit: "g", major: true, indented: false },
    NutrientSpec { key: "total_carbs", display_name: "Total Carbohydrates", unit: "g", major: true, indented: false },
    NutrientSpec { key: "fiber", display_name: "Dietary Fiber", unit: "g", major: false, indented: true },
    NutrientSpec { key: "sugars", display_name: "Total Sugars", unit: "g", major: false, indented: true },
    NutrientSpec { key: "protein", display_name: "Protein", unit: "g", major: true, indented: false },
];

pub fn nutrient_spec(name: &str) -> Option<&'static NutrientSpec> {
    let key = nutrient_key(name);
    NUTRIENT_CATALOG.iter().find(|spec| spec.key == key)
}

/// Caller-supplied product data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub product_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub serving_size: Option<String>,
    #[serde(default)]
    pub servings_per_container: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    /// Nutrient key -> amount per serving.
    #[serde(default)]
    pub nutrient_values: BTreeMap<String, f64>,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub allergens: String,
    #[serde(default)]
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisInput {
    #[serde(rename = "type")]
    pub crisis_type: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub market: String,
    pub product: ProductInput,
    #[serde(default)]
    pub crisis: Option<CrisisInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientRow {
    /// Reference-table key; the name may be localized.
    pub key: String,
    pub name: String,
    pub amount: f64,
    pub unit: String,
    pub daily_value: u32,
    pub major: bool,
    pub indented: bool,
}

impl NutrientRow {
    pub fn amount_text(&self) -> String {
        format!("{}{}", self.amount, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisAnnotation {
    pub crisis_type: CrisisType,
    pub warning: String,
    pub contact: String,
}

/// When `crisis` is present the banner is drawn before every other section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelContent {
    pub product_name: String,
    pub market: Market,
    pub serving_size: String,
    pub servings_per_container: String,
    pub calories: String,
    pub nutrients: Vec<NutrientRow>,
    pub ingredients: String,
    /// Allergen text without the market prefix; the prefix is applied at draw time.
    pub allergens: String,
    pub certifications: Vec<String>,
    pub regulatory_notes: String,
    #[serde(default)]
    pub market_specific_warnings: Option<String>,
    #[serde(default)]
    pub crisis: Option<CrisisAnnotation>,
}

#[derive(Debug, Clone)]
pub struct AssembledLabel {
    pub content: LabelContent,
    /// Announcement text for external channels; never drawn on the label.
    pub crisis_communication: Option<String>,
}

fn prefer(generated: &str, provided: Option<&str>, default: &str) -> String {
    let generated = generated.trim();
    if !generated.is_empty() {
        return generated.to_string();
    }
    match provided.map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => default.to_string(),
    }
}

/// The generator's canonical key wins over the display name when present.
fn nutrient_row(profile: &MarketProfile, n: &GeneratedNutrient) -> NutrientRow {
    let key = match n.key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => nutrient_key(key),
        _ => nutrient_key(&n.name),
    };
    NutrientRow {
        daily_value: profile.daily_value_percent(&key, n.amount),
        key,
        name: n.name.clone(),
        amount: n.amount,
        unit: n.unit.clone(),
        major: n.major,
        indented: n.indented,
    }
}

/// Rows built straight from caller nutrient values, in catalog order first.
pub fn rows_from_values(values: &BTreeMap<String, f64>) -> Vec<GeneratedNutrient> {
    let mut rows: Vec<GeneratedNutrient> = NUTRIENT_CATALOG
        .iter()
        .filter_map(|spec| {
            values
                .iter()
                .find(|(k, _)| nutrient_key(k) == spec.key)
                .map(|(_, amount)| GeneratedNutrient {
                    key: Some(spec.key.to_string()),
                    name: spec.display_name.to_string(),
                    amount: *amount,
                    unit: spec.unit.to_string(),
                    major: spec.major,
                    indented: spec.indented,
                })
        })
        .collect();

    for (key, amount) in values {
        if nutrient_spec(key).is_none() {
            rows.push(GeneratedNutrient {
                key: Some(nutrient_key(key)),
                name: key.clone(),
                amount: *amount,
                unit: "g".to_string(),
                major: false,
                indented: false,
            });
        }
    }
    rows
}

/// Merge generated content with caller data.
///
/// Precedence: a non-empty generated field always wins; the caller's value is
/// used only when the generated field is empty. Certifications are then
/// reduced to the market whitelist, and any market prefix already present on
/// the allergen text is stripped so the renderer never doubles it.
pub fn merge_label_content(
    profile: &MarketProfile,
    product: &ProductInput,
    generated: GeneratedContent,
) -> LabelContent {
    let calories_fallback = product.calories.map(|c| format!("{} kcal", c));

    let nutrient_source = if generated.nutrients.is_empty() {
        rows_from_values(&product.nutrient_values)
    } else {
        generated.nutrients
    };
    let nutrients = nutrient_source
        .iter()
        .map(|n| nutrient_row(profile, n))
        .collect();

    let allergens = prefer(&generated.allergens, Some(product.allergens.as_str()), "");
    let allergens = allergens
        .strip_prefix(profile.allergen_prefix)
        .map(|rest| rest.trim().to_string())
        .unwrap_or(allergens);

    let requested = if generated.certifications.is_empty() {
        product.certifications.clone()
    } else {
        generated.certifications
    };
    let certifications = profile.filter_certifications(&requested);
    if certifications.len() < requested.len() {
        warn!(
            market = %profile.market,
            requested = requested.len(),
            accepted = certifications.len(),
            "Certifications not recognized by market were dropped"
        );
    }

    let warnings = generated.market_specific_warnings.trim();

    LabelContent {
        product_name: product.product_name.trim().to_string(),
        market: profile.market,
        serving_size: prefer(&generated.serving_size, product.serving_size.as_deref(), "1 serving"),
        servings_per_container: prefer(
            &generated.servings_per_container,
            product.servings_per_container.as_deref(),
            "1",
        ),
        calories: prefer(&generated.calories, calories_fallback.as_deref(), "0"),
        nutrients,
        ingredients: prefer(&generated.ingredients, Some(product.ingredients.as_str()), ""),
        allergens,
        certifications,
        regulatory_notes: prefer(&generated.regulatory_notes, None, ""),
        market_specific_warnings: (!warnings.is_empty()).then(|| warnings.to_string()),
        crisis: None,
    }
}

/// Resolves the market, merges content and attaches crisis data.
pub struct LabelAssembler<'r> {
    regulations: &'r RegulationRegistry,
    crisis: &'r CrisisRegistry,
}

impl<'r> LabelAssembler<'r> {
    pub fn new(regulations: &'r RegulationRegistry, crisis: &'r CrisisRegistry) -> Self {
        Self { regulations, crisis }
    }

    /// No partial label is produced for an unknown market.
    pub fn assemble(
        &self,
        market_id: &str,
        product: &ProductInput,
        generated: GeneratedContent,
        crisis: Option<&CrisisInput>,
    ) -> Result<AssembledLabel, LabelError> {
        let profile = self
            .regulations
            .resolve(market_id)
            .map_err(|_| LabelError::UnsupportedMarket(market_id.to_string()))?;

        let mut content = merge_label_content(profile, product, generated);

        let crisis_communication = crisis.map(|input| {
            let crisis_type = CrisisType::parse(&input.crisis_type);
            content.crisis = Some(CrisisAnnotation {
                warning: self.crisis.warning_for(&crisis_type, market_id),
                contact: self.crisis.contact_for(market_id),
                crisis_type: crisis_type.clone(),
            });
            crisis_communication(&crisis_type, &input.details)
        });

        Ok(AssembledLabel {
            content,
            crisis_communication,
        })
    }
}

impl LabelAssembler<'static> {
    pub fn global() -> Self {
        Self::new(RegulationRegistry::global(), CrisisRegistry::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ProductInput {
        ProductInput {
            product_name: "Oat Bar".to_string(),
            serving_size: Some("40g".to_string()),
            calories: Some(180.0),
            nutrient_values: BTreeMap::from([
                ("total_fat".to_string(), 7.0),
                ("protein".to_string(), 5.0),
                ("saturated_fat".to_string(), 1.5),
            ]),
            ingredients: "oats, honey, almonds".to_string(),
            allergens: "almonds".to_string(),
            certifications: vec!["IFS".to_string(), "Kosher".to_string()],
            ..Default::default()
        }
    }

    fn empty_generated() -> GeneratedContent {
        GeneratedContent::default()
    }

    #[test]
    fn test_generated_content_wins() {
        let profile = RegulationRegistry::new().profile(Market::Spain).clone();
        let generated = GeneratedContent {
            serving_size: "1 barrita (40g)".to_string(),
            ingredients: "copos de avena, miel, almendras".to_string(),
            ..empty_generated()
        };
        let content = merge_label_content(&profile, &product(), generated);
        assert_eq!(content.serving_size, "1 barrita (40g)");
        assert_eq!(content.ingredients, "copos de avena, miel, almendras");
    }

    #[test]
    fn test_caller_values_fill_empty_generated_fields() {
        let profile = RegulationRegistry::new().profile(Market::Spain).clone();
        let content = merge_label_content(&profile, &product(), empty_generated());
        assert_eq!(content.serving_size, "40g");
        assert_eq!(content.servings_per_container, "1");
        assert_eq!(content.calories, "180 kcal");
        assert_eq!(content.allergens, "almonds");
        assert_eq!(content.certifications, vec!["IFS".to_string()]);
    }

    #[test]
    fn test_rows_follow_catalog_order_with_daily_values() {
        let profile = RegulationRegistry::new().profile(Market::Spain).clone();
        let content = merge_label_content(&profile, &product(), empty_generated());
        let names: Vec<_> = content.nutrients.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Total Fat", "Saturated Fat", "Protein"]);
        assert_eq!(content.nutrients[0].daily_value, 10);
        assert!(content.nutrients[1].indented);
        assert!(content.nutrients[2].major);
    }

    #[test]
    fn test_localized_rows_use_market_reference() {
        let profile = RegulationRegistry::new().profile(Market::Spain).clone();
        let generated = GeneratedContent {
            nutrients: vec![
                GeneratedNutrient {
                    name: "Grasas totales".to_string(),
                    amount: 10.0,
                    unit: "g".to_string(),
                    ..Default::default()
                },
                GeneratedNutrient {
                    key: Some("total_fat".to_string()),
                    name: "Lípidos".to_string(),
                    amount: 10.0,
                    unit: "g".to_string(),
                    ..Default::default()
                },
            ],
            ..empty_generated()
        };
        let content = merge_label_content(&profile, &product(), generated);
        for row in &content.nutrients {
            assert_eq!(row.key, "total_fat");
            assert_eq!(row.daily_value, 14);
        }
        assert_eq!(content.nutrients[1].name, "Lípidos");
    }

    #[test]
    fn test_allergen_prefix_not_doubled() {
        let profile = RegulationRegistry::new().profile(Market::Spain).clone();
        let generated = GeneratedContent {
            allergens: "Contiene: almendras".to_string(),
            ..empty_generated()
        };
        let content = merge_label_content(&profile, &product(), generated);
        assert_eq!(content.allergens, "almendras");
        assert_eq!(profile.format_allergen_statement(&content.allergens), "Contiene: almendras");
    }

    #[test]
    fn test_assemble_unknown_market_fails() {
        let assembler = LabelAssembler::global();
        let err = assembler
            .assemble("atlantis", &product(), empty_generated(), None)
            .unwrap_err();
        assert!(matches!(err, LabelError::UnsupportedMarket(ref m) if m == "atlantis"));
    }

    #[test]
    fn test_assemble_attaches_crisis() {
        let assembler = LabelAssembler::global();
        let crisis = CrisisInput {
            crisis_type: "Recall".to_string(),
            details: "Glass fragments.".to_string(),
        };
        let assembled = assembler
            .assemble("spain", &product(), empty_generated(), Some(&crisis))
            .unwrap();
        let annotation = assembled.content.crisis.unwrap();
        assert_eq!(annotation.crisis_type, CrisisType::Recall);
        assert_eq!(annotation.warning, "RETIRADA DEL PRODUCTO - No consumir");
        assert_eq!(annotation.contact, "Para más información: +34 900 123 456");
        assert_eq!(
            assembled.crisis_communication.as_deref(),
            Some("URGENT: RECALL - Glass fragments. Please contact manufacturer immediately.")
        );
    }

    #[test]
    fn test_assemble_without_crisis_has_no_annotation() {
        let assembled = LabelAssembler::global()
            .assemble("brazil", &product(), empty_generated(), None)
            .unwrap();
        assert!(assembled.content.crisis.is_none());
        assert!(assembled.crisis_communication.is_none());
    }
}
