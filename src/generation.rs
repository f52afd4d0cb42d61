//! Content Generation - the external collaborator boundary
//!
//! The generator turns raw product data into market-appropriate label text.
//! Any well-formed response is authoritative; anything else is a hard error.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::content::{rows_from_values, ProductInput, NUTRIENT_CATALOG};
use crate::regulations::MarketProfile;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation backend failed: {0}")]
    Backend(String),

    #[error("No JSON object found in generation response")]
    NoJson,

    #[error("Malformed generation response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedNutrient {
    /// Canonical nutrient key, independent of the display language.
    #[serde(default)]
    pub key: Option<String>,
    pub name: String,
    #[serde(deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub major: bool,
    #[serde(default)]
    pub indented: bool,
}

/// The fixed schema every generator returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub serving_size: String,
    pub servings_per_container: String,
    pub calories: String,
    pub nutrients: Vec<GeneratedNutrient>,
    pub ingredients: String,
    pub allergens: String,
    pub certifications: Vec<String>,
    pub regulatory_notes: String,
    pub market_specific_warnings: String,
}

pub trait ContentGenerator {
    fn generate(
        &self,
        product: &ProductInput,
        profile: &MarketProfile,
    ) -> Result<GeneratedContent, GenerationError>;
}

// Wire shape: nutrition facts nested one level down.

#[derive(Debug, Deserialize)]
struct WireFacts {
    #[serde(deserialize_with = "string_or_number")]
    serving_size: String,
    #[serde(deserialize_with = "string_or_number")]
    servings_per_container: String,
    #[serde(deserialize_with = "string_or_number")]
    calories: String,
    #[serde(default)]
    nutrients: Vec<GeneratedNutrient>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    nutrition_facts: WireFacts,
    ingredients: String,
    allergens: String,
    #[serde(default)]
    certifications: Vec<String>,
    regulatory_notes: String,
    #[serde(default)]
    market_specific_warnings: String,
}

impl From<WireResponse> for GeneratedContent {
    fn from(w: WireResponse) -> Self {
        Self {
            serving_size: w.nutrition_facts.serving_size,
            servings_per_container: w.nutrition_facts.servings_per_container,
            calories: w.nutrition_facts.calories,
            nutrients: w.nutrition_facts.nutrients,
            ingredients: w.ingredients,
            allergens: w.allergens,
            certifications: w.certifications,
            regulatory_notes: w.regulatory_notes,
            market_specific_warnings: w.market_specific_warnings,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(f64),
    Text(String),
}

fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Number(n) => Ok(n),
        Scalar::Text(s) => parse_amount(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid nutrient amount: {s}"))),
    }
}

/// Amount text as printed on labels: "4.5g", "4,5 g", "<0.5", "~2 mg",
/// "1.234,5 kJ". Qualifiers and units are dropped; the last of `.`/`,` is the
/// decimal separator.
pub fn parse_amount(text: &str) -> Option<f64> {
    let number = text
        .trim()
        .trim_start_matches(|c: char| matches!(c, '<' | '>' | '≤' | '≥' | '~' | '≈') || c.is_whitespace())
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '%' || c.is_whitespace());

    let normalized = match (number.rfind('.'), number.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => number.replace('.', "").replace(',', "."),
        (_, Some(_)) if number.contains('.') => number.replace(',', ""),
        (None, Some(_)) => number.replace(',', "."),
        _ => number.to_string(),
    };
    normalized.parse().ok()
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Scalar::deserialize(d)? {
        Scalar::Number(n) => n.to_string(),
        Scalar::Text(s) => s,
    })
}

/// Extract the outermost `{...}` from model text and decode it.
pub fn parse_generation_response(text: &str) -> Result<GeneratedContent, GenerationError> {
    let start = text.find('{').ok_or(GenerationError::NoJson)?;
    let end = text.rfind('}').ok_or(GenerationError::NoJson)?;
    if end < start {
        return Err(GenerationError::NoJson);
    }
    let wire: WireResponse = serde_json::from_str(&text[start..=end])?;
    Ok(wire.into())
}

fn market_requirements(profile: &MarketProfile) -> Vec<String> {
    let mut reqs = vec![
        format!("Use '{}' as title", profile.title),
        format!("Use {} language for all consumer-facing text", profile.language),
        format!("Express energy in {}", profile.energy_unit),
        format!("List allergens with '{}' prefix", profile.allergen_prefix),
        format!("Add a {} compliance note", profile.regulation),
    ];
    if !profile.certifications.is_empty() {
        reqs.push(format!(
            "Only reference recognized certifications: {}",
            profile.certifications.join(", ")
        ));
    }
    reqs
}

/// Prompt for a text-completion backend, including the expected JSON schema.
pub fn build_generation_prompt(product: &ProductInput, profile: &MarketProfile) -> String {
    let market = profile.market.as_str().to_uppercase();
    let nutrients: Vec<String> = product
        .nutrient_values
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect();
    let keys: Vec<&str> = NUTRIENT_CATALOG.iter().map(|spec| spec.key).collect();
    let requirements: Vec<String> = market_requirements(profile)
        .into_iter()
        .map(|r| format!("- {r}"))
        .collect();

    format!(
        r#"You are a nutrition labeling expert for the {market} market ({language}).

PRODUCT DATA:
- Product Name: {name}
- Category: {category}
- Serving Size: {serving}
- Servings per Container: {servings}
- Calories: {calories}

NUTRITIONAL VALUES (per serving):
{nutrients}

INGREDIENTS: {ingredients}
ALLERGENS: {allergens}
CERTIFICATIONS: {certifications}

MARKET REQUIREMENTS FOR {market}:
{requirements}

Give each nutrient a "key" from: {keys}. The "name" is the localized display text.

Respond with a single JSON object:
{{
  "nutrition_facts": {{
    "serving_size": "...",
    "servings_per_container": "...",
    "calories": "...",
    "nutrients": [{{"key": "total_fat", "name": "...", "amount": 0, "unit": "g", "major": true, "indented": false}}]
  }},
  "ingredients": "...",
  "allergens": "...",
  "certifications": ["..."],
  "regulatory_notes": "compliance note for {regulation}",
  "market_specific_warnings": "..."
}}"#,
        language = profile.language,
        name = product.product_name,
        category = product.category.as_deref().unwrap_or("Food Product"),
        serving = product.serving_size.as_deref().unwrap_or("1 serving"),
        servings = product.servings_per_container.as_deref().unwrap_or("1"),
        calories = product.calories.unwrap_or(0.0),
        nutrients = nutrients.join("\n"),
        ingredients = product.ingredients,
        allergens = product.allergens,
        certifications = product.certifications.join(", "),
        requirements = requirements.join("\n"),
        keys = keys.join(", "),
        regulation = profile.regulation,
    )
}

/// A text-completion backend.
pub trait CompletionModel {
    fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

impl<F> CompletionModel for F
where
    F: Fn(&str) -> Result<String, GenerationError>,
{
    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self(prompt)
    }
}

/// Generator backed by a completion model: prompt, complete, parse.
pub struct ModelBackedGenerator<M> {
    model: M,
}

impl<M: CompletionModel> ModelBackedGenerator<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

impl<M: CompletionModel> ContentGenerator for ModelBackedGenerator<M> {
    fn generate(
        &self,
        product: &ProductInput,
        profile: &MarketProfile,
    ) -> Result<GeneratedContent, GenerationError> {
        let prompt = build_generation_prompt(product, profile);
        debug!(market = %profile.market, prompt_len = prompt.len(), "Requesting label content");
        let text = self.model.complete(&prompt)?;
        parse_generation_response(&text)
    }
}

/// Deterministic generator derived purely from the product data.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockContentGenerator;

impl ContentGenerator for MockContentGenerator {
    fn generate(
        &self,
        product: &ProductInput,
        profile: &MarketProfile,
    ) -> Result<GeneratedContent, GenerationError> {
        info!(market = %profile.market, product = %product.product_name, "Using mock label content");

        let kcal = product.calories.unwrap_or(0.0);
        let calories = if profile.energy_unit.contains("kJ") {
            format!("{} kJ / {} kcal", (kcal * 4.184).round(), kcal)
        } else {
            format!("{} kcal", kcal)
        };

        let ingredients = if product.ingredients.trim().is_empty() {
            "Ingredients not specified".to_string()
        } else {
            product.ingredients.trim().to_string()
        };

        Ok(GeneratedContent {
            serving_size: product.serving_size.clone().unwrap_or_else(|| "1 serving".to_string()),
            servings_per_container: product
                .servings_per_container
                .clone()
                .unwrap_or_else(|| "1".to_string()),
            calories,
            nutrients: rows_from_values(&product.nutrient_values),
            ingredients,
            allergens: product.allergens.trim().to_string(),
            certifications: product.certifications.clone(),
            regulatory_notes: format!("Complies with {}", profile.regulation),
            market_specific_warnings: String::new(),
        })
    }
}
