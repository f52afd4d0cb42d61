//! Regulation Registry - Market Profiles
//!
//! One immutable profile per market in the closed [`Market`] enumeration.
//! Unknown market ids are rejected at the boundary by [`Market::parse`];
//! nothing past that point ever sees a free-form market string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Reference value used when a nutrient has no market-specific entry.
pub const DEFAULT_DAILY_REFERENCE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown market: {0}")]
    UnknownMarket(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Spain,
    Angola,
    Macau,
    Brazil,
    Halal,
}

impl Market {
    pub const ALL: [Market; 5] = [
        Market::Spain,
        Market::Angola,
        Market::Macau,
        Market::Brazil,
        Market::Halal,
    ];

    /// Parse a market id, case-insensitively and ignoring surrounding whitespace.
    pub fn parse(id: &str) -> Result<Self, RegistryError> {
        match id.trim().to_lowercase().as_str() {
            "spain" => Ok(Market::Spain),
            "angola" => Ok(Market::Angola),
            "macau" => Ok(Market::Macau),
            "brazil" => Ok(Market::Brazil),
            "halal" => Ok(Market::Halal),
            _ => Err(RegistryError::UnknownMarket(id.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Spain => "spain",
            Market::Angola => "angola",
            Market::Macau => "macau",
            Market::Brazil => "brazil",
            Market::Halal => "halal",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Market {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Market::parse(s)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text roles a market can require to be rendered in bold. The allergen line
/// is bold in every market and has no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Title,
    DailyValues,
    ImportWarning,
    AnvisaCompliance,
    HalalCertification,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontRequirements {
    pub title_size: f32,
    pub body_size: f32,
    pub allergen_size: f32,
    pub bold_roles: BTreeSet<TextRole>,
}

impl FontRequirements {
    fn standard(bold_roles: &[TextRole]) -> Self {
        Self {
            title_size: 16.0,
            body_size: 12.0,
            allergen_size: 10.0,
            bold_roles: bold_roles.iter().copied().collect(),
        }
    }

    pub fn requires_bold(&self, role: TextRole) -> bool {
        self.bold_roles.contains(&role)
    }
}

/// A topic the label's regulatory notes must mention, matched
/// case-insensitively against any of `terms`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredMention {
    pub topic: &'static str,
    pub terms: Vec<&'static str>,
    /// Missing a mandatory mention makes the label non-compliant; otherwise
    /// it is only flagged.
    pub mandatory: bool,
}

impl RequiredMention {
    fn new(topic: &'static str, terms: &[&'static str], mandatory: bool) -> Self {
        Self {
            topic,
            terms: terms.to_vec(),
            mandatory,
        }
    }

    pub fn is_met_by(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.terms.iter().any(|term| text.contains(&term.to_lowercase()))
    }
}

/// EU 1169/2011 Art. 30 nutrition declaration.
const EU_MANDATORY_NUTRIENTS: [&str; 7] = [
    "calories",
    "total_fat",
    "saturated_fat",
    "total_carbs",
    "sugars",
    "protein",
    "salt",
];

/// The regulatory rule set bound to one market.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketProfile {
    pub market: Market,
    pub title: &'static str,
    pub language: &'static str,
    pub regulation: &'static str,
    pub energy_unit: &'static str,
    /// Nutrient key -> daily reference intake, in declaration order.
    pub daily_references: Vec<(&'static str, f64)>,
    pub mandatory_warnings: Vec<&'static str>,
    pub allergen_prefix: &'static str,
    pub certifications: Vec<&'static str>,
    pub fonts: FontRequirements,
    /// Nutrient keys the declaration must contain; `calories` is satisfied by
    /// the energy line.
    pub mandatory_nutrients: Vec<&'static str>,
    pub required_mentions: Vec<RequiredMention>,
}

impl MarketProfile {
    /// Daily reference for a nutrient, falling back to [`DEFAULT_DAILY_REFERENCE`].
    pub fn daily_reference(&self, nutrient: &str) -> f64 {
        let key = nutrient_key(nutrient);
        self.daily_references
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .unwrap_or(DEFAULT_DAILY_REFERENCE)
    }

    /// `round(amount / reference * 100)`, clamped at zero.
    pub fn daily_value_percent(&self, nutrient: &str, amount: f64) -> u32 {
        let percent = (amount / self.daily_reference(nutrient) * 100.0).round();
        percent.max(0.0) as u32
    }

    /// Empty allergen text yields an empty statement, never a dangling prefix.
    pub fn format_allergen_statement(&self, allergens: &str) -> String {
        let allergens = allergens.trim();
        if allergens.is_empty() {
            return String::new();
        }
        format!("{} {}", self.allergen_prefix, allergens)
    }

    /// Keep requested certifications that match a whitelist entry by
    /// case-insensitive substring containment in either direction.
    ///
    /// Matches are reported under the whitelist's canonical name, deduplicated
    /// in first-seen order. The bidirectional rule is loose: a short request
    /// such as "IFS" matches any whitelist entry containing those letters.
    pub fn filter_certifications(&self, requested: &[String]) -> Vec<String> {
        let mut accepted: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !accepted.iter().any(|c| c == name) {
                accepted.push(name.to_string());
            }
        };

        for cert in requested {
            let cert_lower = cert.trim().to_lowercase();
            if cert_lower.is_empty() {
                continue;
            }
            let matched = self.certifications.iter().find(|known| {
                let known_lower = known.to_lowercase();
                known_lower.contains(&cert_lower) || cert_lower.contains(&known_lower)
            });
            if let Some(known) = matched {
                push(*known);
            }
        }

        if self.market == Market::Halal
            && requested.iter().any(|c| c.trim().eq_ignore_ascii_case("halal"))
        {
            push("Halal Certified");
        }

        accepted
    }
}

/// Normalize a nutrient display name or key to the reference-table key.
///
/// "Total Fat" -> "total_fat". English, Spanish, Portuguese and Chinese
/// display names fold onto the table's keys, so localized rows still find
/// their market reference.
pub fn nutrient_key(name: &str) -> String {
    let key: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let canonical = match key.as_str() {
        "fat" | "total_fat" | "grasas" | "grasas_totales" | "grasa_total" | "gorduras"
        | "gorduras_totais" | "脂肪" | "總脂肪" | "总脂肪" => "total_fat",
        "saturates" | "saturated_fat" | "grasas_saturadas" | "gorduras_saturadas" | "飽和脂肪"
        | "饱和脂肪" => "saturated_fat",
        "carbohydrate" | "carbohydrates" | "total_carbohydrates" | "hidratos_de_carbono"
        | "carbohidratos" | "carboidratos" | "碳水化合物" => "total_carbs",
        "total_sugars" | "azúcares" | "azucares" | "açúcares" | "açúcares_totais" | "糖"
        | "糖類" | "糖类" => "sugars",
        "dietary_fiber" | "fibre" | "fibra" | "fibra_alimentaria" | "fibra_alimentar"
        | "膳食纖維" | "膳食纤维" => "fiber",
        "proteína" | "proteínas" | "proteinas" | "蛋白質" | "蛋白质" => "protein",
        "sal" | "鹽" | "盐" => "salt",
        "sodio" | "sódio" | "鈉" | "钠" => "sodium",
        "energy" | "energía" | "energia" | "valor_energético" | "valor_energetico" | "能量"
        | "熱量" => "calories",
        _ => return key,
    };
    canonical.to_string()
}

/// Read-only table of every market profile.
pub struct RegulationRegistry {
    profiles: [MarketProfile; 5],
}

impl RegulationRegistry {
    pub fn new() -> Self {
        Self {
            profiles: Market::ALL.map(build_profile),
        }
    }

    /// Process-wide registry, built on first use and never mutated.
    pub fn global() -> &'static RegulationRegistry {
        static REGISTRY: OnceLock<RegulationRegistry> = OnceLock::new();
        REGISTRY.get_or_init(RegulationRegistry::new)
    }

    pub fn profile(&self, market: Market) -> &MarketProfile {
        &self.profiles[market.index()]
    }

    pub fn resolve(&self, market_id: &str) -> Result<&MarketProfile, RegistryError> {
        Market::parse(market_id).map(|m| self.profile(m))
    }

    pub fn list(&self) -> impl Iterator<Item = &MarketProfile> {
        self.profiles.iter()
    }

    pub fn daily_value_percent(
        &self,
        nutrient: &str,
        amount: f64,
        market_id: &str,
    ) -> Result<u32, RegistryError> {
        Ok(self.resolve(market_id)?.daily_value_percent(nutrient, amount))
    }

    pub fn format_allergen_statement(
        &self,
        allergens: &str,
        market_id: &str,
    ) -> Result<String, RegistryError> {
        Ok(self.resolve(market_id)?.format_allergen_statement(allergens))
    }

    pub fn filter_certifications(
        &self,
        requested: &[String],
        market_id: &str,
    ) -> Result<Vec<String>, RegistryError> {
        Ok(self.resolve(market_id)?.filter_certifications(requested))
    }

    pub fn mandatory_warnings(&self, market_id: &str) -> Result<&[&'static str], RegistryError> {
        Ok(&self.resolve(market_id)?.mandatory_warnings)
    }
}

impl Default for RegulationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn references(fat: f64, saturated: f64, sugars: f64, salt: f64, protein: f64) -> Vec<(&'static str, f64)> {
    vec![
        ("total_fat", fat),
        ("saturated_fat", saturated),
        ("sugars", sugars),
        ("salt", salt),
        ("fiber", 25.0),
        ("protein", protein),
        ("calories", 2000.0),
    ]
}

fn build_profile(market: Market) -> MarketProfile {
    match market {
        Market::Spain => MarketProfile {
            market,
            title: "Información Nutricional",
            language: "Spanish",
            regulation: "EU Regulation 1169/2011",
            energy_unit: "kJ and kcal",
            daily_references: references(70.0, 20.0, 90.0, 6.0, 50.0),
            mandatory_warnings: vec![
                "Cumple con Reglamento (UE) Nº 1169/2011",
                "Información nutricional por 100g",
            ],
            allergen_prefix: "Contiene:",
            certifications: vec!["EU Organic", "IFS", "BRC"],
            fonts: FontRequirements::standard(&[TextRole::Title, TextRole::DailyValues]),
            mandatory_nutrients: EU_MANDATORY_NUTRIENTS.to_vec(),
            required_mentions: vec![],
        },
        Market::Angola => MarketProfile {
            market,
            title: "Informação Nutricional",
            language: "Portuguese",
            regulation: "ARSO standards",
            energy_unit: "kcal",
            daily_references: references(65.0, 20.0, 90.0, 5.0, 50.0),
            mandatory_warnings: vec![
                "Produto importado - cumpre padrões ARSO",
                "Informação nutricional por 100g",
            ],
            allergen_prefix: "ALÉRGENOS:",
            certifications: vec!["ARSO", "IFS", "Halal"],
            fonts: FontRequirements::standard(&[TextRole::Title, TextRole::ImportWarning]),
            mandatory_nutrients: vec![],
            required_mentions: vec![RequiredMention::new(
                "tropical climate storage",
                &["tropical", "climate", "clima"],
                false,
            )],
        },
        Market::Macau => MarketProfile {
            market,
            title: "營養標籤",
            language: "Chinese Traditional and English",
            regulation: "Macau SAR requirements",
            energy_unit: "kcal",
            daily_references: references(60.0, 20.0, 90.0, 5.0, 50.0),
            mandatory_warnings: vec![
                "符合澳門特別行政區食品安全標準",
                "Nutritional information per 100g",
            ],
            allergen_prefix: "過敏原 / Allergens:",
            certifications: vec!["Macau Food Safety", "Halal", "Organic"],
            fonts: FontRequirements::standard(&[TextRole::Title]),
            mandatory_nutrients: vec![],
            required_mentions: vec![],
        },
        Market::Brazil => MarketProfile {
            market,
            title: "Informação Nutricional",
            language: "Portuguese",
            regulation: "ANVISA RDC 429/2020",
            energy_unit: "kcal",
            daily_references: references(55.0, 22.0, 50.0, 2.0, 75.0),
            mandatory_warnings: vec![
                "Cumpre com RDC ANVISA 429/2020",
                "Informação nutricional por 100g",
                "ALÉRGENOS: Contém derivados de leite",
            ],
            allergen_prefix: "ALÉRGENOS:",
            certifications: vec!["ANVISA", "IFS", "BRC", "Halal"],
            fonts: FontRequirements::standard(&[TextRole::Title, TextRole::AnvisaCompliance]),
            mandatory_nutrients: vec![],
            required_mentions: vec![
                RequiredMention::new("ANVISA compliance", &["anvisa"], true),
                RequiredMention::new("SAC customer service contact", &["sac", "customer service"], false),
            ],
        },
        Market::Halal => MarketProfile {
            market,
            title: "Nutrition Facts / معلومات التغذية",
            language: "English and Arabic",
            regulation: "Islamic dietary compliance",
            energy_unit: "kcal",
            daily_references: references(65.0, 20.0, 90.0, 6.0, 50.0),
            mandatory_warnings: vec![
                "Halal Certified - Certified by Islamic authority",
                "مُصادق عليه حلال - مُعتمد من السلطة الإسلامية",
            ],
            allergen_prefix: "ALÉRGENOS / المواد المسببة للحساسية:",
            certifications: vec!["Halal", "Islamic Authority", "IFS"],
            fonts: FontRequirements::standard(&[TextRole::Title, TextRole::HalalCertification]),
            mandatory_nutrients: vec![],
            required_mentions: vec![],
        },
    }
}
