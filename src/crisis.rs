//! Crisis Registry - localized warnings and contact lines
//!
//! Lookups are total: a registry miss produces the generic English fallback,
//! so crisis communication is never blocked by missing table entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::regulations::Market;

pub const FALLBACK_CONTACT: &str = "For more information: +1 800 123 456";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrisisType {
    Recall,
    Allergen,
    Contamination,
    Regulatory,
    /// Free-text type outside the known set, stored lower-cased.
    Other(String),
}

impl CrisisType {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "recall" => CrisisType::Recall,
            "allergen" => CrisisType::Allergen,
            "contamination" => CrisisType::Contamination,
            "regulatory" => CrisisType::Regulatory,
            _ => CrisisType::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CrisisType::Recall => "recall",
            CrisisType::Allergen => "allergen",
            CrisisType::Contamination => "contamination",
            CrisisType::Regulatory => "regulatory",
            CrisisType::Other(s) => s,
        }
    }
}

impl From<String> for CrisisType {
    fn from(s: String) -> Self {
        CrisisType::parse(&s)
    }
}

impl From<CrisisType> for String {
    fn from(t: CrisisType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for CrisisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct CrisisRegistry {
    warnings: HashMap<(CrisisType, Market), &'static str>,
    contacts: HashMap<Market, &'static str>,
}

impl CrisisRegistry {
    pub fn new() -> Self {
        use CrisisType::*;
        use Market::*;

        let table: [(CrisisType, Market, &'static str); 20] = [
            (Recall, Spain, "RETIRADA DEL PRODUCTO - No consumir"),
            (Recall, Angola, "RECALL DO PRODUTO - Não consumir"),
            (Recall, Macau, "產品回收 - 請勿食用 / Product Recall - Do not consume"),
            (Recall, Brazil, "RECALL DO PRODUTO - Não consumir"),
            (Recall, Halal, "Product Recall / سحب المنتج - Do not consume / لا تستهلك"),
            (Allergen, Spain, "ADVERTENCIA DE ALÉRGENOS - Puede contener alérgenos no declarados"),
            (Allergen, Angola, "AVISO DE ALÉRGENOS - Pode conter alérgenos não declarados"),
            (Allergen, Macau, "過敏原警告 / Allergen Warning - May contain undeclared allergens"),
            (Allergen, Brazil, "AVISO DE ALÉRGENOS - Pode conter alérgenos não declarados"),
            (Allergen, Halal, "Allergen Warning / تحذير المواد المسببة للحساسية - May contain undeclared allergens"),
            (Contamination, Spain, "ADVERTENCIA DE CONTAMINACIÓN - Producto puede estar contaminado"),
            (Contamination, Angola, "AVISO DE CONTAMINAÇÃO - Produto pode estar contaminado"),
            (Contamination, Macau, "污染警告 / Contamination Warning - Product may be contaminated"),
            (Contamination, Brazil, "AVISO DE CONTAMINAÇÃO - Produto pode estar contaminado"),
            (Contamination, Halal, "Contamination Warning / تحذير التلوث - Product may be contaminated"),
            (Regulatory, Spain, "ACTUALIZACIÓN REGULATORIA - Nuevos requisitos de cumplimiento"),
            (Regulatory, Angola, "ATUALIZAÇÃO REGULATÓRIA - Novos requisitos de conformidade"),
            (Regulatory, Macau, "法規更新 / Regulatory Update - New compliance requirements"),
            (Regulatory, Brazil, "ATUALIZAÇÃO REGULATÓRIA - Novos requisitos de conformidade"),
            (Regulatory, Halal, "Regulatory Update / تحديث تنظيمي - New compliance requirements"),
        ];

        let contacts = HashMap::from([
            (Spain, "Para más información: +34 900 123 456"),
            (Angola, "Para mais informações: +244 222 123 456"),
            (Macau, "更多資訊 / More info: +853 2856 3333"),
            (Brazil, "Para mais informações: 0800 123 456"),
            (Halal, "For more information / لمزيد من المعلومات: +1 800 123 456"),
        ]);

        Self {
            warnings: table
                .into_iter()
                .map(|(kind, market, text)| ((kind, market), text))
                .collect(),
            contacts,
        }
    }

    pub fn global() -> &'static CrisisRegistry {
        static REGISTRY: OnceLock<CrisisRegistry> = OnceLock::new();
        REGISTRY.get_or_init(CrisisRegistry::new)
    }

    /// Localized warning, or `CRISIS WARNING - <TYPE>` for unknown pairs.
    pub fn warning_for(&self, crisis_type: &CrisisType, market_id: &str) -> String {
        Market::parse(market_id)
            .ok()
            .and_then(|market| self.warnings.get(&(crisis_type.clone(), market)))
            .map(|text| text.to_string())
            .unwrap_or_else(|| format!("CRISIS WARNING - {}", crisis_type.as_str().to_uppercase()))
    }

    pub fn contact_for(&self, market_id: &str) -> String {
        Market::parse(market_id)
            .ok()
            .and_then(|market| self.contacts.get(&market))
            .copied()
            .unwrap_or(FALLBACK_CONTACT)
            .to_string()
    }
}

impl Default for CrisisRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Public announcement text. Distinct from the in-label banner warning.
pub fn crisis_communication(crisis_type: &CrisisType, details: &str) -> String {
    let details = details.trim();
    let details = if details.is_empty() { "Urgent safety notice." } else { details };
    format!(
        "URGENT: {} - {} Please contact manufacturer immediately.",
        crisis_type.as_str().to_uppercase(),
        details
    )
}
