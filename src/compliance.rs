//! Compliance Report - Rule/Report Separation
//!
//! Rules inspect the merged label content against the market profile and
//! produce structured violations. The report is advisory: it travels with
//! the rendered label and never stops a render.

use serde::{Deserialize, Serialize};

use crate::content::LabelContent;
use crate::regulations::{Market, MarketProfile};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub remediation: Vec<String>,
}

impl ComplianceViolation {
    fn new(rule: &str, severity: ViolationSeverity, message: impl Into<String>, remediation: &str) -> Self {
        Self {
            rule: rule.to_string(),
            severity,
            message: message.into(),
            remediation: vec![remediation.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// False iff any violation has error severity.
    pub compliant: bool,
    pub market: Market,
    pub violations: Vec<ComplianceViolation>,
}

impl ComplianceReport {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn count(&self, severity: ViolationSeverity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }
}

/// Compliance rule trait - produces violations
pub trait ComplianceRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, content: &LabelContent, profile: &MarketProfile) -> Vec<ComplianceViolation>;
}

// --- Concrete Rules ---

pub struct IngredientsPresentRule;

impl ComplianceRule for IngredientsPresentRule {
    fn name(&self) -> &'static str { "ingredients_present" }

    fn check(&self, content: &LabelContent, _profile: &MarketProfile) -> Vec<ComplianceViolation> {
        if content.ingredients.trim().is_empty() {
            vec![ComplianceViolation::new(
                self.name(),
                ViolationSeverity::Error,
                "Ingredients list is mandatory and cannot be empty",
                "Provide the full ingredient list in descending order of weight",
            )]
        } else {
            vec![]
        }
    }
}

pub struct NutritionDeclaredRule;

impl ComplianceRule for NutritionDeclaredRule {
    fn name(&self) -> &'static str { "nutrition_declared" }

    fn check(&self, content: &LabelContent, _profile: &MarketProfile) -> Vec<ComplianceViolation> {
        if content.nutrients.is_empty() {
            vec![ComplianceViolation::new(
                self.name(),
                ViolationSeverity::Error,
                "Nutrition declaration has no nutrient rows",
                "Supply per-serving nutrient values",
            )]
        } else {
            vec![]
        }
    }
}

pub struct AllergensDeclaredRule;

impl ComplianceRule for AllergensDeclaredRule {
    fn name(&self) -> &'static str { "allergens_declared" }

    fn check(&self, content: &LabelContent, _profile: &MarketProfile) -> Vec<ComplianceViolation> {
        if content.allergens.trim().is_empty() {
            vec![ComplianceViolation::new(
                self.name(),
                ViolationSeverity::Warning,
                "No allergen information provided",
                "Confirm the product contains no declarable allergens",
            )]
        } else {
            vec![]
        }
    }
}

pub struct RegulatoryNotesRule;

impl ComplianceRule for RegulatoryNotesRule {
    fn name(&self) -> &'static str { "regulatory_notes" }

    fn check(&self, content: &LabelContent, profile: &MarketProfile) -> Vec<ComplianceViolation> {
        if content.regulatory_notes.trim().is_empty() {
            vec![ComplianceViolation::new(
                self.name(),
                ViolationSeverity::Warning,
                format!("No regulatory note referencing {}", profile.regulation),
                "Add a compliance statement for the target regulation",
            )]
        } else {
            vec![]
        }
    }
}

pub struct EnergyUnitRule;

impl ComplianceRule for EnergyUnitRule {
    fn name(&self) -> &'static str { "energy_unit" }

    fn check(&self, content: &LabelContent, profile: &MarketProfile) -> Vec<ComplianceViolation> {
        let calories = content.calories.to_lowercase();
        let units = profile.energy_unit.replace(" and ", "/");
        let missing: Vec<&str> = units
            .split('/')
            .map(str::trim)
            .filter(|unit| !unit.is_empty() && !calories.contains(&unit.to_lowercase()))
            .collect();

        if missing.is_empty() {
            return vec![];
        }
        vec![ComplianceViolation::new(
            self.name(),
            ViolationSeverity::Info,
            format!(
                "Energy should be stated in {} (missing {})",
                profile.energy_unit,
                missing.join(", ")
            ),
            "Express energy in every unit the market requires",
        )]
    }
}

/// Every nutrient the market mandates must have a row. Energy is declared
/// on its own line, so a non-empty calories text covers `calories`.
pub struct MandatoryNutrientsRule;

impl ComplianceRule for MandatoryNutrientsRule {
    fn name(&self) -> &'static str { "mandatory_nutrients" }

    fn check(&self, content: &LabelContent, profile: &MarketProfile) -> Vec<ComplianceViolation> {
        let energy = content.calories.trim();
        let energy_declared = !energy.is_empty() && energy != "0";

        let missing: Vec<&str> = profile
            .mandatory_nutrients
            .iter()
            .copied()
            .filter(|key| {
                let has_row = content.nutrients.iter().any(|row| row.key == *key);
                !(has_row || (*key == "calories" && energy_declared))
            })
            .collect();

        if missing.is_empty() {
            return vec![];
        }
        vec![ComplianceViolation::new(
            self.name(),
            ViolationSeverity::Error,
            format!(
                "Missing mandatory nutrition declaration under {}: {}",
                profile.regulation,
                missing.join(", ")
            ),
            "Declare every mandatory nutrient, even when the amount is zero",
        )]
    }
}

/// Topics the regulatory notes must mention for the market.
pub struct RegulationMentionRule;

impl ComplianceRule for RegulationMentionRule {
    fn name(&self) -> &'static str { "regulation_mention" }

    fn check(&self, content: &LabelContent, profile: &MarketProfile) -> Vec<ComplianceViolation> {
        let notes = format!(
            "{} {}",
            content.regulatory_notes,
            content.market_specific_warnings.as_deref().unwrap_or_default()
        );
        profile
            .required_mentions
            .iter()
            .filter(|mention| !mention.is_met_by(&notes))
            .map(|mention| {
                let severity = if mention.mandatory {
                    ViolationSeverity::Error
                } else {
                    ViolationSeverity::Warning
                };
                ComplianceViolation::new(
                    self.name(),
                    severity,
                    format!("Regulatory notes do not address {}", mention.topic),
                    "Mention the topic in the regulatory notes",
                )
            })
            .collect()
    }
}

/// Validator runs every rule in order and collects the report
pub struct ComplianceValidator {
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl ComplianceValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(IngredientsPresentRule),
                Box::new(NutritionDeclaredRule),
                Box::new(AllergensDeclaredRule),
                Box::new(RegulatoryNotesRule),
                Box::new(EnergyUnitRule),
                Box::new(MandatoryNutrientsRule),
                Box::new(RegulationMentionRule),
            ],
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn ComplianceRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn validate(&self, content: &LabelContent, profile: &MarketProfile) -> ComplianceReport {
        let violations: Vec<ComplianceViolation> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(content, profile))
            .collect();

        let compliant = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        ComplianceReport {
            compliant,
            market: content.market,
            violations,
        }
    }
}

impl Default for ComplianceValidator {
    fn default() -> Self {
        Self::new()
    }
}
