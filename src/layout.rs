//! Layout Sizer - canvas dimensions computed before any drawing.
//!
//! Over-allocates rather than clips: the renderer never re-measures or grows
//! the canvas once painting starts.

use serde::Serialize;

use crate::content::LabelContent;

pub const LABEL_WIDTH: u32 = 400;
pub const BASE_HEIGHT: u32 = 600;
pub const CRISIS_BAND_HEIGHT: u32 = 80;
pub const CERTIFICATION_ROW_HEIGHT: u32 = 25;
pub const MIN_INGREDIENT_HEIGHT: u32 = 50;
pub const INGREDIENT_CHARS_PER_LINE: u32 = 40;
pub const INGREDIENT_LINE_HEIGHT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelSize {
    pub width: u32,
    pub height: u32,
}

/// `max(50, chars / 40 * 20)`, integer division on the character count.
pub fn ingredient_allowance(ingredients: &str) -> u32 {
    let chars = ingredients.chars().count() as u32;
    (chars / INGREDIENT_CHARS_PER_LINE * INGREDIENT_LINE_HEIGHT).max(MIN_INGREDIENT_HEIGHT)
}

pub fn size(content: &LabelContent) -> LabelSize {
    let crisis = if content.crisis.is_some() { CRISIS_BAND_HEIGHT } else { 0 };
    let certifications = content.certifications.len() as u32 * CERTIFICATION_ROW_HEIGHT;

    LabelSize {
        width: LABEL_WIDTH,
        height: BASE_HEIGHT + crisis + certifications + ingredient_allowance(&content.ingredients),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::CrisisAnnotation;
    use crate::crisis::CrisisType;
    use crate::regulations::Market;
    use proptest::prelude::*;

    fn content(ingredients: &str, certs: usize, crisis: bool) -> LabelContent {
        LabelContent {
            product_name: "Test".to_string(),
            market: Market::Spain,
            serving_size: "1 serving".to_string(),
            servings_per_container: "1".to_string(),
            calories: "100 kcal".to_string(),
            nutrients: vec![],
            ingredients: ingredients.to_string(),
            allergens: String::new(),
            certifications: (0..certs).map(|i| format!("Cert {i}")).collect(),
            regulatory_notes: String::new(),
            market_specific_warnings: None,
            crisis: crisis.then(|| CrisisAnnotation {
                crisis_type: CrisisType::Recall,
                warning: "w".to_string(),
                contact: "c".to_string(),
            }),
        }
    }

    #[test]
    fn test_short_ingredients_get_minimum_allowance() {
        assert_eq!(size(&content("", 0, false)).height, BASE_HEIGHT + MIN_INGREDIENT_HEIGHT);
        assert_eq!(ingredient_allowance(&"x".repeat(119)), 50);
    }

    #[test]
    fn test_long_ingredients_grow_by_line() {
        assert_eq!(ingredient_allowance(&"x".repeat(120)), 60);
        assert_eq!(ingredient_allowance(&"x".repeat(400)), 200);
    }

    #[test]
    fn test_allowance_counts_characters_not_bytes() {
        assert_eq!(ingredient_allowance(&"é".repeat(120)), 60);
    }

    #[test]
    fn test_crisis_and_certifications_add_height() {
        let plain = size(&content("", 0, false));
        let full = size(&content("", 3, true));
        assert_eq!(full.width, LABEL_WIDTH);
        assert_eq!(full.height - plain.height, CRISIS_BAND_HEIGHT + 3 * CERTIFICATION_ROW_HEIGHT);
    }

    proptest! {
        #[test]
        fn prop_height_monotonic_in_ingredient_length(a in 0usize..2000, b in 0usize..2000) {
            let (short, long) = if a <= b { (a, b) } else { (b, a) };
            let h_short = size(&content(&"a".repeat(short), 1, false)).height;
            let h_long = size(&content(&"a".repeat(long), 1, false)).height;
            prop_assert!(h_short <= h_long);
        }

        #[test]
        fn prop_height_monotonic_in_certifications(n in 0usize..20, len in 0usize..500) {
            let ingredients = "a".repeat(len);
            let fewer = size(&content(&ingredients, n, false)).height;
            let more = size(&content(&ingredients, n + 1, false)).height;
            prop_assert!(fewer <= more);
        }

        #[test]
        fn prop_crisis_never_shrinks(n in 0usize..10, len in 0usize..500) {
            let ingredients = "a".repeat(len);
            let without = size(&content(&ingredients, n, false)).height;
            let with = size(&content(&ingredients, n, true)).height;
            prop_assert!(without <= with);
        }
    }
}
