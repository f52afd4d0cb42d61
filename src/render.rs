//! Label Renderer - ordered section painting over a vertical cursor
//!
//! Sections are drawn in the fixed [`Section::ORDER`]. Each step takes the
//! current cursor and returns the cursor below what it drew; the canvas only
//! ever moves the cursor down, so sections cannot overlap. The document is
//! built as SVG and rasterized in one pass once every section is placed.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tiny_skia::{Pixmap, Transform};
use tracing::{debug, warn};

use crate::content::LabelContent;
use crate::fonts::FontSet;
use crate::layout::{self, LabelSize};
use crate::regulations::{MarketProfile, TextRole};

pub const MARGIN: f32 = 10.0;
const INDENT: f32 = 20.0;
const LINE_HEIGHT: f32 = 20.0;
const BANNER_HEIGHT: f32 = 60.0;
const BADGE_WIDTH: f32 = 120.0;
const BADGE_HEIGHT: f32 = 25.0;
const BADGE_SPACING: f32 = 35.0;
/// Baseline offset below the text's top edge, as a fraction of font size.
const ASCENT: f32 = 0.8;

const TABLE_HEADER: &str = "Amount per serving | % Daily Value*";
const DAILY_VALUE_NOTE: &str = "* Percent Daily Values are based on a 2000 calorie diet.";

mod palette {
    pub const BLACK: &str = "#000000";
    pub const WHITE: &str = "#FFFFFF";
    pub const RED: &str = "#FF0000";
    pub const LIGHT_GRAY: &str = "#F0F0F0";
    pub const DARK_GRAY: &str = "#404040";
}

#[derive(Debug, Error)]
#[error("Render failed in {section}: {message}")]
pub struct RenderError {
    pub section: String,
    pub message: String,
}

impl RenderError {
    fn new(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    CrisisBanner,
    Title,
    ServingInfo,
    NutritionTable,
    Ingredients,
    Allergens,
    Certifications,
    RegulatoryNotes,
}

impl Section {
    pub const ORDER: [Section; 8] = [
        Section::CrisisBanner,
        Section::Title,
        Section::ServingInfo,
        Section::NutritionTable,
        Section::Ingredients,
        Section::Allergens,
        Section::Certifications,
        Section::RegulatoryNotes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::CrisisBanner => "crisis_banner",
            Section::Title => "title",
            Section::ServingInfo => "serving_info",
            Section::NutritionTable => "nutrition_table",
            Section::Ingredients => "ingredients",
            Section::Allergens => "allergens",
            Section::Certifications => "certifications",
            Section::RegulatoryNotes => "regulatory_notes",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one section drew, and where.
#[derive(Debug, Clone, Serialize)]
pub struct SectionRecord {
    pub section: Section,
    pub top: f32,
    pub bottom: f32,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: f32,
    bold: bool,
    fill: &'static str,
}

impl TextStyle {
    fn new(size: f32, bold: bool, fill: &'static str) -> Self {
        Self { size, bold, fill }
    }
}

/// Greedy word wrap: keep appending words while the measured line fits in
/// `max_width`, otherwise flush and start a new line with the word. A single
/// word wider than `max_width` occupies its own line.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// SVG document under construction plus the vertical cursor.
pub struct Canvas {
    size: LabelSize,
    cursor: f32,
    body: String,
    records: Vec<SectionRecord>,
    pending: Vec<String>,
}

impl Canvas {
    pub fn new(size: LabelSize) -> Self {
        Self {
            size,
            cursor: 0.0,
            body: String::new(),
            records: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn width(&self) -> f32 {
        self.size.width as f32
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, fill: &str, stroke: Option<&str>, radius: f32) {
        let stroke = stroke
            .map(|s| format!(" stroke=\"{s}\" stroke-width=\"1\""))
            .unwrap_or_default();
        self.body.push_str(&format!(
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"{radius:.2}\" fill=\"{fill}\"{stroke}/>\n"
        ));
    }

    fn line(&mut self, x1: f32, y: f32, x2: f32, width: f32) {
        self.body.push_str(&format!(
            "<line x1=\"{x1:.2}\" y1=\"{y:.2}\" x2=\"{x2:.2}\" y2=\"{y:.2}\" stroke=\"{}\" stroke-width=\"{width}\"/>\n",
            palette::BLACK
        ));
    }

    /// Text with its top edge at `top`. Control characters cannot be encoded.
    fn text(&mut self, x: f32, top: f32, text: &str, style: TextStyle) -> Result<(), String> {
        if let Some(c) = text
            .chars()
            .find(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
        {
            return Err(format!("text contains unencodable character U+{:04X}", c as u32));
        }
        let weight = if style.bold { "bold" } else { "normal" };
        self.body.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{:.2}\" font-size=\"{}\" font-weight=\"{weight}\" fill=\"{}\">{}</text>\n",
            top + style.size * ASCENT,
            style.size,
            style.fill,
            xml_escape(text)
        ));
        self.pending.push(text.to_string());
        Ok(())
    }

    /// Close a section. The cursor never moves up.
    fn commit(&mut self, section: Section, top: f32, after: f32) {
        let bottom = after.max(self.cursor);
        let texts = std::mem::take(&mut self.pending);
        if bottom > top || !texts.is_empty() {
            debug!(section = %section, top, bottom, "Drew section");
            self.records.push(SectionRecord { section, top, bottom, texts });
        }
        self.cursor = bottom;
    }

    fn finish(self, font_family: &str) -> RenderedCanvas {
        let LabelSize { width, height } = self.size;
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" font-family=\"{}\">\n",
            xml_escape(font_family)
        );
        svg.push_str(&format!(
            "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"{}\"/>\n",
            palette::WHITE
        ));
        svg.push_str(&self.body);
        svg.push_str("</svg>\n");

        RenderedCanvas {
            size: self.size,
            cursor: self.cursor,
            svg,
            sections: self.records,
        }
    }
}

/// A fully laid-out label, ready to rasterize.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedCanvas {
    pub size: LabelSize,
    /// Final cursor position; at most `size.height` when the sizer held.
    pub cursor: f32,
    #[serde(skip)]
    pub svg: String,
    pub sections: Vec<SectionRecord>,
}

impl RenderedCanvas {
    pub fn first_section(&self) -> Option<Section> {
        self.sections.first().map(|r| r.section)
    }

    pub fn section(&self, section: Section) -> Option<&SectionRecord> {
        self.sections.iter().find(|r| r.section == section)
    }
}

pub struct LabelRenderer {
    fonts: Arc<FontSet>,
}

impl LabelRenderer {
    pub fn new(fonts: Arc<FontSet>) -> Self {
        Self { fonts }
    }

    /// Lay out every section on a canvas sized up front by the layout sizer.
    pub fn render(
        &self,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<RenderedCanvas, RenderError> {
        let size = layout::size(content);
        let mut canvas = Canvas::new(size);

        for section in Section::ORDER {
            let top = canvas.cursor();
            let after = self
                .draw_section(section, &mut canvas, top, content, profile)
                .map_err(|message| RenderError::new(section.name(), message))?;
            canvas.commit(section, top, after);
        }

        if canvas.cursor() > size.height as f32 {
            warn!(
                cursor = canvas.cursor(),
                height = size.height,
                "Label content exceeds the estimated canvas height and will be clipped"
            );
        }

        Ok(canvas.finish(self.fonts.family()))
    }

    pub fn rasterize(&self, canvas: &RenderedCanvas) -> Result<Pixmap, RenderError> {
        let mut opt = usvg::Options::default();
        opt.font_family = self.fonts.family().to_string();
        opt.fontdb = self.fonts.database();

        let tree = usvg::Tree::from_str(&canvas.svg, &opt)
            .map_err(|e| RenderError::new("rasterize", format!("SVG parse error: {e}")))?;
        let mut pixmap = Pixmap::new(canvas.size.width, canvas.size.height).ok_or_else(|| {
            RenderError::new(
                "rasterize",
                format!("cannot allocate {}x{} canvas", canvas.size.width, canvas.size.height),
            )
        })?;
        resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
        Ok(pixmap)
    }

    fn draw_section(
        &self,
        section: Section,
        canvas: &mut Canvas,
        y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        match section {
            Section::CrisisBanner => self.draw_crisis_banner(canvas, y, content, profile),
            Section::Title => self.draw_title(canvas, y, profile),
            Section::ServingInfo => self.draw_serving_info(canvas, y, content, profile),
            Section::NutritionTable => self.draw_nutrition_table(canvas, y, content, profile),
            Section::Ingredients => self.draw_ingredients(canvas, y, content, profile),
            Section::Allergens => self.draw_allergens(canvas, y, content, profile),
            Section::Certifications => self.draw_certifications(canvas, y, content, profile),
            Section::RegulatoryNotes => self.draw_regulatory_notes(canvas, y, profile),
        }
    }

    fn draw_crisis_banner(
        &self,
        canvas: &mut Canvas,
        y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        let Some(crisis) = &content.crisis else {
            return Ok(y);
        };
        let fonts = &profile.fonts;
        let width = canvas.width();

        canvas.rect(0.0, y, width, BANNER_HEIGHT, palette::RED, None, 0.0);
        canvas.text(
            MARGIN,
            y + 10.0,
            &crisis.warning,
            TextStyle::new(fonts.body_size, true, palette::WHITE),
        )?;
        canvas.text(
            MARGIN,
            y + 35.0,
            &crisis.contact,
            TextStyle::new(fonts.allergen_size, false, palette::WHITE),
        )?;
        Ok(y + BANNER_HEIGHT + 10.0)
    }

    fn draw_title(&self, canvas: &mut Canvas, y: f32, profile: &MarketProfile) -> Result<f32, String> {
        let size = profile.fonts.title_size;
        let bold = profile.fonts.requires_bold(TextRole::Title);
        let text_width = self.fonts.measure(profile.title, size, bold);
        let x = ((canvas.width() - text_width) / 2.0).max(0.0);

        canvas.text(x, y, profile.title, TextStyle::new(size, bold, palette::BLACK))?;
        canvas.line(x, y + 25.0, x + text_width, 2.0);
        Ok(y + 40.0)
    }

    fn draw_serving_info(
        &self,
        canvas: &mut Canvas,
        y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        let style = TextStyle::new(profile.fonts.body_size, false, palette::BLACK);
        canvas.text(MARGIN, y, &format!("Serving size: {}", content.serving_size), style)?;
        canvas.text(
            MARGIN,
            y + LINE_HEIGHT,
            &format!("Servings per container: {}", content.servings_per_container),
            style,
        )?;
        Ok(y + 50.0)
    }

    fn draw_nutrition_table(
        &self,
        canvas: &mut Canvas,
        mut y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        let fonts = &profile.fonts;
        let right = canvas.width() - MARGIN;

        canvas.text(
            MARGIN,
            y,
            &format!("Calories {}", content.calories),
            TextStyle::new(fonts.body_size, true, palette::BLACK),
        )?;
        canvas.line(MARGIN, y + 25.0, right, 2.0);
        y += 35.0;

        canvas.text(MARGIN, y, TABLE_HEADER, TextStyle::new(fonts.body_size, false, palette::BLACK))?;
        canvas.line(MARGIN, y + LINE_HEIGHT, right, 1.0);
        y += 30.0;

        let bold_values = fonts.requires_bold(TextRole::DailyValues);
        for row in &content.nutrients {
            let x = if row.indented { INDENT } else { MARGIN };
            let style = TextStyle::new(fonts.body_size, row.major, palette::BLACK);
            canvas.text(x, y, &format!("{} {}", row.name, row.amount_text()), style)?;

            let dv_bold = row.major || bold_values;
            let dv_text = format!("{}%", row.daily_value);
            let dv_width = self.fonts.measure(&dv_text, fonts.body_size, dv_bold);
            canvas.text(
                right - dv_width,
                y,
                &dv_text,
                TextStyle::new(fonts.body_size, dv_bold, palette::BLACK),
            )?;
            y += LINE_HEIGHT;
        }

        y += 10.0;
        canvas.text(
            MARGIN,
            y,
            DAILY_VALUE_NOTE,
            TextStyle::new(fonts.allergen_size, false, palette::DARK_GRAY),
        )?;
        Ok(y + 30.0)
    }

    fn draw_ingredients(
        &self,
        canvas: &mut Canvas,
        mut y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        if content.ingredients.trim().is_empty() {
            return Ok(y);
        }
        let size = profile.fonts.body_size;
        let style = TextStyle::new(size, false, palette::BLACK);

        canvas.text(MARGIN, y, "Ingredients:", style)?;
        y += 25.0;

        let max_width = canvas.width() - 2.0 * MARGIN;
        for line in wrap_text(&content.ingredients, max_width, |s| self.fonts.measure(s, size, false)) {
            canvas.text(MARGIN, y, &line, style)?;
            y += LINE_HEIGHT;
        }
        Ok(y + 10.0)
    }

    fn draw_allergens(
        &self,
        canvas: &mut Canvas,
        y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        let statement = profile.format_allergen_statement(&content.allergens);
        if statement.is_empty() {
            return Ok(y);
        }
        canvas.text(
            MARGIN,
            y,
            &statement,
            TextStyle::new(profile.fonts.allergen_size, true, palette::RED),
        )?;
        Ok(y + 25.0)
    }

    fn draw_certifications(
        &self,
        canvas: &mut Canvas,
        mut y: f32,
        content: &LabelContent,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        if content.certifications.is_empty() {
            return Ok(y);
        }
        let fonts = &profile.fonts;
        canvas.text(
            MARGIN,
            y,
            "Certifications:",
            TextStyle::new(fonts.body_size, false, palette::BLACK),
        )?;
        y += 25.0;

        // Badges stack vertically, one per row.
        for cert in &content.certifications {
            canvas.rect(
                MARGIN,
                y,
                BADGE_WIDTH,
                BADGE_HEIGHT,
                palette::LIGHT_GRAY,
                Some(palette::DARK_GRAY),
                4.0,
            );
            canvas.text(
                MARGIN + 5.0,
                y + 5.0,
                cert,
                TextStyle::new(fonts.allergen_size, false, palette::BLACK),
            )?;
            y += BADGE_SPACING;
        }
        Ok(y)
    }

    fn draw_regulatory_notes(
        &self,
        canvas: &mut Canvas,
        mut y: f32,
        profile: &MarketProfile,
    ) -> Result<f32, String> {
        let emphasize_first = [
            TextRole::ImportWarning,
            TextRole::AnvisaCompliance,
            TextRole::HalalCertification,
        ]
        .iter()
        .any(|role| profile.fonts.requires_bold(*role));

        for (i, warning) in profile.mandatory_warnings.iter().enumerate() {
            let bold = emphasize_first && i == 0;
            canvas.text(
                MARGIN,
                y,
                warning,
                TextStyle::new(profile.fonts.allergen_size, bold, palette::DARK_GRAY),
            )?;
            y += LINE_HEIGHT;
        }
        Ok(y + 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CrisisAnnotation, NutrientRow};
    use crate::crisis::CrisisType;
    use crate::layout::LABEL_WIDTH;
    use crate::regulations::{Market, RegulationRegistry};
    use proptest::prelude::*;

    const LABEL_WIDTH_F: f32 = LABEL_WIDTH as f32;

    fn renderer() -> LabelRenderer {
        LabelRenderer::new(Arc::new(FontSet::builtin()))
    }

    /// (x, bold, text) for every `<text>` element, in document order.
    fn text_elements(svg: &str) -> Vec<(f32, bool, String)> {
        svg.lines()
            .filter(|line| line.starts_with("<text "))
            .map(|line| {
                let x = line["<text x=\"".len()..].split('"').next().unwrap().parse().unwrap();
                let bold = line.contains("font-weight=\"bold\"");
                let start = line.find('>').unwrap() + 1;
                let end = line.rfind("</text>").unwrap();
                (x, bold, line[start..end].to_string())
            })
            .collect()
    }

    fn find<'a>(elements: &'a [(f32, bool, String)], text: &str) -> &'a (f32, bool, String) {
        elements.iter().find(|(_, _, t)| t == text).unwrap()
    }

    fn profile(market: Market) -> MarketProfile {
        RegulationRegistry::new().profile(market).clone()
    }

    fn row(name: &str, amount: f64, major: bool, indented: bool) -> NutrientRow {
        NutrientRow {
            key: crate::regulations::nutrient_key(name),
            name: name.to_string(),
            amount,
            unit: "g".to_string(),
            daily_value: 10,
            major,
            indented,
        }
    }

    fn content() -> LabelContent {
        LabelContent {
            product_name: "Granola".to_string(),
            market: Market::Spain,
            serving_size: "40g".to_string(),
            servings_per_container: "8".to_string(),
            calories: "180 kcal".to_string(),
            nutrients: vec![
                row("Total Fat", 7.0, true, false),
                row("Saturated Fat", 1.5, false, true),
                row("Protein", 5.0, true, false),
            ],
            ingredients: "oats, honey, almonds, sunflower oil, sea salt".to_string(),
            allergens: String::new(),
            certifications: vec![],
            regulatory_notes: String::new(),
            market_specific_warnings: None,
            crisis: None,
        }
    }

    fn width_of(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn test_wrap_is_greedy() {
        let lines = wrap_text("aa bb cc dd", 5.0, width_of);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn test_wrap_overlong_word_gets_own_line() {
        let lines = wrap_text("a verylongword b", 5.0, width_of);
        assert_eq!(lines, vec!["a", "verylongword", "b"]);
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap_text("   ", 100.0, width_of).is_empty());
    }

    proptest! {
        #[test]
        fn prop_wrap_is_idempotent(words in prop::collection::vec("[a-z]{1,12}", 0..40), width in 5.0f32..60.0) {
            let text = words.join(" ");
            let first = wrap_text(&text, width, width_of);
            let second = wrap_text(&first.join(" "), width, width_of);
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_sections_follow_fixed_order_without_crisis() {
        let canvas = renderer().render(&content(), &profile(Market::Spain)).unwrap();
        let order: Vec<Section> = canvas.sections.iter().map(|r| r.section).collect();
        assert_eq!(
            order,
            vec![
                Section::Title,
                Section::ServingInfo,
                Section::NutritionTable,
                Section::Ingredients,
                Section::RegulatoryNotes,
            ]
        );
        assert!(canvas.section(Section::CrisisBanner).is_none());
        assert!(canvas.section(Section::Allergens).is_none());
    }

    #[test]
    fn test_crisis_banner_drawn_first() {
        let mut content = content();
        content.crisis = Some(CrisisAnnotation {
            crisis_type: CrisisType::Recall,
            warning: "RETIRADA DEL PRODUCTO - No consumir".to_string(),
            contact: "Para más información: +34 900 123 456".to_string(),
        });
        let canvas = renderer().render(&content, &profile(Market::Spain)).unwrap();
        assert_eq!(canvas.first_section(), Some(Section::CrisisBanner));
        let banner = &canvas.sections[0];
        assert_eq!(banner.top, 0.0);
        assert_eq!(banner.texts[0], "RETIRADA DEL PRODUCTO - No consumir");
        assert_eq!(banner.texts[1], "Para más información: +34 900 123 456");
    }

    #[test]
    fn test_sections_never_overlap() {
        let mut content = content();
        content.allergens = "almonds".to_string();
        content.certifications = vec!["IFS".to_string(), "BRC".to_string()];
        let canvas = renderer().render(&content, &profile(Market::Brazil)).unwrap();
        for pair in canvas.sections.windows(2) {
            assert!(pair[0].bottom <= pair[1].top);
            assert!(pair[0].top < pair[0].bottom);
        }
        assert!(canvas.cursor <= canvas.size.height as f32);
    }

    #[test]
    fn test_allergen_line_uses_market_prefix() {
        let mut content = content();
        content.allergens = "milk".to_string();
        let canvas = renderer().render(&content, &profile(Market::Brazil)).unwrap();
        let allergens = canvas.section(Section::Allergens).unwrap();
        assert_eq!(allergens.texts, vec!["ALÉRGENOS: milk".to_string()]);
    }

    #[test]
    fn test_regulatory_notes_in_registry_order() {
        let profile = profile(Market::Brazil);
        let canvas = renderer().render(&content(), &profile).unwrap();
        let notes = canvas.section(Section::RegulatoryNotes).unwrap();
        let expected: Vec<String> = profile.mandatory_warnings.iter().map(|s| s.to_string()).collect();
        assert_eq!(notes.texts, expected);
    }

    #[test]
    fn test_bold_roles_follow_market() {
        let brazil = profile(Market::Brazil);
        let canvas = renderer().render(&content(), &brazil).unwrap();
        let elements = text_elements(&canvas.svg);
        assert!(find(&elements, brazil.mandatory_warnings[0]).1);
        assert!(!find(&elements, brazil.mandatory_warnings[1]).1);

        let spain = profile(Market::Spain);
        let canvas = renderer().render(&content(), &spain).unwrap();
        let elements = text_elements(&canvas.svg);
        assert!(!find(&elements, spain.mandatory_warnings[0]).1);
        assert!(find(&elements, spain.title).1);

        // The allergen line is bold even where no role asks for it.
        let mut content = content();
        content.allergens = "sesame".to_string();
        let halal = profile(Market::Halal);
        let canvas = renderer().render(&content, &halal).unwrap();
        let statement = halal.format_allergen_statement("sesame");
        assert!(find(&text_elements(&canvas.svg), &xml_escape(&statement)).1);
    }

    #[test]
    fn test_certification_badges_stack_vertically() {
        let mut content = content();
        content.certifications = vec!["IFS".to_string(), "BRC".to_string(), "EU Organic".to_string()];
        let canvas = renderer().render(&content, &profile(Market::Spain)).unwrap();
        let certs = canvas.section(Section::Certifications).unwrap();
        assert_eq!(certs.texts.len(), 4);
        assert_eq!(certs.bottom - certs.top, 25.0 + 3.0 * BADGE_SPACING);
        assert_eq!(canvas.svg.matches("rx=\"4.00\"").count(), 3);
    }

    #[test]
    fn test_control_character_fails_with_section_name() {
        let mut content = content();
        content.serving_size = "40g\u{0007}".to_string();
        let err = renderer().render(&content, &profile(Market::Spain)).unwrap_err();
        assert_eq!(err.section, "serving_info");
    }

    #[test]
    fn test_svg_text_is_escaped() {
        let mut content = content();
        content.ingredients = "salt & <pepper>".to_string();
        let canvas = renderer().render(&content, &profile(Market::Spain)).unwrap();
        assert!(canvas.svg.contains("salt &amp; &lt;pepper&gt;"));
    }

    #[test]
    fn test_daily_values_end_at_right_margin() {
        let fonts = Arc::new(FontSet::builtin());
        let canvas = LabelRenderer::new(Arc::clone(&fonts))
            .render(&content(), &profile(Market::Spain))
            .unwrap();
        let elements = text_elements(&canvas.svg);
        let values: Vec<_> = elements.iter().filter(|(_, _, t)| t == "10%").collect();
        assert_eq!(values.len(), 3);
        for (x, bold, text) in values {
            let right = x + fonts.measure(text, 12.0, *bold);
            assert!((right - (LABEL_WIDTH_F - MARGIN)).abs() < 0.01, "value ends at {right}");
        }
    }

    #[test]
    fn test_row_indent_and_weight() {
        let mut profile = profile(Market::Spain);
        profile.fonts.bold_roles.remove(&TextRole::DailyValues);
        let canvas = renderer().render(&content(), &profile).unwrap();
        let elements = text_elements(&canvas.svg);

        assert_eq!(find(&elements, "Total Fat 7g"), &(MARGIN, true, "Total Fat 7g".to_string()));
        assert_eq!(
            find(&elements, "Saturated Fat 1.5g"),
            &(INDENT, false, "Saturated Fat 1.5g".to_string())
        );
        assert!(find(&elements, "Protein 5g").1);

        // Without the market rule only major rows carry a bold value.
        let weights: Vec<bool> = elements
            .iter()
            .filter(|(_, _, t)| t == "10%")
            .map(|(_, bold, _)| *bold)
            .collect();
        assert_eq!(weights, vec![true, false, true]);
    }

    #[test]
    fn test_ingredients_wrap_greedily_within_margins() {
        let fonts = Arc::new(FontSet::builtin());
        let mut content = content();
        content.ingredients = "whole grain rolled oats, wildflower honey, roasted almonds, \
            cold pressed sunflower oil, brown rice syrup, sea salt, natural vanilla flavouring, \
            mixed tocopherols"
            .to_string();
        let canvas = LabelRenderer::new(Arc::clone(&fonts))
            .render(&content, &profile(Market::Spain))
            .unwrap();
        let record = canvas.section(Section::Ingredients).unwrap();
        let lines = &record.texts[1..];
        assert!(lines.len() > 1);

        let max_width = LABEL_WIDTH_F - 2.0 * MARGIN;
        let width = |s: &str| fonts.measure(s, 12.0, false);
        for line in lines {
            assert!(width(line) <= max_width, "{line:?} overflows");
        }
        for pair in lines.windows(2) {
            let next_word = pair[1].split(' ').next().unwrap();
            assert!(width(&format!("{} {next_word}", pair[0])) > max_width);
        }
        assert_eq!(lines.join(" "), content.ingredients.split_whitespace().collect::<Vec<_>>().join(" "));

        let elements = text_elements(&canvas.svg);
        assert!(lines.iter().all(|line| find(&elements, line).0 == MARGIN));
    }

    #[test]
    fn test_text_is_painted() {
        let renderer = renderer();
        let canvas = renderer.render(&content(), &profile(Market::Spain)).unwrap();
        let pixmap = renderer.rasterize(&canvas).unwrap();
        let serving = canvas.section(Section::ServingInfo).unwrap();

        // The serving band holds text only; any dark pixel is a glyph.
        let width = pixmap.width() as usize;
        let inked = (serving.top as usize..serving.bottom as usize)
            .flat_map(|y| pixmap.pixels()[y * width..(y + 1) * width].iter())
            .filter(|p| p.red() < 128)
            .count();
        assert!(inked > 100, "only {inked} inked pixels");
    }

    #[test]
    fn test_rasterize_matches_computed_size() {
        let renderer = renderer();
        let canvas = renderer.render(&content(), &profile(Market::Macau)).unwrap();
        let pixmap = renderer.rasterize(&canvas).unwrap();
        assert_eq!(pixmap.width(), canvas.size.width);
        assert_eq!(pixmap.height(), canvas.size.height);
    }
}
