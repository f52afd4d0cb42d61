//! Label Pipeline - Single Entry Point
//!
//! resolve market -> generate content -> merge -> size -> draw -> encode.
//! Every render goes through `generate_label`; batch renders call it once per
//! market and isolate failures to that market.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tiny_skia::Pixmap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compliance::{ComplianceReport, ComplianceValidator};
use crate::config::LabelConfig;
use crate::content::{CrisisInput, LabelAssembler, LabelContent, ProductInput, RenderRequest};
use crate::crisis::CrisisRegistry;
use crate::fonts::FontSet;
use crate::generation::{ContentGenerator, GenerationError, MockContentGenerator};
use crate::hashing::content_hash;
use crate::print::{self, ExportError, PrintSpec, BASE_DPI};
use crate::regulations::{Market, RegistryError, RegulationRegistry};
use crate::render::{LabelRenderer, RenderError, SectionRecord};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Unsupported market: {0}")]
    UnsupportedMarket(String),

    #[error("Content generation failed: {0}")]
    ContentGenerationFailure(String),

    #[error("Render failed in {section}: {message}")]
    RenderFailure { section: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LabelError {
    pub fn kind(&self) -> &'static str {
        match self {
            LabelError::UnsupportedMarket(_) => "unsupported_market",
            LabelError::ContentGenerationFailure(_) => "content_generation_failure",
            LabelError::RenderFailure { .. } => "render_failure",
            LabelError::Serialization(_) => "serialization",
        }
    }

    /// Caused by the request rather than by the engine.
    pub fn is_input_error(&self) -> bool {
        matches!(self, LabelError::UnsupportedMarket(_))
    }
}

impl From<RegistryError> for LabelError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownMarket(market) => LabelError::UnsupportedMarket(market),
        }
    }
}

impl From<GenerationError> for LabelError {
    fn from(err: GenerationError) -> Self {
        LabelError::ContentGenerationFailure(err.to_string())
    }
}

impl From<RenderError> for LabelError {
    fn from(err: RenderError) -> Self {
        LabelError::RenderFailure {
            section: err.section,
            message: err.message,
        }
    }
}

impl From<ExportError> for LabelError {
    fn from(err: ExportError) -> Self {
        LabelError::RenderFailure {
            section: "export".to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedLabel {
    pub id: String,
    pub market: Market,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub content: LabelContent,
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
    pub sections: Vec<SectionRecord>,
    pub compliance: ComplianceReport,
    pub crisis_communication: Option<String>,
    /// Base-resolution PNG.
    #[serde(skip)]
    pub png_bytes: Vec<u8>,
    #[serde(skip)]
    pub raster: Pixmap,
}

/// One entry of a batch render, in request order.
#[derive(Debug)]
pub struct MarketOutcome {
    pub market: String,
    pub result: Result<RenderedLabel, LabelError>,
}

/// `nutrition_label_<market>_<product>_<YYYYmmddHHMMSS>.png`, with a
/// `crisis_label_` prefix when a crisis is attached. Product characters
/// outside `[A-Za-z0-9_-]` become `_`, so the hint is always a single path
/// component.
pub fn filename_hint(market: Market, product_name: &str, crisis: bool, at: DateTime<Utc>) -> String {
    let prefix = if crisis { "crisis_label" } else { "nutrition_label" };
    let product = product_name.trim();
    let product: String = if product.is_empty() {
        "unknown".to_string()
    } else {
        product
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    };
    format!("{prefix}_{market}_{product}_{}.png", at.format("%Y%m%d%H%M%S"))
}

/// The label pipeline - single entry point for all render operations
pub struct LabelPipeline<G> {
    generator: G,
    regulations: &'static RegulationRegistry,
    crisis: &'static CrisisRegistry,
    renderer: LabelRenderer,
    validator: ComplianceValidator,
    config: LabelConfig,
}

impl<G: ContentGenerator> LabelPipeline<G> {
    pub fn new(generator: G, fonts: Arc<FontSet>, config: LabelConfig) -> Self {
        Self {
            generator,
            regulations: RegulationRegistry::global(),
            crisis: CrisisRegistry::global(),
            renderer: LabelRenderer::new(fonts),
            validator: ComplianceValidator::new(),
            config,
        }
    }

    /// Resolve fonts from the config, falling back tier by tier.
    pub fn from_config(generator: G, config: LabelConfig) -> Self {
        let fonts = FontSet::load(&config);
        Self::new(generator, fonts, config)
    }

    pub fn regulations(&self) -> &RegulationRegistry {
        self.regulations
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    pub fn generate_label(&self, request: &RenderRequest) -> Result<RenderedLabel, LabelError> {
        let profile = self.regulations.resolve(&request.market)?;
        let product = &request.product;
        info!(
            market = %profile.market,
            product = %product.product_name,
            crisis = request.crisis.is_some(),
            "Rendering label"
        );

        let generated = self.generator.generate(product, profile)?;
        let assembled = LabelAssembler::new(self.regulations, self.crisis).assemble(
            &request.market,
            product,
            generated,
            request.crisis.as_ref(),
        )?;
        let content = assembled.content;

        let canvas = self.renderer.render(&content, profile)?;
        let raster = self.renderer.rasterize(&canvas)?;
        let png_bytes = print::export_png(&raster, BASE_DPI)?;

        let compliance = self.validator.validate(&content, profile);
        if !compliance.compliant {
            warn!(
                market = %profile.market,
                violations = compliance.violations.len(),
                "Label rendered with compliance errors"
            );
        }

        let created_at = Utc::now();
        let label = RenderedLabel {
            id: Uuid::new_v4().to_string(),
            market: profile.market,
            filename: filename_hint(profile.market, &product.product_name, content.crisis.is_some(), created_at),
            created_at,
            engine_version: ENGINE_VERSION.to_string(),
            content_hash: content_hash(&content)?,
            width: canvas.size.width,
            height: canvas.size.height,
            sections: canvas.sections,
            compliance,
            crisis_communication: assembled.crisis_communication,
            content,
            png_bytes,
            raster,
        };

        info!(
            market = %label.market,
            width = label.width,
            height = label.height,
            bytes = label.png_bytes.len(),
            "Rendered label"
        );
        Ok(label)
    }

    /// One outcome per requested market; a failure never aborts the batch.
    pub fn render_batch(
        &self,
        product: &ProductInput,
        markets: &[String],
        crisis: Option<&CrisisInput>,
    ) -> Vec<MarketOutcome> {
        markets
            .iter()
            .map(|market| {
                let request = RenderRequest {
                    market: market.clone(),
                    product: product.clone(),
                    crisis: crisis.cloned(),
                };
                let result = self.generate_label(&request);
                if let Err(e) = &result {
                    warn!(market = %market, kind = e.kind(), error = %e, "Market render failed");
                }
                MarketOutcome {
                    market: market.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Print spec from the config, validated like any user-supplied DPI.
    pub fn print_spec(&self) -> Result<PrintSpec, LabelError> {
        Ok(PrintSpec::from_config(self.config.print_dpi)?)
    }

    pub fn print_export(&self, label: &RenderedLabel, spec: &PrintSpec) -> Result<Vec<u8>, LabelError> {
        Ok(print::export_print(&label.raster, spec)?)
    }

    pub fn preview_data_url(&self, label: &RenderedLabel) -> Result<String, LabelError> {
        Ok(print::preview_data_url(&label.raster, self.config.preview_size)?)
    }

    pub fn thumbnail_data_url(&self, label: &RenderedLabel) -> Result<String, LabelError> {
        Ok(print::preview_data_url(&label.raster, self.config.thumbnail_size)?)
    }
}

impl LabelPipeline<MockContentGenerator> {
    /// Mock content with the embedded fonts; fully deterministic layout.
    pub fn mock() -> Self {
        Self::new(MockContentGenerator, Arc::new(FontSet::builtin()), LabelConfig::default())
    }
}
