//! SmartLabel Core - market-aware nutrition label renderer
//!
//! # Ground Rules
//! 1. The market profile decides what a label must say
//! 2. Canvas size is committed before the first pixel is drawn
//! 3. Sections are drawn in a fixed order, top to bottom, never overlapping
//! 4. A crisis banner, when present, is the first thing on the label
//! 5. Generated content is authoritative; caller data only fills gaps
//! 6. One market failing never aborts the others

pub mod regulations;
pub mod crisis;
pub mod content;
pub mod generation;
pub mod compliance;
pub mod layout;
pub mod fonts;
pub mod render;
pub mod print;
pub mod hashing;
pub mod config;
pub mod pipeline;

pub use regulations::{Market, MarketProfile, RegistryError, RegulationRegistry};
pub use crisis::{CrisisRegistry, CrisisType};
pub use content::{CrisisInput, LabelAssembler, LabelContent, ProductInput, RenderRequest};
pub use generation::{ContentGenerator, GeneratedContent, GenerationError, MockContentGenerator, ModelBackedGenerator};
pub use compliance::{ComplianceReport, ComplianceValidator, ViolationSeverity};
pub use layout::LabelSize;
pub use fonts::{FontSet, FontSource};
pub use render::{LabelRenderer, RenderError, Section};
pub use print::{PrintAuthority, PrintSpec};
pub use hashing::{canonical_json, content_hash};
pub use config::LabelConfig;
pub use pipeline::{LabelError, LabelPipeline, MarketOutcome, RenderedLabel};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
