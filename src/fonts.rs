//! Font resources - tiered acquisition and text measurement
//!
//! Tier one is the configured font file, tier two the system font database,
//! tier three the DejaVu Sans faces compiled into the binary. Every tier maps
//! the generic `sans-serif` family onto a face it actually holds, so text is
//! always painted.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use usvg::fontdb::{Database, Family, Query, Weight, ID};

use crate::config::LabelConfig;

static EMBEDDED_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static EMBEDDED_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Tried in order when the requested family is not installed.
const COMMON_SANS: [&str; 5] = ["DejaVu Sans", "Liberation Sans", "Noto Sans", "Helvetica", "Arial"];

/// Advance per character, in em, for glyphs the face lacks.
const APPROX_ADVANCE_EM: f32 = 0.6;
const APPROX_BOLD_ADVANCE_EM: f32 = 0.65;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("Failed to read font file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Font file {0} contains no usable faces")]
    NoFaces(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSource {
    Configured,
    System,
    Builtin,
}

/// Immutable font handles, shared across renders.
#[derive(Debug)]
pub struct FontSet {
    db: Arc<Database>,
    family: String,
    regular: Option<ID>,
    bold: Option<ID>,
    source: FontSource,
}

impl FontSet {
    /// Resolve fonts once at startup, logging which tier was chosen.
    pub fn load(config: &LabelConfig) -> Arc<Self> {
        if let Some(path) = &config.font_file {
            match Self::from_files(path, config.bold_font_file.as_deref()) {
                Ok(set) => {
                    info!(path = %path.display(), family = %set.family, "Loaded configured font");
                    return Arc::new(set);
                }
                Err(e) => warn!(error = %e, "Configured font unavailable, falling back to system fonts"),
            }
        }

        if let Some(system) = Self::system(&config.font_family) {
            info!(family = %system.family, faces = system.db.len(), "Using system fonts");
            return Arc::new(system);
        }

        warn!("No usable system fonts, using the embedded DejaVu Sans faces");
        Arc::new(Self::builtin())
    }

    pub fn from_files(regular: &Path, bold: Option<&Path>) -> Result<Self, FontError> {
        let mut db = Database::new();
        load_file(&mut db, regular)?;
        let family = db
            .faces()
            .next()
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
            .ok_or_else(|| FontError::NoFaces(regular.to_path_buf()))?;

        if let Some(bold) = bold {
            if let Err(e) = load_file(&mut db, bold) {
                warn!(error = %e, "Bold face unavailable, bold text uses the regular face");
            }
        }
        Ok(Self::bind(db, family, FontSource::Configured))
    }

    /// System fonts, preferring `family`. `None` when nothing is installed.
    pub fn system(family: &str) -> Option<Self> {
        let mut db = Database::new();
        db.load_system_fonts();
        let resolved = resolve_family(&db, family)?;
        if resolved != family {
            debug!(requested = family, resolved = %resolved, "Requested font family not installed");
        }
        Some(Self::bind(db, resolved, FontSource::System))
    }

    /// Guaranteed tier: DejaVu Sans regular and bold, compiled in.
    pub fn builtin() -> Self {
        let mut db = Database::new();
        db.load_font_data(EMBEDDED_REGULAR.to_vec());
        db.load_font_data(EMBEDDED_BOLD.to_vec());
        let family = resolve_family(&db, COMMON_SANS[0]).unwrap_or_else(|| COMMON_SANS[0].to_string());
        Self::bind(db, family, FontSource::Builtin)
    }

    /// Point the generic sans-serif family at `family` and pick its faces.
    fn bind(mut db: Database, family: String, source: FontSource) -> Self {
        db.set_sans_serif_family(family.clone());
        let regular = query(&db, &family, Weight::NORMAL);
        let bold = query(&db, &family, Weight::BOLD);
        Self {
            db: Arc::new(db),
            family,
            regular,
            bold,
            source,
        }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn source(&self) -> FontSource {
        self.source
    }

    pub fn has_faces(&self) -> bool {
        self.regular.is_some()
    }

    /// Advance width of `text` in pixels at `size`.
    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        let face = if bold { self.bold.or(self.regular) } else { self.regular };
        let measured = face.and_then(|id| {
            self.db
                .with_face_data(id, |data, index| advance_em(data, index, text, bold))
                .flatten()
        });
        let em = measured.unwrap_or_else(|| approx_em(text, bold));
        em * size
    }
}

fn load_file(db: &mut Database, path: &Path) -> Result<(), FontError> {
    let data = fs::read(path).map_err(|source| FontError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let before = db.len();
    db.load_font_data(data);
    if db.len() == before {
        return Err(FontError::NoFaces(path.to_path_buf()));
    }
    Ok(())
}

/// Family name of a face the database really holds: the requested family,
/// then common sans faces, then whatever face comes first.
fn resolve_family(db: &Database, requested: &str) -> Option<String> {
    let id = std::iter::once(requested)
        .chain(COMMON_SANS)
        .find_map(|name| {
            db.query(&Query {
                families: &[Family::Name(name)],
                ..Query::default()
            })
        })
        .or_else(|| db.faces().next().map(|face| face.id))?;
    db.face(id)?.families.first().map(|(name, _)| name.clone())
}

fn query(db: &Database, family: &str, weight: Weight) -> Option<ID> {
    let families = [Family::Name(family), Family::SansSerif];
    db.query(&Query {
        families: &families,
        weight,
        ..Query::default()
    })
}

fn approx_em(text: &str, bold: bool) -> f32 {
    let per_char = if bold { APPROX_BOLD_ADVANCE_EM } else { APPROX_ADVANCE_EM };
    text.chars().count() as f32 * per_char
}

fn advance_em(data: &[u8], index: u32, text: &str, bold: bool) -> Option<f32> {
    let face = ttf_parser::Face::parse(data, index).ok()?;
    let units_per_em = f32::from(face.units_per_em());
    if units_per_em <= 0.0 {
        return None;
    }
    let fallback = if bold { APPROX_BOLD_ADVANCE_EM } else { APPROX_ADVANCE_EM };
    let total = text
        .chars()
        .map(|c| {
            face.glyph_index(c)
                .and_then(|g| face.glyph_hor_advance(g))
                .map(|adv| f32::from(adv) / units_per_em)
                .unwrap_or(fallback)
        })
        .sum();
    Some(total)
}
