//! Print Authority System
//!
//! Labels are drawn at the 72 DPI base resolution. Print exports scale the
//! raster by `dpi / 72` with a Lanczos3 filter and record the DPI in the PNG
//! `pHYs` chunk. Previews and thumbnails are exact-size Lanczos3 resamples of
//! the base raster, returned as `data:image/png;base64,` URLs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tiny_skia::Pixmap;

pub const BASE_DPI: u32 = 72;
pub const MIN_DPI: u32 = 72;
pub const MAX_DPI: u32 = 1200;
const METERS_PER_INCH: f64 = 0.0254;
/// Largest raster a resample may allocate (a 1200 DPI label is ~72M pixels).
const MAX_PIXELS: u64 = 1 << 28;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("DPI must be between 72 and 1200, got {0}")]
    InvalidDpi(u32),

    #[error("Target size {0}x{1} is empty or too large")]
    InvalidSize(u32, u32),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
}

/// PrintAuthority records where a print specification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    #[default]
    System,
    /// Engine configuration file
    Config,
    /// Per-request override (validated)
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSpec {
    pub authority: PrintAuthority,
    pub dpi: u32,
}

impl Default for PrintSpec {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            dpi: 300,
        }
    }
}

impl PrintSpec {
    pub fn from_config(dpi: u32) -> Result<Self, ExportError> {
        Self::validated(PrintAuthority::Config, dpi)
    }

    pub fn from_user(dpi: u32) -> Result<Self, ExportError> {
        Self::validated(PrintAuthority::User, dpi)
    }

    fn validated(authority: PrintAuthority, dpi: u32) -> Result<Self, ExportError> {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(ExportError::InvalidDpi(dpi));
        }
        Ok(Self { authority, dpi })
    }

    pub fn scale_factor(&self) -> f32 {
        self.dpi as f32 / BASE_DPI as f32
    }

    /// Pixel size of a `width` x `height` base raster at this DPI.
    pub fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale_factor();
        (
            (width as f32 * scale).round() as u32,
            (height as f32 * scale).round() as u32,
        )
    }
}

/// Straight-alpha copy of a premultiplied raster.
pub fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (out, px) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = px.demultiply();
        out.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}

/// Encode RGBA8 PNG with the DPI recorded as pixels per meter.
pub fn encode_png(image: &RgbaImage, dpi: u32) -> Result<Vec<u8>, ExportError> {
    let ppm = (dpi as f64 / METERS_PER_INCH).round() as u32;
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
    }
    Ok(out)
}

pub fn export_png(pixmap: &Pixmap, dpi: u32) -> Result<Vec<u8>, ExportError> {
    encode_png(&to_rgba_image(pixmap), dpi)
}

/// Lanczos3 resize of `source` to exactly `width` x `height`.
pub fn resize(source: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, ExportError> {
    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(ExportError::InvalidSize(width, height));
    }
    Ok(imageops::resize(source, width, height, FilterType::Lanczos3))
}

/// Scale a base-resolution raster by `target_dpi / 72`.
pub fn resample(base: &Pixmap, target_dpi: u32) -> Result<RgbaImage, ExportError> {
    let spec = PrintSpec::from_user(target_dpi)?;
    let (width, height) = spec.scaled_size(base.width(), base.height());
    resize(&to_rgba_image(base), width, height)
}

/// Scale a base-resolution raster for print and encode it with the print DPI.
pub fn export_print(base: &Pixmap, spec: &PrintSpec) -> Result<Vec<u8>, ExportError> {
    if spec.dpi == BASE_DPI {
        return export_png(base, spec.dpi);
    }
    encode_png(&resample(base, spec.dpi)?, spec.dpi)
}

pub fn data_url(png_bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes))
}

/// Exact-size preview (aspect ratio is not preserved).
pub fn preview_data_url(base: &Pixmap, size: [u32; 2]) -> Result<String, ExportError> {
    let [width, height] = size;
    let preview = resize(&to_rgba_image(base), width, height)?;
    Ok(data_url(&encode_png(&preview, BASE_DPI)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tiny_skia::Color;

    fn pixmap(width: u32, height: u32) -> Pixmap {
        let mut pm = Pixmap::new(width, height).unwrap();
        pm.fill(Color::WHITE);
        pm
    }

    fn decode_info(bytes: &[u8]) -> (u32, u32, Option<png::PixelDimensions>) {
        let decoder = png::Decoder::new(bytes);
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        (info.width, info.height, info.pixel_dims)
    }

    #[test]
    fn test_default_print_spec() {
        let spec = PrintSpec::default();
        assert_eq!(spec.authority, PrintAuthority::System);
        assert_eq!(spec.dpi, 300);
    }

    #[test]
    fn test_user_dpi_bounds() {
        assert!(PrintSpec::from_user(72).is_ok());
        assert!(PrintSpec::from_user(1200).is_ok());
        assert!(matches!(PrintSpec::from_user(71), Err(ExportError::InvalidDpi(71))));
        assert!(matches!(PrintSpec::from_user(1201), Err(ExportError::InvalidDpi(1201))));
    }

    #[test]
    fn test_scaled_size_uses_base_dpi() {
        let spec = PrintSpec::from_user(300).unwrap();
        assert_eq!(spec.scaled_size(400, 650), (1667, 2708));
        let same = PrintSpec::from_user(72).unwrap();
        assert_eq!(same.scaled_size(400, 650), (400, 650));
    }

    #[test]
    fn test_export_records_dpi() {
        let bytes = export_png(&pixmap(4, 3), 300).unwrap();
        let (w, h, dims) = decode_info(&bytes);
        assert_eq!((w, h), (4, 3));
        let dims = dims.unwrap();
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.yppu, 11811);
    }

    #[test]
    fn test_export_print_scales_pixels() {
        let spec = PrintSpec::from_user(144).unwrap();
        let bytes = export_print(&pixmap(40, 60), &spec).unwrap();
        let (w, h, _) = decode_info(&bytes);
        assert_eq!((w, h), (80, 120));
    }

    #[test]
    fn test_resize_rejects_empty_target() {
        let image = to_rgba_image(&pixmap(10, 10));
        assert!(matches!(resize(&image, 0, 10), Err(ExportError::InvalidSize(0, 10))));
        assert!(matches!(
            resize(&image, 100_000, 100_000),
            Err(ExportError::InvalidSize(100_000, 100_000))
        ));
    }

    #[test]
    fn test_downscale_keeps_thin_rules_visible() {
        let mut image = RgbaImage::from_pixel(400, 650, Rgba([255, 255, 255, 255]));
        for x in 0..400 {
            image.put_pixel(x, 325, Rgba([0, 0, 0, 255]));
        }
        let thumbnail = resize(&image, 150, 200).unwrap();
        let darkest = thumbnail.pixels().map(|p| p.0[0]).min().unwrap();
        assert!(darkest < 240, "hairline vanished (darkest red {darkest})");
    }

    #[test]
    fn test_to_rgba_image_demultiplies() {
        let mut pm = Pixmap::new(1, 1).unwrap();
        pm.fill(Color::from_rgba8(200, 100, 50, 128));
        let [r, g, b, a] = to_rgba_image(&pm).get_pixel(0, 0).0;
        assert_eq!(a, 128);
        assert!(r.abs_diff(200) <= 2 && g.abs_diff(100) <= 2 && b.abs_diff(50) <= 2);
    }

    #[test]
    fn test_resample_scales_by_dpi_ratio() {
        let scaled = resample(&pixmap(72, 36), 216).unwrap();
        assert_eq!((scaled.width(), scaled.height()), (216, 108));
        assert!(matches!(resample(&pixmap(72, 36), 2400), Err(ExportError::InvalidDpi(2400))));
    }

    #[test]
    fn test_preview_is_png_data_url() {
        let url = preview_data_url(&pixmap(400, 650), [150, 200]).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let encoded = url.trim_start_matches("data:image/png;base64,");
        let bytes = STANDARD.decode(encoded).unwrap();
        let (w, h, _) = decode_info(&bytes);
        assert_eq!((w, h), (150, 200));
    }
}
