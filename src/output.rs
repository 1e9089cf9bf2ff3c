//! Mask output: FITS primary HDU or 16-bit grayscale PNG, chosen by file
//! extension.

use std::path::Path;

use fitrs::{Fits, Hdu, HeaderValue};
use image::{ImageBuffer, Luma};
use ndarray::Array2;
use tracing::info;

use crate::mask::{MaskParams, MaskStats, RingSide};
use crate::{MaskError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Fits,
    Png,
}

impl OutputFormat {
    /// Pick the format from the output path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("fits" | "fit" | "fts") => Ok(Self::Fits),
            Some("png") => Ok(Self::Png),
            other => Err(MaskError::Output(format!(
                "unsupported output extension {:?}, use .fits or .png",
                other.unwrap_or("")
            ))),
        }
    }
}

/// Label written to the MASKTYPE keyword.
pub fn mask_type_label(params: &MaskParams) -> &'static str {
    match (params.ring, params.soft_edges) {
        (Some(RingSide::Inner), _) => "ring-inner",
        (Some(RingSide::Outer), _) => "ring-outer",
        (None, true) => "soft",
        (None, false) => "binary",
    }
}

/// Write the mask to `path` in the format its extension names.
pub fn write_mask(
    path: &Path,
    mask: &Array2<f32>,
    params: &MaskParams,
    stats: &MaskStats,
) -> Result<()> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Fits => write_fits(path, mask, params, stats),
        OutputFormat::Png => write_png(path, mask),
    }?;
    info!(path = %path.display(), stars = stats.stars_painted, "mask written");
    Ok(())
}

/// FITS stores the bottom image row first, so rows are flipped on write.
fn write_fits(
    path: &Path,
    mask: &Array2<f32>,
    params: &MaskParams,
    stats: &MaskStats,
) -> Result<()> {
    let (height, width) = mask.dim();
    let mut data = Vec::with_capacity(width * height);
    for y in (0..height).rev() {
        data.extend(mask.row(y).iter().copied());
    }

    let mut hdu = Hdu::new(&[width, height], data);
    hdu.insert(
        "STARS",
        HeaderValue::IntegerNumber(stats.stars_painted.min(i32::MAX as u64) as i32),
    );
    hdu.insert(
        "MASKTYPE",
        HeaderValue::CharacterString(mask_type_label(params).to_string()),
    );
    hdu.insert("MAGMIN", real_keyword(params.min_mag as f64));
    hdu.insert("MAGMAX", real_keyword(params.max_mag as f64));

    Fits::create(path, hdu).map_err(|e| MaskError::Output(e.to_string()))?;
    Ok(())
}

/// Numeric header value. Exactly 0.0 is written as an integer: fitrs 0.5
/// normalizes real values into scientific notation by repeated scaling,
/// which never terminates for zero.
fn real_keyword(value: f64) -> HeaderValue {
    if value == 0.0 {
        HeaderValue::IntegerNumber(0)
    } else {
        HeaderValue::RealFloatingNumber(value)
    }
}

fn write_png(path: &Path, mask: &Array2<f32>) -> Result<()> {
    let (height, width) = mask.dim();
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            let v = mask[(y as usize, x as usize)].clamp(0.0, 1.0);
            Luma([(v * f32::from(u16::MAX)).round() as u16])
        });
    img.save(path)
        .map_err(|e| MaskError::Output(e.to_string()))?;
    Ok(())
}
