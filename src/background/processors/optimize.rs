//! Image optimizer - reshapes fetched images before recognition
//!
//! Includes:
//! - Header-only dimension probing
//! - Crop planning from width/height/aspect ratio
//! - Crop application with a fallback for degenerate crops
//! - JPEG re-encoding of cropped output

use crate::common::{
    CROP_HEIGHT, CROP_WIDTH, JPEG_QUALITY, OPTIMAL_HEIGHT, OPTIMAL_WIDTH, TALL_FACTOR, WIDE_FACTOR,
};
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader, codecs::jpeg::JpegEncoder};
use log::info;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// What to cut away before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPlan {
    Keep,
    /// Remove `trim` pixels from both the left and the right edge.
    Center { trim: u32 },
    /// Retain only the top `keep` rows.
    Top { keep: u32 },
    /// Side trim first, then top crop of the result.
    CenterThenTop { trim: u32, keep: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CropStep {
    Center(u32),
    Top(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropPlan {
    fn steps(&self) -> Vec<CropStep> {
        match *self {
            CropPlan::Keep => vec![],
            CropPlan::Center { trim } => vec![CropStep::Center(trim)],
            CropPlan::Top { keep } => vec![CropStep::Top(keep)],
            CropPlan::CenterThenTop { trim, keep } => {
                vec![CropStep::Center(trim), CropStep::Top(keep)]
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────
// Public API
// ────────────────────────────────────────────────────────────────

/// Crop `bytes` so the recognizer sees a bounded, margin-free image.
///
/// Images that need no crop come back as the very same buffer. Cropped
/// images are re-encoded as JPEG.
pub fn optimize_image(bytes: Vec<u8>) -> Result<Vec<u8>> {
    let dimensions = probe_dimensions(&bytes)?;
    let plan = plan_crop(dimensions);
    info!(
        "Image {}x{} (ratio {:.2}): {:?}",
        dimensions.width,
        dimensions.height,
        aspect_ratio(dimensions),
        plan
    );

    if plan == CropPlan::Keep || target_dimensions(dimensions, plan) == dimensions {
        return Ok(bytes);
    }

    let image = image::load_from_memory(&bytes).context("failed to decode image for cropping")?;
    let cropped = apply_plan(image, plan);
    encode_jpeg(&cropped)
}

/// Read width and height from the image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<ImageDimensions> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to guess image format")?
        .into_dimensions()
        .context("failed to read image dimensions")?;
    Ok(ImageDimensions { width, height })
}

/// Decide the crop for an image of the given size. First matching rule wins.
pub fn plan_crop(dimensions: ImageDimensions) -> CropPlan {
    let ImageDimensions { width, height } = dimensions;

    if (width <= OPTIMAL_WIDTH && height <= OPTIMAL_HEIGHT) || width == 0 || height == 0 {
        return CropPlan::Keep;
    }

    let ratio = aspect_ratio(dimensions);
    let is_wide_too_much = f64::from(width) > f64::from(OPTIMAL_WIDTH) * WIDE_FACTOR;
    let is_tall_too_much = f64::from(height) > f64::from(OPTIMAL_HEIGHT) * TALL_FACTOR;

    if ratio > 2.0 && is_wide_too_much {
        if is_tall_too_much {
            CropPlan::CenterThenTop {
                trim: CROP_WIDTH,
                keep: CROP_HEIGHT,
            }
        } else {
            CropPlan::Center { trim: CROP_WIDTH }
        }
    } else if ratio < 1.0 && is_tall_too_much {
        CropPlan::Top { keep: CROP_HEIGHT }
    } else if ratio > 1.0 && ratio < 2.0 && is_wide_too_much {
        let trim = width.saturating_sub(OPTIMAL_WIDTH) / 2;
        if trim > 0 {
            CropPlan::Center { trim }
        } else {
            CropPlan::Keep
        }
    } else {
        CropPlan::Keep
    }
}

/// Size of the image that `plan` produces, guards included.
pub fn target_dimensions(dimensions: ImageDimensions, plan: CropPlan) -> ImageDimensions {
    plan.steps()
        .into_iter()
        .fold(dimensions, |current, step| match step_rect(current, step) {
            Some(rect) => ImageDimensions {
                width: rect.width,
                height: rect.height,
            },
            None => current,
        })
}

// ────────────────────────────────────────────────────────────────
// Crop Application
// ────────────────────────────────────────────────────────────────

fn aspect_ratio(dimensions: ImageDimensions) -> f64 {
    if dimensions.height == 0 {
        return 0.0;
    }
    f64::from(dimensions.width) / f64::from(dimensions.height)
}

/// Region kept by `step`, or `None` when the step must be skipped:
/// either nothing would be removed or the result would have no area.
fn step_rect(dimensions: ImageDimensions, step: CropStep) -> Option<CropRect> {
    let ImageDimensions { width, height } = dimensions;
    if width == 0 || height == 0 {
        return None;
    }
    match step {
        CropStep::Center(trim) => {
            let new_width = width.checked_sub(trim.checked_mul(2)?)?;
            if trim == 0 || new_width == 0 {
                return None;
            }
            Some(CropRect {
                x: trim,
                y: 0,
                width: new_width,
                height,
            })
        }
        CropStep::Top(keep) => {
            if keep == 0 || height <= keep {
                return None;
            }
            Some(CropRect {
                x: 0,
                y: 0,
                width,
                height: keep,
            })
        }
    }
}

fn apply_plan(image: DynamicImage, plan: CropPlan) -> DynamicImage {
    plan.steps().into_iter().fold(image, |image, step| {
        let dimensions = ImageDimensions {
            width: image.width(),
            height: image.height(),
        };
        match step_rect(dimensions, step) {
            Some(rect) => image.crop_imm(rect.x, rect.y, rect.width, rect.height),
            None => image,
        }
    })
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_with_encoder(encoder)
        .context("failed to encode cropped image as JPEG")?;
    Ok(buffer)
}
