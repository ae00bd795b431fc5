//! Grayscale template matching with normalized cross-correlation.
//!
//! Each reference precomputes a sampled, mean-centered grayscale grid at
//! load time so the per-frame work is a single accumulation pass per
//! candidate offset. Confidence is the correlation coefficient clamped to
//! [0, 1]; a degenerate frame or reference scores 0.0 rather than erroring,
//! so the watcher stays live with partially broken reference data.

use super::Frame;

/// Cap on sampled grid points per reference axis; bounds the per-offset cost
/// for large banner references.
const MAX_GRID_POINTS_PER_AXIS: u32 = 16;

/// Variance floor below which a region is considered flat and unmatchable.
const FLAT_EPSILON: f32 = 1e-4;

/// One reference image, immutable once loaded.
///
/// Holds the sampled grayscale grid used for correlation: the luma values at
/// the grid points with their mean subtracted, plus the normalization
/// denominator. A reference with no contrast (norm ~ 0) never matches.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    name: String,
    width: u32,
    height: u32,
    coords: Vec<(u32, u32)>,
    centered: Vec<f32>,
    norm: f32,
}

impl ReferenceImage {
    /// Build a reference from decoded pixels. `name` is the identifier
    /// reported in match results and diagnostics (usually the file stem).
    pub fn from_image(name: impl Into<String>, image: &Frame) -> Self {
        let (width, height) = (image.width(), image.height());
        let step_x = (width / MAX_GRID_POINTS_PER_AXIS).max(1);
        let step_y = (height / MAX_GRID_POINTS_PER_AXIS).max(1);

        let mut coords = Vec::new();
        let mut values = Vec::new();
        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                coords.push((x, y));
                values.push(luma_at(image, x, y));
                x += step_x;
            }
            y += step_y;
        }

        let count = values.len() as f32;
        let mean = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f32>() / count
        };
        let centered: Vec<f32> = values.iter().map(|v| v - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();

        Self {
            name: name.into(),
            width,
            height,
            coords,
            centered,
            norm,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Outcome of matching one reference against one frame. Recomputed every
/// poll, never persisted. `location` is the match center on screen and is
/// only present when `confidence` met the caller's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub name: String,
    pub confidence: f32,
    pub location: Option<(u32, u32)>,
}

impl MatchResult {
    pub fn matched(&self) -> bool {
        self.location.is_some()
    }
}

/// Match every reference against the frame, one result per reference in
/// input order. Stateless: every call starts from scratch.
pub fn match_all(frame: &Frame, references: &[ReferenceImage], threshold: f32) -> Vec<MatchResult> {
    let frame_luma = frame_luma(frame);
    references
        .iter()
        .map(|reference| match_one(frame, &frame_luma, reference, threshold))
        .collect()
}

/// Match a single reference. Same contract as [`match_all`] for one entry.
pub fn match_single(frame: &Frame, reference: &ReferenceImage, threshold: f32) -> MatchResult {
    let frame_luma = frame_luma(frame);
    match_one(frame, &frame_luma, reference, threshold)
}

fn match_one(
    frame: &Frame,
    frame_luma: &[f32],
    reference: &ReferenceImage,
    threshold: f32,
) -> MatchResult {
    let (fw, fh) = (frame.width(), frame.height());
    let degenerate = reference.width == 0
        || reference.height == 0
        || fw < reference.width
        || fh < reference.height
        || reference.norm * reference.norm <= FLAT_EPSILON;
    if degenerate {
        return MatchResult {
            name: reference.name.clone(),
            confidence: 0.0,
            location: None,
        };
    }

    let samples = reference.coords.len() as f32;
    let mut best_score = 0.0f32;
    let mut best_offset = (0u32, 0u32);

    for oy in 0..=(fh - reference.height) {
        for ox in 0..=(fw - reference.width) {
            let mut sum = 0.0f32;
            let mut sum_sq = 0.0f32;
            let mut cross = 0.0f32;
            for (k, &(dx, dy)) in reference.coords.iter().enumerate() {
                let v = frame_luma[((oy + dy) * fw + ox + dx) as usize];
                sum += v;
                sum_sq += v * v;
                cross += reference.centered[k] * v;
            }
            let variance = sum_sq - sum * sum / samples;
            if variance <= FLAT_EPSILON {
                continue;
            }
            let score = cross / (reference.norm * variance.sqrt());
            if score > best_score {
                best_score = score;
                best_offset = (ox, oy);
            }
        }
    }

    let confidence = best_score.clamp(0.0, 1.0);
    let location = (confidence >= threshold).then(|| {
        (
            best_offset.0 + reference.width / 2,
            best_offset.1 + reference.height / 2,
        )
    });
    MatchResult {
        name: reference.name.clone(),
        confidence,
        location,
    }
}

fn frame_luma(frame: &Frame) -> Vec<f32> {
    frame.pixels().map(|p| luma(p.0)).collect()
}

fn luma_at(image: &Frame, x: u32, y: u32) -> f32 {
    luma(image.get_pixel(x, y).0)
}

fn luma(rgba: [u8; 4]) -> f32 {
    0.299 * f32::from(rgba[0]) + 0.587 * f32::from(rgba[1]) + 0.114 * f32::from(rgba[2])
}
