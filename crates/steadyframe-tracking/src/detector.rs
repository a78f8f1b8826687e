//! Corner detection for trackable feature points.
//!
//! Computes a per-pixel corner response from the gradient structure tensor
//! (Shi-Tomasi minimum eigenvalue, or Harris), keeps local maxima above a
//! fraction of the strongest response, then greedily accepts corners in
//! descending strength while enforcing a minimum spacing.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use steadyframe_core::{limits, FeaturePoint};

use crate::pyramid::GrayImage;

/// Corner strength measure computed from the structure tensor
/// `M = [[Sxx, Sxy], [Sxy, Syy]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CornerMeasure {
    /// Smaller eigenvalue of M (Shi-Tomasi).
    MinEigen,
    /// `det(M) - k * trace(M)^2`.
    Harris { k: f32 },
}

impl Default for CornerMeasure {
    fn default() -> Self {
        Self::MinEigen
    }
}

/// Finds corners worth tracking in a grayscale frame.
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    pub measure: CornerMeasure,
    /// Side of the square window the structure tensor is summed over (odd).
    pub block_size: u32,
}

impl FeatureDetector {
    /// Images smaller than this on either side yield no features.
    pub const MIN_IMAGE_SIZE: u32 = limits::MIN_FRAME_DIMENSION;

    pub fn new() -> Self {
        Self {
            measure: CornerMeasure::MinEigen,
            block_size: 3,
        }
    }

    pub fn with_measure(measure: CornerMeasure) -> Self {
        Self {
            measure,
            ..Self::new()
        }
    }

    /// Detect up to `max_count` corners, strongest first.
    ///
    /// `quality_level` is the fraction of the strongest response a corner
    /// must reach. No two returned points are closer than `min_distance`.
    pub fn detect(
        &self,
        image: &GrayImage,
        max_count: usize,
        quality_level: f32,
        min_distance: f32,
    ) -> Vec<FeaturePoint> {
        if image.width < Self::MIN_IMAGE_SIZE || image.height < Self::MIN_IMAGE_SIZE || max_count == 0 {
            return Vec::new();
        }
        let quality_level = if quality_level.is_finite() {
            quality_level.clamp(1e-4, 1.0)
        } else {
            0.01
        };

        let response = self.corner_response(image);
        let max_response = response.data.iter().copied().fold(0.0f32, f32::max);
        if max_response <= 0.0 {
            return Vec::new();
        }
        let threshold = max_response * quality_level;

        let mut candidates = local_maxima(&response, threshold, self.border());
        // Strongest first; ties broken by raster order for determinism.
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

        let points = candidates
            .into_iter()
            .map(|(x, y, _)| FeaturePoint::new(x as f32, y as f32));
        if min_distance >= 1.0 && min_distance.is_finite() {
            SpacingGrid::new(image.width, image.height, min_distance, max_count).select(points, max_count)
        } else {
            points.take(max_count).collect()
        }
    }

    /// Per-pixel corner response. Exposed for inspection.
    pub fn corner_response(&self, image: &GrayImage) -> GrayImage {
        let w = image.width as usize;
        let h = image.height as usize;
        let mut gxx = vec![0.0f32; w * h];
        let mut gyy = vec![0.0f32; w * h];
        let mut gxy = vec![0.0f32; w * h];

        // Sobel gradients, products stored per pixel.
        gxx.par_chunks_mut(w)
            .zip(gyy.par_chunks_mut(w))
            .zip(gxy.par_chunks_mut(w))
            .enumerate()
            .for_each(|(y, ((rxx, ryy), rxy))| {
                let y = y as i32;
                for x in 0..w {
                    let xi = x as i32;
                    let p = |dx: i32, dy: i32| image.get(xi + dx, y + dy);
                    let ix = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
                    let iy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
                    rxx[x] = ix * ix;
                    ryy[x] = iy * iy;
                    rxy[x] = ix * iy;
                }
            });

        let half = (self.block_size.max(1) / 2) as i32;
        let measure = self.measure;
        let at = |buf: &[f32], x: i32, y: i32| {
            let x = x.clamp(0, w as i32 - 1) as usize;
            let y = y.clamp(0, h as i32 - 1) as usize;
            buf[y * w + x]
        };

        let mut response = GrayImage::new(image.width, image.height);
        response
            .data
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as i32;
                for (x, out) in row.iter_mut().enumerate() {
                    let x = x as i32;
                    let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
                    for dy in -half..=half {
                        for dx in -half..=half {
                            a += at(&gxx, x + dx, y + dy);
                            b += at(&gxy, x + dx, y + dy);
                            c += at(&gyy, x + dx, y + dy);
                        }
                    }
                    *out = match measure {
                        CornerMeasure::MinEigen => {
                            0.5 * ((a + c) - ((a - c) * (a - c) + 4.0 * b * b).sqrt())
                        }
                        CornerMeasure::Harris { k } => {
                            let trace = a + c;
                            (a * c - b * b) - k * trace * trace
                        }
                    };
                }
            });
        response
    }

    /// Pixels this close to the border see clamped gradients and are skipped.
    fn border(&self) -> u32 {
        self.block_size.max(1) / 2 + 2
    }
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// 3x3 local maxima of `response` strictly above `threshold`, as `(x, y, score)`.
fn local_maxima(response: &GrayImage, threshold: f32, border: u32) -> Vec<(u32, u32, f32)> {
    let (w, h) = response.dimensions();
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }
    let mut out = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let r = response.get(x as i32, y as i32);
            if r <= threshold {
                continue;
            }
            let mut is_max = true;
            'neighbors: for dy in -1..=1 {
                for dx in -1..=1 {
                    if (dx != 0 || dy != 0) && response.get(x as i32 + dx, y as i32 + dy) > r {
                        is_max = false;
                        break 'neighbors;
                    }
                }
            }
            if is_max {
                out.push((x, y, r));
            }
        }
    }
    out
}

/// Smallest spacing-grid cell, in pixels.
const MIN_GRID_CELL: f32 = 16.0;

/// Bucket grid used to enforce the minimum distance between accepted
/// corners. Cells are at least `min_distance` wide, so only the 3x3
/// neighbourhood of a candidate's cell needs checking. The cell count is
/// bounded by the image area over `MIN_GRID_CELL`² and by the feature budget.
struct SpacingGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    min_dist_sq: f32,
    cells: Vec<Vec<FeaturePoint>>,
}

impl SpacingGrid {
    fn new(width: u32, height: u32, min_distance: f32, max_count: usize) -> Self {
        let per_feature = (width as f32 * height as f32 / max_count.max(1) as f32).sqrt();
        let cell = min_distance.max(MIN_GRID_CELL).max(per_feature);
        let cols = (width as f32 / cell).ceil().max(1.0) as usize;
        let rows = (height as f32 / cell).ceil().max(1.0) as usize;
        Self {
            cell,
            cols,
            rows,
            min_dist_sq: min_distance * min_distance,
            cells: vec![Vec::new(); cols * rows],
        }
    }

    fn select<I>(mut self, candidates: I, max_count: usize) -> Vec<FeaturePoint>
    where
        I: IntoIterator<Item = FeaturePoint>,
    {
        let mut accepted = Vec::new();
        for p in candidates {
            if accepted.len() >= max_count {
                break;
            }
            let cx = ((p.x / self.cell) as usize).min(self.cols - 1);
            let cy = ((p.y / self.cell) as usize).min(self.rows - 1);
            if self.has_neighbor(p, cx, cy) {
                continue;
            }
            self.cells[cy * self.cols + cx].push(p);
            accepted.push(p);
        }
        accepted
    }

    fn has_neighbor(&self, p: FeaturePoint, cx: usize, cy: usize) -> bool {
        let x_range = cx.saturating_sub(1)..=(cx + 1).min(self.cols - 1);
        for y in cy.saturating_sub(1)..=(cy + 1).min(self.rows - 1) {
            for x in x_range.clone() {
                if self.cells[y * self.cols + x]
                    .iter()
                    .any(|q| q.distance_squared(p) < self.min_dist_sq)
                {
                    return true;
                }
            }
        }
        false
    }
}
