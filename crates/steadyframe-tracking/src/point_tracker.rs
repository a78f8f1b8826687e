//! Pyramidal Lucas-Kanade point tracker.

use rayon::prelude::*;
use steadyframe_core::{FeaturePoint, Rect};

use crate::pyramid::{GrayImage, ImagePyramid};

/// Output of one tracking pass. All three vectors have the length of the
/// input point set; index `i` describes input point `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackResult {
    /// Tracked position in the current frame. Unreliable where `status` is false.
    pub points: Vec<FeaturePoint>,
    pub status: Vec<bool>,
    /// Mean absolute intensity difference over the window (0..=255 scale).
    pub error: Vec<f32>,
}

impl TrackResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points reported as tracked.
    pub fn tracked_count(&self) -> usize {
        self.status.iter().filter(|&&s| s).count()
    }

    fn failed_copy(prev_points: &[FeaturePoint]) -> Self {
        Self {
            points: prev_points.to_vec(),
            status: vec![false; prev_points.len()],
            error: vec![f32::INFINITY; prev_points.len()],
        }
    }
}

/// How the iterative solve ended on one pyramid level.
enum LevelOutcome {
    Converged([f32; 2]),
    /// Iteration budget spent; carries the last displacement and step length.
    Exhausted([f32; 2], f32),
    Singular,
}

/// Lucas-Kanade optical flow point tracker with pyramidal support.
#[derive(Debug, Clone)]
pub struct FeatureTracker {
    /// Side of the square patch tracked around each point (odd).
    pub window_size: u32,
    pub pyramid_levels: u32,
    /// Gauss-Newton iterations per pyramid level.
    pub max_iterations: u32,
    /// Convergence threshold on the update step, in pixels.
    pub epsilon: f32,
    /// Patches whose structure tensor's smaller eigenvalue, per window
    /// pixel, falls below this are untrackable.
    pub min_eigen_threshold: f32,
    /// Points displaced further than this (pixels) are reported lost.
    pub max_displacement: f32,
}

impl FeatureTracker {
    pub fn new() -> Self {
        Self {
            window_size: 21,
            pyramid_levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen_threshold: 1e-3,
            max_displacement: 100.0,
        }
    }

    /// Track `prev_points` from `prev` into `curr`.
    pub fn track(
        &self,
        prev: &GrayImage,
        curr: &GrayImage,
        prev_points: &[FeaturePoint],
    ) -> TrackResult {
        if prev_points.is_empty() {
            return TrackResult::default();
        }
        if prev.dimensions() != curr.dimensions() {
            return TrackResult::failed_copy(prev_points);
        }
        let levels = self.pyramid_levels.clamp(1, 5);
        let prev_pyr = ImagePyramid::build(prev, levels);
        let curr_pyr = ImagePyramid::build(curr, levels);
        self.track_pyramids(&prev_pyr, &curr_pyr, prev_points)
    }

    /// Track with pre-built pyramids.
    pub fn track_pyramids(
        &self,
        prev_pyr: &ImagePyramid,
        curr_pyr: &ImagePyramid,
        prev_points: &[FeaturePoint],
    ) -> TrackResult {
        let levels = prev_pyr.num_levels().min(curr_pyr.num_levels());
        if prev_points.is_empty() || levels == 0 {
            return TrackResult::failed_copy(prev_points);
        }
        let bounds = Rect::from_size(prev_pyr.levels[0].width, prev_pyr.levels[0].height);

        let per_point: Vec<(FeaturePoint, bool, f32)> = prev_points
            .par_iter()
            .map(|&p| match self.track_point(prev_pyr, curr_pyr, levels, p) {
                Some((pos, err)) => (pos, bounds.contains(pos), err),
                None => (p, false, f32::INFINITY),
            })
            .collect();

        let mut result = TrackResult {
            points: Vec::with_capacity(per_point.len()),
            status: Vec::with_capacity(per_point.len()),
            error: Vec::with_capacity(per_point.len()),
        };
        for (p, s, e) in per_point {
            result.points.push(p);
            result.status.push(s);
            result.error.push(e);
        }
        result
    }

    /// Coarse-to-fine displacement of one point. Returns the new position and
    /// its residual, or `None` when the point could not be tracked.
    fn track_point(
        &self,
        prev_pyr: &ImagePyramid,
        curr_pyr: &ImagePyramid,
        levels: usize,
        position: FeaturePoint,
    ) -> Option<(FeaturePoint, f32)> {
        let hw = (self.window_size.max(3) / 2) as i32;
        let mut d = [0.0f32, 0.0];

        for level in (0..levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let px = position.x * scale;
            let py = position.y * scale;
            match self.solve_level(&prev_pyr.levels[level], &curr_pyr.levels[level], px, py, hw, d) {
                LevelOutcome::Converged(nd) => d = nd,
                LevelOutcome::Exhausted(nd, last_step) => {
                    // Out of budget and still moving by more than half a
                    // pixel on the finest level: treat as lost.
                    if level == 0 && last_step > 0.5 {
                        return None;
                    }
                    d = nd;
                }
                LevelOutcome::Singular => return None,
            }
            if level > 0 {
                d = [d[0] * 2.0, d[1] * 2.0];
            }
        }

        if !d[0].is_finite() || !d[1].is_finite() || (d[0] * d[0] + d[1] * d[1]).sqrt() > self.max_displacement {
            return None;
        }
        let new_pos = FeaturePoint::new(position.x + d[0], position.y + d[1]);
        let err = window_residual(&prev_pyr.levels[0], &curr_pyr.levels[0], position, d, hw);
        Some((new_pos, err))
    }

    fn solve_level(
        &self,
        prev_img: &GrayImage,
        curr_img: &GrayImage,
        px: f32,
        py: f32,
        hw: i32,
        mut d: [f32; 2],
    ) -> LevelOutcome {
        let side = (2 * hw + 1) as usize;
        let mut template = Vec::with_capacity(side * side);
        let mut grads = Vec::with_capacity(side * side);
        let mut g11 = 0.0f32;
        let mut g12 = 0.0f32;
        let mut g22 = 0.0f32;

        for wy in -hw..=hw {
            for wx in -hw..=hw {
                let x = px + wx as f32;
                let y = py + wy as f32;
                let ix = (prev_img.sample(x + 1.0, y) - prev_img.sample(x - 1.0, y)) * 0.5;
                let iy = (prev_img.sample(x, y + 1.0) - prev_img.sample(x, y - 1.0)) * 0.5;
                g11 += ix * ix;
                g12 += ix * iy;
                g22 += iy * iy;
                template.push(prev_img.sample(x, y));
                grads.push((ix, iy));
            }
        }

        let area = (side * side) as f32;
        let min_eig = 0.5 * ((g11 + g22) - ((g11 - g22) * (g11 - g22) + 4.0 * g12 * g12).sqrt());
        let det = g11 * g22 - g12 * g12;
        if min_eig / area < self.min_eigen_threshold || det.abs() < 1e-6 {
            return LevelOutcome::Singular;
        }
        let inv_det = 1.0 / det;

        let mut last_step = f32::INFINITY;
        for _ in 0..self.max_iterations {
            let mut bx = 0.0f32;
            let mut by = 0.0f32;
            let mut i = 0;
            for wy in -hw..=hw {
                for wx in -hw..=hw {
                    let it = curr_img.sample(px + d[0] + wx as f32, py + d[1] + wy as f32) - template[i];
                    let (ix, iy) = grads[i];
                    bx += ix * it;
                    by += iy * it;
                    i += 1;
                }
            }
            let ddx = inv_det * (g22 * bx - g12 * by);
            let ddy = inv_det * (-g12 * bx + g11 * by);
            d[0] -= ddx;
            d[1] -= ddy;
            last_step = (ddx * ddx + ddy * ddy).sqrt();
            if !last_step.is_finite() {
                return LevelOutcome::Singular;
            }
            if last_step < self.epsilon {
                return LevelOutcome::Converged(d);
            }
        }
        LevelOutcome::Exhausted(d, last_step)
    }
}

impl Default for FeatureTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean absolute difference between the template window in `prev` and the
/// displaced window in `curr`.
fn window_residual(prev: &GrayImage, curr: &GrayImage, p: FeaturePoint, d: [f32; 2], hw: i32) -> f32 {
    let mut sum = 0.0f32;
    let mut n = 0u32;
    for wy in -hw..=hw {
        for wx in -hw..=hw {
            let (x, y) = (p.x + wx as f32, p.y + wy as f32);
            sum += (curr.sample(x + d[0], y + d[1]) - prev.sample(x, y)).abs();
            n += 1;
        }
    }
    sum / n as f32
}
