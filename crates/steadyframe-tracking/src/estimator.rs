//! Robust similarity-transform estimation from point correspondences.
//!
//! RANSAC over two-point minimal samples, followed by a least-squares
//! refit on the winning inlier set. The model is rotation + uniform scale +
//! translation: `x' = a*x - b*y + tx`, `y' = b*x + a*y + ty`.

use steadyframe_core::{FeaturePoint, Transform};

/// Why an estimate fell back to the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Fewer correspondences than [`TransformEstimator::MIN_CORRESPONDENCES`].
    TooFewCorrespondences { found: usize },
    /// The two point sets differ in length.
    MismatchedLengths,
    /// No sample produced a usable fit (coincident or collinear points).
    Degenerate,
    /// The fit was non-finite or implausible as frame-to-frame motion.
    Unreasonable,
}

/// Outcome of [`TransformEstimator::estimate_robust`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Fitted { transform: Transform, inliers: usize },
    Identity(FallbackReason),
}

impl Estimate {
    /// The estimated transform; identity for a fallback.
    pub fn transform(&self) -> Transform {
        match self {
            Self::Fitted { transform, .. } => *transform,
            Self::Identity(_) => Transform::IDENTITY,
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted { .. })
    }
}

/// Fits the camera motion between two frames.
#[derive(Debug, Clone)]
pub struct TransformEstimator {
    pub ransac_iterations: u32,
    /// Reprojection distance (pixels) under which a pair counts as inlier.
    pub ransac_threshold: f64,
    pub seed: u64,
}

impl TransformEstimator {
    pub const MIN_CORRESPONDENCES: usize = 4;

    pub fn new() -> Self {
        Self {
            ransac_iterations: 500,
            ransac_threshold: 3.0,
            seed: 12345,
        }
    }

    /// Motion mapping `curr_points` onto `prev_points`. Identity when the
    /// fit is not possible.
    pub fn estimate(&self, prev_points: &[FeaturePoint], curr_points: &[FeaturePoint]) -> Transform {
        self.estimate_robust(prev_points, curr_points).transform()
    }

    /// Like [`estimate`](Self::estimate) but reports how the fit ended.
    pub fn estimate_robust(&self, prev_points: &[FeaturePoint], curr_points: &[FeaturePoint]) -> Estimate {
        if prev_points.len() != curr_points.len() {
            return Estimate::Identity(FallbackReason::MismatchedLengths);
        }
        let n = prev_points.len();
        if n < Self::MIN_CORRESPONDENCES {
            return Estimate::Identity(FallbackReason::TooFewCorrespondences { found: n });
        }

        let src: Vec<[f64; 2]> = curr_points.iter().map(|p| [p.x as f64, p.y as f64]).collect();
        let dst: Vec<[f64; 2]> = prev_points.iter().map(|p| [p.x as f64, p.y as f64]).collect();

        let Some(best) = self.ransac(&src, &dst) else {
            return Estimate::Identity(FallbackReason::Degenerate);
        };
        let mask = inlier_mask(&best, &src, &dst, self.ransac_threshold);
        let (in_src, in_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = src
            .iter()
            .zip(&dst)
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|((s, d), _)| (*s, *d))
            .unzip();

        let refined = fit_similarity(&in_src, &in_dst).unwrap_or(best);
        let transform = refined.to_transform();
        if !transform.is_reasonable() || transform.try_inverse().is_none() {
            return Estimate::Identity(FallbackReason::Unreasonable);
        }
        Estimate::Fitted {
            transform,
            inliers: in_src.len(),
        }
    }

    fn ransac(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Similarity> {
        let n = src.len();
        let mut best: Option<(Similarity, usize, f64)> = None;
        let mut seed = self.seed;
        let mut next_index = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as usize % n
        };

        for _ in 0..self.ransac_iterations.max(1) {
            let i = next_index();
            let mut j = next_index();
            if i == j {
                j = (j + 1) % n;
            }
            let Some(model) = fit_similarity(&[src[i], src[j]], &[dst[i], dst[j]]) else {
                continue;
            };

            let mut inliers = 0;
            let mut cost = 0.0;
            for (s, d) in src.iter().zip(dst) {
                let e = model.residual(*s, *d);
                if e < self.ransac_threshold {
                    inliers += 1;
                    cost += e;
                }
            }
            let better = match &best {
                None => true,
                Some((_, best_inliers, best_cost)) => {
                    inliers > *best_inliers || (inliers == *best_inliers && cost < *best_cost)
                }
            };
            if better {
                best = Some((model, inliers, cost));
                if inliers == n {
                    break;
                }
            }
        }
        best.filter(|(_, inliers, _)| *inliers >= 2).map(|(model, _, _)| model)
    }
}

impl Default for TransformEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: f64,
    b: f64,
    tx: f64,
    ty: f64,
}

impl Similarity {
    #[inline]
    fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [
            self.a * p[0] - self.b * p[1] + self.tx,
            self.b * p[0] + self.a * p[1] + self.ty,
        ]
    }

    #[inline]
    fn residual(&self, s: [f64; 2], d: [f64; 2]) -> f64 {
        let p = self.apply(s);
        ((p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2)).sqrt()
    }

    fn to_transform(self) -> Transform {
        Transform::from_rows([[self.a, -self.b, self.tx], [self.b, self.a, self.ty]])
    }
}

/// Closed-form least-squares similarity mapping `src` onto `dst`.
/// `None` when the source points are (nearly) coincident.
fn fit_similarity(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Similarity> {
    let n = src.len().min(dst.len());
    if n < 2 {
        return None;
    }
    let inv_n = 1.0 / n as f64;
    let (mut sx, mut sy, mut dx, mut dy) = (0.0, 0.0, 0.0, 0.0);
    for (s, d) in src.iter().zip(dst) {
        sx += s[0];
        sy += s[1];
        dx += d[0];
        dy += d[1];
    }
    let (sx, sy, dx, dy) = (sx * inv_n, sy * inv_n, dx * inv_n, dy * inv_n);

    let (mut var, mut num_a, mut num_b) = (0.0, 0.0, 0.0);
    for (s, d) in src.iter().zip(dst) {
        let (xs, ys) = (s[0] - sx, s[1] - sy);
        let (xd, yd) = (d[0] - dx, d[1] - dy);
        var += xs * xs + ys * ys;
        num_a += xs * xd + ys * yd;
        num_b += xs * yd - ys * xd;
    }
    if var < 1e-9 {
        return None;
    }
    let a = num_a / var;
    let b = num_b / var;
    let model = Similarity {
        a,
        b,
        tx: dx - (a * sx - b * sy),
        ty: dy - (b * sx + a * sy),
    };
    [model.a, model.b, model.tx, model.ty]
        .iter()
        .all(|v| v.is_finite())
        .then_some(model)
}

fn inlier_mask(model: &Similarity, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> Vec<bool> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| model.residual(*s, *d) < threshold)
        .collect()
}
