//! Classification of recent camera motion.
//!
//! The result is reported in metrics and, with adaptive stabilization
//! on, selects the [`MotionProfile`](crate::config::MotionProfile) the
//! pipeline moves toward.

use serde::{Deserialize, Serialize};
use steadyframe_core::Transform;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionType {
    #[default]
    Static,
    SlowMotion,
    FastMotion,
    CameraShake,
    PanZoom,
}

impl MotionType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Static => "Static",
            Self::SlowMotion => "Slow Motion",
            Self::FastMotion => "Fast Motion",
            Self::CameraShake => "Camera Shake",
            Self::PanZoom => "Pan/Zoom",
        }
    }
}

/// Statistics over a window of motion transforms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionMetrics {
    pub mean_magnitude: f64,
    pub variance_magnitude: f64,
    /// Spread of the translation vectors around their mean.
    pub directional_variance: f64,
    /// Mean cosine between consecutive translation directions.
    pub consistency_score: f64,
    /// Share of second-difference energy in the magnitude signal.
    pub high_frequency_ratio: f64,
    pub transform_count: usize,
}

#[derive(Debug, Clone)]
pub struct MotionClassifier {
    window: usize,
    sensitivity: f64,
}

impl MotionClassifier {
    pub fn new(window: usize, sensitivity: f64) -> Self {
        Self {
            window: window.max(1),
            sensitivity,
        }
    }

    /// Classify the most recent `window` transforms (oldest first).
    pub fn classify<'a, I>(&self, transforms: I) -> (MotionType, MotionMetrics)
    where
        I: IntoIterator<Item = &'a Transform>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut recent: Vec<&Transform> = transforms.into_iter().rev().take(self.window).collect();
        recent.reverse();
        if recent.is_empty() {
            return (MotionType::Static, MotionMetrics::default());
        }
        let metrics = metrics(&recent);
        (self.classify_metrics(&metrics), metrics)
    }

    pub fn classify_metrics(&self, m: &MotionMetrics) -> MotionType {
        let s = self.effective_sensitivity();
        let static_threshold = (6.0 * s).clamp(0.0, 100.0);
        let slow_threshold = (15.0 * s).clamp(0.0, 100.0);
        let fast_threshold = (40.0 * s).clamp(0.0, 100.0);
        let variance_threshold = (3.0 * s).clamp(0.0, 100.0);
        let high_freq_threshold = (0.70 * s).clamp(0.0, 1.0);
        let consistency_threshold = (0.96 / s).clamp(0.0, 1.0);

        if m.mean_magnitude < static_threshold && m.variance_magnitude < variance_threshold {
            return MotionType::Static;
        }
        if m.high_frequency_ratio > high_freq_threshold {
            return MotionType::CameraShake;
        }
        if m.mean_magnitude >= slow_threshold && m.mean_magnitude < fast_threshold {
            return MotionType::FastMotion;
        }
        if m.mean_magnitude >= static_threshold
            && m.mean_magnitude < slow_threshold
            && m.consistency_score > consistency_threshold
            && m.directional_variance < 2.0
        {
            return MotionType::PanZoom;
        }
        MotionType::SlowMotion
    }

    fn effective_sensitivity(&self) -> f64 {
        let s = self.sensitivity;
        if s.is_nan() || s <= 0.0 {
            warn!(sensitivity = s, "invalid motion sensitivity, using 1.0");
            1.0
        } else if s > 100.0 {
            warn!(sensitivity = s, "motion sensitivity clamped to 100");
            100.0
        } else {
            s
        }
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new(30, 1.0)
    }
}

/// Scalar size of a motion: translation length plus weighted scale and
/// rotation deviation.
fn magnitude(t: &Transform) -> f64 {
    let [[a, b, tx], [_, d, ty]] = t.to_rows();
    let rotation = b.atan2(a).abs();
    let scale_dev = (a - 1.0).abs() + (d - 1.0).abs();
    (tx * tx + ty * ty).sqrt() + scale_dev * 100.0 + rotation * 200.0
}

fn metrics(transforms: &[&Transform]) -> MotionMetrics {
    let n = transforms.len() as f64;
    let mags: Vec<f64> = transforms.iter().map(|t| magnitude(t)).collect();
    let mean_magnitude = mags.iter().sum::<f64>() / n;
    let variance_magnitude = if mags.len() < 2 {
        0.0
    } else {
        mags.iter().map(|m| (m - mean_magnitude).powi(2)).sum::<f64>() / n
    };

    let ts: Vec<_> = transforms.iter().map(|t| t.translation()).collect();
    let mean_t = ts.iter().copied().sum::<glam::DVec2>() / n;
    let spread = ts.iter().map(|t| (*t - mean_t).length_squared()).sum::<f64>() / n;

    let consistency_score = if ts.len() < 2 {
        1.0
    } else {
        let (sum, count) = ts
            .windows(2)
            .filter(|w| w[0].length() > 0.001 && w[1].length() > 0.001)
            .fold((0.0, 0.0), |(sum, count), w| {
                (sum + w[0].dot(w[1]) / (w[0].length() * w[1].length()), count + 1.0)
            });
        if count > 0.0 {
            sum / count
        } else {
            0.0
        }
    };

    let high_frequency_ratio = if mags.len() < 6 {
        0.0
    } else {
        let (high, low) = mags.windows(3).fold((0.0, 0.0), |(high, low), w| {
            let second_diff = ((w[2] - w[1]) - (w[1] - w[0])).abs();
            (high + second_diff, low + (w[2] - w[0]).abs() * 0.5)
        });
        let total = high + low;
        if total > 0.001 {
            high / total
        } else {
            0.0
        }
    };

    MotionMetrics {
        mean_magnitude,
        variance_magnitude,
        directional_variance: spread.sqrt(),
        consistency_score,
        high_frequency_ratio,
        transform_count: transforms.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(ts: &[Transform]) -> MotionType {
        MotionClassifier::default().classify(ts).0
    }

    #[test]
    fn test_empty_is_static() {
        let (kind, metrics) = MotionClassifier::default().classify(&[] as &[Transform]);
        assert_eq!(kind, MotionType::Static);
        assert_eq!(metrics.transform_count, 0);
    }

    #[test]
    fn test_still_camera_is_static() {
        let ts = vec![Transform::translate(0.2, -0.1); 20];
        assert_eq!(classify(&ts), MotionType::Static);
    }

    #[test]
    fn test_steady_pan() {
        let ts = vec![Transform::translate(8.0, 0.5); 20];
        assert_eq!(classify(&ts), MotionType::PanZoom);
    }

    #[test]
    fn test_fast_motion() {
        let ts: Vec<_> = (0..20).map(|i| Transform::translate(20.0 + i as f64 * 0.1, 0.0)).collect();
        assert_eq!(classify(&ts), MotionType::FastMotion);
    }

    #[test]
    fn test_alternating_jitter_is_shake() {
        let ts: Vec<_> = (0..20)
            .map(|i| Transform::translate(if i % 2 == 0 { 12.0 } else { 1.0 }, 0.0))
            .collect();
        assert_eq!(classify(&ts), MotionType::CameraShake);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let mut ts = vec![Transform::translate(20.0, 0.0); 50];
        ts.extend(vec![Transform::IDENTITY; 10]);
        let (kind, metrics) = MotionClassifier::new(10, 1.0).classify(&ts);
        assert_eq!(kind, MotionType::Static);
        assert_eq!(metrics.transform_count, 10);
    }

    #[test]
    fn test_bad_sensitivity_falls_back() {
        let ts = vec![Transform::translate(0.2, 0.0); 10];
        assert_eq!(MotionClassifier::new(10, f64::NAN).classify(&ts).0, MotionType::Static);
        assert_eq!(MotionClassifier::new(10, -3.0).classify(&ts).0, MotionType::Static);
    }
}
