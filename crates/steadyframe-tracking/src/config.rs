//! Stabilizer configuration, value ranges and presets.

use serde::{Deserialize, Serialize};

use crate::detector::CornerMeasure;
use crate::motion::MotionType;

/// How the border uncovered by a correction is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeMode {
    /// Constant fill: black for luma and packed color, neutral for chroma.
    #[default]
    Padding,
    /// Fixed zoom about the frame centre that hides a border of
    /// `max_correction` on every side.
    Crop,
    /// Per-frame zoom just large enough to hide the current translation.
    Scale,
}

impl EdgeMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Padding => "padding",
            Self::Crop => "crop",
            Self::Scale => "scale",
        }
    }

    /// Parse an edge-mode name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "padding" => Some(Self::Padding),
            "crop" => Some(Self::Crop),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }
}

/// Configuration for the stabilization pipeline.
///
/// Values from outside are never rejected; [`clamped`](Self::clamped)
/// pulls every field into its documented range and is applied whenever
/// the pipeline accepts a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Frames pass through untouched when false (default: true).
    pub enabled: bool,
    /// Number of motion transforms averaged, 5..=100 (default: 30).
    pub smoothing_window: usize,
    /// Feature budget per detection, 50..=1000 (default: 200).
    pub max_features: usize,
    /// Fraction of the strongest corner a feature must reach, 0.001..=0.99 (default: 0.01).
    pub feature_quality: f32,
    /// Minimum spacing between features in pixels, 1..=200 (default: 10).
    pub min_feature_distance: f32,
    /// Frames between forced re-detections, 1..=1000 (default: 25).
    pub detection_interval: u32,
    /// Largest tracking residual accepted for a point, 1..=100 (default: 30).
    pub error_threshold: f32,
    /// Largest correction as a percentage of frame size, 0..=100 (default: 30).
    pub max_correction: f32,
    /// Re-detect when fewer than this fraction of `max_features` survive
    /// tracking, 0.1..=0.9 (default: 0.5).
    pub refresh_ratio: f32,
    /// Optical-flow pyramid depth, 1..=5 (default: 3).
    pub pyramid_levels: u32,
    pub corner_measure: CornerMeasure,
    pub edge_mode: EdgeMode,
    /// Retune smoothing, correction and detection to the classified
    /// motion type (default: false).
    pub adaptive: bool,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothing_window: 30,
            max_features: 200,
            feature_quality: 0.01,
            min_feature_distance: 10.0,
            detection_interval: 25,
            error_threshold: 30.0,
            max_correction: 30.0,
            refresh_ratio: 0.5,
            pyramid_levels: 3,
            corner_measure: CornerMeasure::MinEigen,
            edge_mode: EdgeMode::Padding,
            adaptive: false,
        }
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

impl StabilizerConfig {
    /// Copy of this configuration with every field inside its range. NaN
    /// falls back to the field's default.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let corner_measure = match self.corner_measure {
            CornerMeasure::MinEigen => CornerMeasure::MinEigen,
            CornerMeasure::Harris { k } => CornerMeasure::Harris {
                k: clamp_f32(k, 0.01, 0.1, 0.04),
            },
        };
        Self {
            enabled: self.enabled,
            smoothing_window: self.smoothing_window.clamp(5, 100),
            max_features: self.max_features.clamp(50, 1000),
            feature_quality: clamp_f32(self.feature_quality, 0.001, 0.99, d.feature_quality),
            min_feature_distance: clamp_f32(self.min_feature_distance, 1.0, 200.0, d.min_feature_distance),
            detection_interval: self.detection_interval.clamp(1, 1000),
            error_threshold: clamp_f32(self.error_threshold, 1.0, 100.0, d.error_threshold),
            max_correction: clamp_f32(self.max_correction, 0.0, 100.0, d.max_correction),
            refresh_ratio: clamp_f32(self.refresh_ratio, 0.1, 0.9, d.refresh_ratio),
            pyramid_levels: self.pyramid_levels.clamp(1, 5),
            corner_measure,
            edge_mode: self.edge_mode,
            adaptive: self.adaptive,
        }
    }

    /// Good-point count below which features are re-detected.
    pub fn refresh_floor(&self) -> usize {
        (self.max_features as f32 * self.refresh_ratio).round() as usize
    }
}

/// Fraction of the remaining distance to a [`MotionProfile`] covered per
/// frame while adapting.
pub const ADAPTIVE_TRANSITION_RATE: f32 = 0.1;

/// Parameters adaptive stabilization steers toward for one motion type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    pub smoothing_window: f32,
    pub max_correction: f32,
    pub max_features: f32,
    pub feature_quality: f32,
    pub refresh_ratio: f32,
}

impl MotionProfile {
    pub fn for_motion(motion: MotionType) -> Self {
        let (smoothing_window, max_correction, max_features, feature_quality, refresh_ratio) = match motion {
            MotionType::Static => (8.0, 15.0, 120.0, 0.015, 0.9),
            MotionType::SlowMotion => (25.0, 25.0, 175.0, 0.010, 0.7),
            MotionType::FastMotion => (50.0, 35.0, 250.0, 0.010, 0.5),
            MotionType::CameraShake => (65.0, 45.0, 350.0, 0.005, 0.4),
            MotionType::PanZoom => (15.0, 20.0, 225.0, 0.010, 0.6),
        };
        Self {
            smoothing_window,
            max_correction,
            max_features,
            feature_quality,
            refresh_ratio,
        }
    }

    /// Taken from a configuration, the starting point of adaptation.
    pub fn from_config(config: &StabilizerConfig) -> Self {
        Self {
            smoothing_window: config.smoothing_window as f32,
            max_correction: config.max_correction,
            max_features: config.max_features as f32,
            feature_quality: config.feature_quality,
            refresh_ratio: config.refresh_ratio,
        }
    }

    /// Move `rate` of the way toward `target`.
    pub fn step_toward(&mut self, target: &Self, rate: f32) {
        let step = |from: &mut f32, to: f32| *from += (to - *from) * rate;
        step(&mut self.smoothing_window, target.smoothing_window);
        step(&mut self.max_correction, target.max_correction);
        step(&mut self.max_features, target.max_features);
        step(&mut self.feature_quality, target.feature_quality);
        step(&mut self.refresh_ratio, target.refresh_ratio);
    }

    /// `base` with this profile's values rounded in, clamped.
    pub fn apply_to(&self, base: &StabilizerConfig) -> StabilizerConfig {
        StabilizerConfig {
            smoothing_window: self.smoothing_window.round() as usize,
            max_correction: self.max_correction,
            max_features: self.max_features.round() as usize,
            feature_quality: self.feature_quality,
            refresh_ratio: self.refresh_ratio,
            ..base.clone()
        }
        .clamped()
    }
}

/// Tuned starting points for common use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Fast response for gameplay capture.
    Gaming,
    /// Balanced for live streaming.
    Streaming,
    /// Heavy smoothing for recorded footage.
    Recording,
}

impl Preset {
    pub fn config(self) -> StabilizerConfig {
        let base = StabilizerConfig::default();
        match self {
            Self::Gaming => StabilizerConfig {
                smoothing_window: 25,
                max_features: 150,
                feature_quality: 0.015,
                min_feature_distance: 25.0,
                max_correction: 40.0,
                refresh_ratio: 0.6,
                ..base
            },
            Self::Streaming => StabilizerConfig {
                smoothing_window: 30,
                max_correction: 30.0,
                refresh_ratio: 0.5,
                ..base
            },
            Self::Recording => StabilizerConfig {
                smoothing_window: 50,
                max_features: 400,
                feature_quality: 0.005,
                min_feature_distance: 20.0,
                max_correction: 20.0,
                refresh_ratio: 0.4,
                pyramid_levels: 4,
                ..base
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Gaming => "gaming",
            Self::Streaming => "streaming",
            Self::Recording => "recording",
        }
    }

    /// Parse a preset name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gaming" => Some(Self::Gaming),
            "streaming" => Some(Self::Streaming),
            "recording" => Some(Self::Recording),
            _ => None,
        }
    }
}
