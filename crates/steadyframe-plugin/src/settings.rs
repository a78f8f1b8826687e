//! Host settings and their mapping onto [`StabilizerConfig`].
//!
//! Keys use the host's names. Every key is optional: a missing key takes
//! the value of the selected preset, or the default when there is none.
//! Numeric values are accepted whatever their range and clamped later.

use serde::{Deserialize, Serialize};
use steadyframe_tracking::{EdgeMode, Preset, StabilizerConfig};
use tracing::warn;

use crate::error::PluginError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    #[serde(rename = "enable_stabilization", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "smoothing_radius", skip_serializing_if = "Option::is_none")]
    pub smoothing_window: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_features: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_quality: Option<f64>,
    #[serde(rename = "min_distance", skip_serializing_if = "Option::is_none")]
    pub min_feature_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_correction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_ratio: Option<f64>,
    /// `"padding"`, `"crop"` or `"scale"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_mode: Option<String>,
    #[serde(rename = "adaptive_stabilization", skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<bool>,
    /// `"gaming"`, `"streaming"` or `"recording"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// Saturating conversion for host integers.
fn to_count(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

impl FilterSettings {
    /// Parse host settings JSON. Blank input yields empty settings.
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, PluginError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Every key set from `config`.
    pub fn from_config(config: &StabilizerConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            smoothing_window: Some(config.smoothing_window as i64),
            max_features: Some(config.max_features as i64),
            feature_quality: Some(config.feature_quality as f64),
            min_feature_distance: Some(config.min_feature_distance as f64),
            detection_interval: Some(config.detection_interval as i64),
            error_threshold: Some(config.error_threshold as f64),
            max_correction: Some(config.max_correction as f64),
            refresh_ratio: Some(config.refresh_ratio as f64),
            edge_mode: Some(config.edge_mode.name().to_string()),
            adaptive: Some(config.adaptive),
            preset: None,
        }
    }

    /// The configuration these settings describe, clamped into range.
    /// Unknown preset or edge-mode names are logged and ignored.
    pub fn to_config(&self) -> StabilizerConfig {
        let mut config = match self.preset.as_deref() {
            Some(name) => Preset::from_name(name).map(Preset::config).unwrap_or_else(|| {
                warn!(preset = name, "unknown preset, using defaults");
                StabilizerConfig::default()
            }),
            None => StabilizerConfig::default(),
        };

        if let Some(v) = self.enabled {
            config.enabled = v;
        }
        if let Some(v) = self.smoothing_window {
            config.smoothing_window = to_count(v);
        }
        if let Some(v) = self.max_features {
            config.max_features = to_count(v);
        }
        if let Some(v) = self.feature_quality {
            config.feature_quality = v as f32;
        }
        if let Some(v) = self.min_feature_distance {
            config.min_feature_distance = v as f32;
        }
        if let Some(v) = self.detection_interval {
            config.detection_interval = v.clamp(0, u32::MAX as i64) as u32;
        }
        if let Some(v) = self.error_threshold {
            config.error_threshold = v as f32;
        }
        if let Some(v) = self.max_correction {
            config.max_correction = v as f32;
        }
        if let Some(v) = self.refresh_ratio {
            config.refresh_ratio = v as f32;
        }
        if let Some(v) = self.adaptive {
            config.adaptive = v;
        }
        if let Some(name) = self.edge_mode.as_deref() {
            match EdgeMode::from_name(name) {
                Some(mode) => config.edge_mode = mode,
                None => warn!(edge_mode = name, "unknown edge mode, keeping {:?}", config.edge_mode),
            }
        }
        config.clamped()
    }
}
