//! Descriptors for the settings the host shows in its property panel.

use serde::{Deserialize, Serialize};
use steadyframe_tracking::{Preset, StabilizerConfig};

/// Property value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Choice(String),
}

/// One editable property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Settings key, as used in [`FilterSettings`](crate::FilterSettings) JSON.
    pub name: String,
    pub display_name: String,
    pub default: PropertyValue,
    pub min: Option<PropertyValue>,
    pub max: Option<PropertyValue>,
    /// Allowed values for [`PropertyValue::Choice`].
    pub options: Vec<String>,
}

impl PropertyDescriptor {
    fn new(name: &str, display_name: &str, default: PropertyValue) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            default,
            min: None,
            max: None,
            options: Vec::new(),
        }
    }

    fn int(name: &str, display_name: &str, default: i64, min: i64, max: i64) -> Self {
        Self {
            min: Some(PropertyValue::Int(min)),
            max: Some(PropertyValue::Int(max)),
            ..Self::new(name, display_name, PropertyValue::Int(default))
        }
    }

    fn float(name: &str, display_name: &str, default: f32, min: f64, max: f64) -> Self {
        Self {
            min: Some(PropertyValue::Float(min)),
            max: Some(PropertyValue::Float(max)),
            ..Self::new(name, display_name, PropertyValue::Float(default as f64))
        }
    }

    fn choice(name: &str, display_name: &str, default: &str, options: &[&str]) -> Self {
        Self {
            options: options.iter().map(|s| s.to_string()).collect(),
            ..Self::new(name, display_name, PropertyValue::Choice(default.to_string()))
        }
    }
}

/// Properties of the stabilizer filter, defaults taken from `defaults`.
pub fn stabilizer_properties(defaults: &StabilizerConfig) -> Vec<PropertyDescriptor> {
    vec![
        PropertyDescriptor::new(
            "enable_stabilization",
            "Enable Stabilization",
            PropertyValue::Bool(defaults.enabled),
        ),
        PropertyDescriptor::choice(
            "preset",
            "Preset",
            Preset::Streaming.name(),
            &["gaming", "streaming", "recording"],
        ),
        PropertyDescriptor::int(
            "smoothing_radius",
            "Smoothing Window (frames)",
            defaults.smoothing_window as i64,
            5,
            100,
        ),
        PropertyDescriptor::int("max_features", "Max Features", defaults.max_features as i64, 50, 1000),
        PropertyDescriptor::float("feature_quality", "Feature Quality", defaults.feature_quality, 0.001, 0.99),
        PropertyDescriptor::float(
            "min_distance",
            "Min Feature Distance (px)",
            defaults.min_feature_distance,
            1.0,
            200.0,
        ),
        PropertyDescriptor::int(
            "detection_interval",
            "Detection Interval (frames)",
            defaults.detection_interval as i64,
            1,
            1000,
        ),
        PropertyDescriptor::float("error_threshold", "Tracking Error Threshold", defaults.error_threshold, 1.0, 100.0),
        PropertyDescriptor::float("max_correction", "Max Correction (%)", defaults.max_correction, 0.0, 100.0),
        PropertyDescriptor::float("refresh_ratio", "Feature Refresh Ratio", defaults.refresh_ratio, 0.1, 0.9),
        PropertyDescriptor::choice(
            "edge_mode",
            "Edge Handling",
            defaults.edge_mode.name(),
            &["padding", "crop", "scale"],
        ),
        PropertyDescriptor::new(
            "adaptive_stabilization",
            "Adaptive Stabilization",
            PropertyValue::Bool(defaults.adaptive),
        ),
    ]
}
