//! The host-facing video filter interface and the stabilizer filter.

use steadyframe_core::FrameView;
use steadyframe_tracking::{FrameOutcome, StabilizationPipeline, StabilizerConfig, StabilizerMetrics};
use tracing::{debug, info};

use crate::error::PluginError;
use crate::properties::{stabilizer_properties, PropertyDescriptor};
use crate::settings::FilterSettings;

/// Lifecycle and per-frame entry points a host calls on a filter instance.
///
/// `update` and `process` may be called from different threads.
pub trait VideoFilter: Send + Sync {
    /// Create an instance from host settings.
    fn create(settings: &FilterSettings) -> Result<Self, PluginError>
    where
        Self: Sized;

    /// Settings a newly added filter starts with.
    fn defaults() -> FilterSettings
    where
        Self: Sized;

    /// Stable identifier shown to the host.
    fn name(&self) -> &str;

    /// Apply changed settings.
    fn update(&self, settings: &FilterSettings);

    /// Process one frame in place.
    fn process(&self, frame: &mut FrameView<'_>) -> FrameOutcome;

    fn properties(&self) -> Vec<PropertyDescriptor>;

    /// Tear the instance down. The host must not use it afterwards.
    fn destroy(self: Box<Self>) {}
}

/// Adapter exposing a [`StabilizationPipeline`] as a [`VideoFilter`].
pub struct StabilizerFilter {
    pipeline: StabilizationPipeline,
}

impl StabilizerFilter {
    pub const ID: &'static str = "steadyframe_stabilizer";

    pub fn pipeline(&self) -> &StabilizationPipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> StabilizerMetrics {
        self.pipeline.metrics()
    }
}

impl VideoFilter for StabilizerFilter {
    fn create(settings: &FilterSettings) -> Result<Self, PluginError> {
        let config = settings.to_config();
        info!(
            enabled = config.enabled,
            smoothing_window = config.smoothing_window,
            "stabilizer filter created"
        );
        Ok(Self {
            pipeline: StabilizationPipeline::new(config),
        })
    }

    fn defaults() -> FilterSettings {
        FilterSettings::from_config(&StabilizerConfig::default())
    }

    fn name(&self) -> &str {
        Self::ID
    }

    fn update(&self, settings: &FilterSettings) {
        self.pipeline.update_config(settings.to_config());
    }

    fn process(&self, frame: &mut FrameView<'_>) -> FrameOutcome {
        self.pipeline.process(frame)
    }

    fn properties(&self) -> Vec<PropertyDescriptor> {
        stabilizer_properties(&StabilizerConfig::default())
    }

    fn destroy(self: Box<Self>) {
        let metrics = self.pipeline.metrics();
        debug!(frames = metrics.frames_processed, "stabilizer filter destroyed");
    }
}
