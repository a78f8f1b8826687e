//! SteadyFrame Tracking - Feature tracking, motion estimation and frame
//! stabilization.

pub mod config;
pub mod detector;
pub mod estimator;
pub mod motion;
pub mod pipeline;
pub mod point_tracker;
pub mod pyramid;
pub mod smoother;
pub mod warp;

pub use config::{EdgeMode, Preset, StabilizerConfig};
pub use detector::{CornerMeasure, FeatureDetector};
pub use estimator::{Estimate, FallbackReason, TransformEstimator};
pub use motion::{MotionClassifier, MotionMetrics, MotionType};
pub use pipeline::{
    FrameOutcome, PassReason, PipelinePhase, ResetReason, StabilizationPipeline, StabilizerMetrics,
};
pub use point_tracker::{FeatureTracker, TrackResult};
pub use pyramid::{GrayImage, ImagePyramid};
pub use smoother::{TransformHistory, TransformSmoother};
pub use warp::{FrameWarper, WarpOutcome};
