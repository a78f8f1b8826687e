//! Per-instance stabilization pipeline.
//!
//! Each processed frame goes through grayscale extraction, then detection
//! (first frame) or tracking + estimation, then smoothing and warping. All
//! mutable state lives behind one lock that is held for a whole frame or a
//! whole configuration update.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use steadyframe_core::{limits, FeaturePoint, FrameView, PixelFormat, Rect, Result, SteadyError, Transform};
use tracing::{debug, info, warn};

use crate::config::{MotionProfile, StabilizerConfig, ADAPTIVE_TRANSITION_RATE};
use crate::detector::FeatureDetector;
use crate::estimator::{Estimate, FallbackReason, TransformEstimator};
use crate::motion::{MotionClassifier, MotionType};
use crate::point_tracker::FeatureTracker;
use crate::pyramid::{GrayImage, ImagePyramid};
use crate::smoother::TransformSmoother;
use crate::warp::FrameWarper;

/// Consecutive failed frames after which the pipeline reports itself degraded.
const DEGRADED_AFTER_FAILURES: u32 = 5;

/// Motion history needed before adaptive stabilization retunes anything.
const ADAPT_MIN_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelinePhase {
    /// No frame processed yet.
    #[default]
    Uninitialized,
    /// The next frame (re)starts tracking from fresh detections.
    FirstFrame,
    Tracking,
    /// Tracking, but the recent frames kept failing.
    Degraded,
}

/// Why the tracking state was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetReason {
    Explicit,
    GeometryChanged,
    /// A previous frame failed or stabilization was switched off.
    Recovery,
}

/// Why a frame left the pipeline untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum PassReason {
    Disabled,
    /// Input the pipeline does not handle (unknown format, bad geometry,
    /// too small).
    Rejected(SteadyError),
    /// Processing failed mid-frame; tracking restarts on the next call.
    Failed(SteadyError),
}

/// Result of [`StabilizationPipeline::process`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame bytes are unchanged.
    PassThrough(PassReason),
    /// Features were (re)detected; the frame is unchanged.
    FirstFrame { features: usize, reset: Option<ResetReason> },
    Stabilized {
        correction: Transform,
        /// Correspondences that passed the tracking filter.
        good_points: usize,
        /// `None` when the motion fell back to identity.
        inliers: Option<usize>,
    },
}

impl FrameOutcome {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough(_))
    }
}

/// Snapshot of the pipeline's runtime statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StabilizerMetrics {
    pub frames_processed: u64,
    pub tracked_features: usize,
    pub processing_time_ms: f64,
    /// `max(0, 1 - |t| / 100)` for the last correction translation `t`.
    pub transform_stability: f64,
    pub consecutive_failures: u32,
    pub phase: PipelinePhase,
    pub motion: MotionType,
    /// Smoothing window in effect, which adaptive stabilization moves.
    pub smoothing_window: usize,
    pub resets: u64,
}

struct PipelineState {
    config: StabilizerConfig,
    /// `config` with the adaptive adjustments applied; what frames use.
    effective: StabilizerConfig,
    /// Current adaptive blend, `None` until adaptation starts.
    profile: Option<MotionProfile>,
    phase: PipelinePhase,
    geometry: Option<(u32, u32, PixelFormat)>,
    prev_pyramid: Option<ImagePyramid>,
    prev_points: Vec<FeaturePoint>,
    frames_since_detection: u32,
    reset_pending: bool,
    detector: FeatureDetector,
    tracker: FeatureTracker,
    estimator: TransformEstimator,
    smoother: TransformSmoother,
    warper: FrameWarper,
    classifier: MotionClassifier,
    metrics: StabilizerMetrics,
}

impl PipelineState {
    fn new(config: StabilizerConfig) -> Self {
        let mut state = Self {
            phase: PipelinePhase::Uninitialized,
            geometry: None,
            prev_pyramid: None,
            prev_points: Vec::new(),
            frames_since_detection: 0,
            reset_pending: false,
            detector: FeatureDetector::new(),
            tracker: FeatureTracker::new(),
            estimator: TransformEstimator::new(),
            smoother: TransformSmoother::new(config.smoothing_window),
            warper: FrameWarper::default(),
            classifier: MotionClassifier::new(config.smoothing_window, 1.0),
            metrics: StabilizerMetrics::default(),
            config: StabilizerConfig::default(),
            effective: StabilizerConfig::default(),
            profile: None,
        };
        state.apply_config(config);
        state
    }

    fn apply_config(&mut self, config: StabilizerConfig) {
        let config = config.clamped();
        if config.enabled && !self.config.enabled {
            self.reset_pending = true;
        }
        self.detector.measure = config.corner_measure;
        self.tracker.pyramid_levels = config.pyramid_levels;
        self.classifier = MotionClassifier::new(config.smoothing_window, 1.0);
        self.warper.edge_mode = config.edge_mode;
        self.profile = None;
        self.set_effective(config.clone());
        self.config = config;
    }

    fn set_effective(&mut self, effective: StabilizerConfig) {
        self.smoother.set_window(effective.smoothing_window);
        self.warper.max_correction = effective.max_correction as f64 / 100.0;
        self.metrics.smoothing_window = effective.smoothing_window;
        self.effective = effective;
    }

    /// Classify recent motion and, when adaptive, take one step toward the
    /// parameters suited to it.
    fn update_motion(&mut self) {
        let (motion, _) = self.classifier.classify(self.smoother.history().iter());
        self.metrics.motion = motion;
        if !self.config.adaptive || self.smoother.history().len() < ADAPT_MIN_HISTORY {
            return;
        }
        let mut profile = self
            .profile
            .unwrap_or_else(|| MotionProfile::from_config(&self.config));
        profile.step_toward(&MotionProfile::for_motion(motion), ADAPTIVE_TRANSITION_RATE);
        self.profile = Some(profile);

        let effective = profile.apply_to(&self.config);
        if effective.smoothing_window != self.effective.smoothing_window {
            debug!(
                motion = motion.label(),
                smoothing_window = effective.smoothing_window,
                max_correction = effective.max_correction,
                "adapted to motion"
            );
        }
        self.set_effective(effective);
    }

    fn reset_tracking(&mut self, reason: ResetReason) {
        info!(?reason, "resetting tracking state");
        if self.phase != PipelinePhase::Uninitialized {
            self.phase = PipelinePhase::FirstFrame;
        }
        self.prev_pyramid = None;
        self.prev_points.clear();
        self.frames_since_detection = 0;
        self.smoother.reset();
        self.reset_pending = false;
        self.metrics.resets += 1;
    }

    fn detect(&self, gray: &GrayImage) -> Vec<FeaturePoint> {
        self.detector.detect(
            gray,
            self.effective.max_features,
            self.effective.feature_quality,
            self.effective.min_feature_distance,
        )
    }

    /// Everything between input checks and the per-frame failure boundary.
    fn process_frame(&mut self, frame: &mut FrameView<'_>) -> Result<FrameOutcome> {
        let mut reset = None;
        if self.reset_pending {
            self.reset_tracking(ResetReason::Recovery);
            reset = Some(ResetReason::Recovery);
        }
        let geometry = (frame.width, frame.height, frame.format);
        if reset.is_none() && self.geometry.is_some_and(|g| g != geometry) {
            info!(
                width = frame.width,
                height = frame.height,
                format = frame.format.name(),
                "frame geometry changed"
            );
            self.reset_tracking(ResetReason::GeometryChanged);
            reset = Some(ResetReason::GeometryChanged);
        }
        self.geometry = Some(geometry);

        let gray = GrayImage::from_frame(frame)?;
        let pyramid = ImagePyramid::build(&gray, self.config.pyramid_levels);

        let prev_pyramid = match self.phase {
            PipelinePhase::Tracking if !self.prev_points.is_empty() => self.prev_pyramid.take(),
            _ => None,
        };
        let Some(prev_pyramid) = prev_pyramid else {
            return Ok(self.start_from(gray, pyramid, reset));
        };

        let tracked = self.tracker.track_pyramids(&prev_pyramid, &pyramid, &self.prev_points);
        let bounds = Rect::from_size(frame.width, frame.height);
        let threshold = self.effective.error_threshold;
        let (good_prev, good_curr): (Vec<FeaturePoint>, Vec<FeaturePoint>) = self
            .prev_points
            .iter()
            .zip(&tracked.points)
            .zip(tracked.status.iter().zip(&tracked.error))
            .filter(|((_, curr), (ok, err))| **ok && **err < threshold && bounds.contains(**curr))
            .map(|((prev, curr), _)| (*prev, *curr))
            .unzip();

        let estimate = if good_curr.len() >= TransformEstimator::MIN_CORRESPONDENCES {
            self.estimator.estimate_robust(&good_prev, &good_curr)
        } else {
            Estimate::Identity(FallbackReason::TooFewCorrespondences { found: good_curr.len() })
        };
        if let Estimate::Identity(reason) = estimate {
            debug!(?reason, good = good_curr.len(), "motion fell back to identity");
        }

        let smoothed = self.smoother.push(estimate.transform());
        let correction = smoothed
            .try_inverse()
            .ok_or_else(|| SteadyError::Numeric("smoothed motion is not invertible".into()))?;
        let limit = self.effective.max_correction as f64 / 100.0;
        let correction =
            correction.clamp_translation(limit * frame.width as f64, limit * frame.height as f64);

        let outcome = self.warper.apply(frame, &correction)?;
        debug!(?outcome, good = good_curr.len(), "frame warped");

        self.frames_since_detection += 1;
        let refresh = self.frames_since_detection >= self.effective.detection_interval
            || good_curr.len() < self.effective.refresh_floor();
        self.prev_points = if refresh {
            self.frames_since_detection = 0;
            let points = self.detect(&gray);
            debug!(features = points.len(), "features refreshed");
            points
        } else {
            good_curr
        };
        self.prev_pyramid = Some(pyramid);

        let t = correction.translation();
        self.update_motion();
        self.metrics.transform_stability = (1.0 - t.length() / 100.0).max(0.0);
        self.metrics.tracked_features = tracked.tracked_count();

        Ok(FrameOutcome::Stabilized {
            correction,
            good_points: good_prev.len(),
            inliers: match estimate {
                Estimate::Fitted { inliers, .. } => Some(inliers),
                Estimate::Identity(_) => None,
            },
        })
    }

    /// Detect on the current frame and make it the tracking reference.
    fn start_from(&mut self, gray: GrayImage, pyramid: ImagePyramid, reset: Option<ResetReason>) -> FrameOutcome {
        let points = self.detect(&gray);
        info!(
            features = points.len(),
            width = gray.width,
            height = gray.height,
            "tracking started"
        );
        let features = points.len();
        self.prev_points = points;
        self.prev_pyramid = Some(pyramid);
        self.frames_since_detection = 0;
        self.phase = PipelinePhase::Tracking;
        self.metrics.tracked_features = features;
        self.metrics.transform_stability = 1.0;
        FrameOutcome::FirstFrame { features, reset }
    }
}

/// Check what the pipeline can handle before touching any state.
fn check_input(frame: &FrameView<'_>) -> Result<()> {
    frame.validate()?;
    if frame.width < limits::MIN_FRAME_DIMENSION || frame.height < limits::MIN_FRAME_DIMENSION {
        return Err(SteadyError::FrameTooSmall {
            width: frame.width,
            height: frame.height,
        });
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Real-time video stabilizer for one stream.
///
/// Every method takes `&self`; the pipeline can be shared between a thread
/// delivering frames and one updating the configuration.
pub struct StabilizationPipeline {
    state: Mutex<PipelineState>,
}

impl StabilizationPipeline {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            state: Mutex::new(PipelineState::new(config)),
        }
    }

    /// Stabilize `frame` in place.
    ///
    /// Never fails: rejected input and mid-frame failures leave the frame
    /// byte-for-byte unchanged and are reported through the outcome.
    pub fn process(&self, frame: &mut FrameView<'_>) -> FrameOutcome {
        let start = Instant::now();
        let mut state = self.state.lock();

        if !state.config.enabled {
            state.reset_pending = true;
            return FrameOutcome::PassThrough(PassReason::Disabled);
        }
        if let Err(e) = check_input(frame) {
            debug!(error = %e, "frame passed through");
            return FrameOutcome::PassThrough(PassReason::Rejected(e));
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| state.process_frame(frame)));
        let outcome = match result {
            Ok(Ok(outcome)) => {
                state.metrics.consecutive_failures = 0;
                outcome
            }
            Ok(Err(e)) => state.fail(e),
            Err(payload) => state.fail(SteadyError::Internal(panic_message(payload.as_ref()))),
        };

        state.metrics.frames_processed += 1;
        state.metrics.processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        state.metrics.phase = state.reported_phase();
        outcome
    }

    /// Replace the configuration. Out-of-range values are clamped.
    pub fn update_config(&self, config: StabilizerConfig) {
        let mut state = self.state.lock();
        state.apply_config(config);
        info!(
            enabled = state.config.enabled,
            smoothing_window = state.config.smoothing_window,
            max_features = state.config.max_features,
            "configuration updated"
        );
    }

    /// Drop all tracking state; the next frame starts from fresh detections.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.reset_tracking(ResetReason::Explicit);
        state.metrics.phase = state.reported_phase();
    }

    pub fn config(&self) -> StabilizerConfig {
        self.state.lock().config.clone()
    }

    pub fn metrics(&self) -> StabilizerMetrics {
        self.state.lock().metrics.clone()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.state.lock().reported_phase()
    }
}

impl Default for StabilizationPipeline {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

impl PipelineState {
    fn fail(&mut self, error: SteadyError) -> FrameOutcome {
        self.metrics.consecutive_failures += 1;
        warn!(
            error = %error,
            failures = self.metrics.consecutive_failures,
            "frame processing failed, passing frame through"
        );
        self.reset_pending = true;
        FrameOutcome::PassThrough(PassReason::Failed(error))
    }

    fn reported_phase(&self) -> PipelinePhase {
        if self.metrics.consecutive_failures > DEGRADED_AFTER_FAILURES {
            PipelinePhase::Degraded
        } else {
            self.phase
        }
    }
}
