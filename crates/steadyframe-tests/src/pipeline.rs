//! Integration tests for the stabilization pipeline.
//!
//! Drives whole frame sequences through `StabilizationPipeline` in every
//! supported format and checks frame bytes as well as reported outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use steadyframe_core::{FrameBuffer, PixelFormat, SteadyError};
use steadyframe_tracking::{
    EdgeMode, FrameOutcome, MotionType, PassReason, PipelinePhase, Preset, ResetReason, StabilizationPipeline,
    StabilizerConfig,
};

use crate::support::{snapshot, textured_frame};

// ── Sequences ──────────────────────────────────────────────────

#[test]
fn every_format_stabilizes_a_shift() {
    for format in [PixelFormat::Nv12, PixelFormat::Yuv420P, PixelFormat::Rgba8, PixelFormat::Bgra8] {
        let pipeline = StabilizationPipeline::default();
        let mut first = textured_frame(320, 240, format, 0.0, 0.0);
        assert!(matches!(
            pipeline.process(&mut first.view_mut()),
            FrameOutcome::FirstFrame { reset: None, .. }
        ));

        let mut second = textured_frame(320, 240, format, 2.0, -1.0);
        match pipeline.process(&mut second.view_mut()) {
            FrameOutcome::Stabilized { correction, inliers, .. } => {
                assert!(inliers.is_some(), "{format:?}");
                let t = correction.translation();
                assert!((t.x - 2.0).abs() < 0.3 && (t.y + 1.0).abs() < 0.3, "{format:?}: {correction:?}");
            }
            other => panic!("{format:?}: unexpected {other:?}"),
        }
        assert_eq!(pipeline.metrics().frames_processed, 2);
    }
}

#[test]
fn geometry_change_restarts_tracking() {
    let pipeline = StabilizationPipeline::default();
    let mut small = textured_frame(640, 480, PixelFormat::Nv12, 0.0, 0.0);
    pipeline.process(&mut small.view_mut());

    let mut large = textured_frame(1280, 720, PixelFormat::Nv12, 0.0, 0.0);
    let before = snapshot(&large);
    let outcome = pipeline.process(&mut large.view_mut());
    assert!(
        matches!(
            outcome,
            FrameOutcome::FirstFrame {
                features,
                reset: Some(ResetReason::GeometryChanged)
            } if features > 0
        ),
        "{outcome:?}"
    );
    assert_eq!(snapshot(&large), before);
    assert_eq!(pipeline.metrics().resets, 1);
}

#[test]
fn static_sequence_stays_near_identity() {
    let pipeline = StabilizationPipeline::new(Preset::Gaming.config());
    for _ in 0..10 {
        let mut frame = textured_frame(320, 240, PixelFormat::Yuv420P, 0.0, 0.0);
        if let FrameOutcome::Stabilized { correction, .. } = pipeline.process(&mut frame.view_mut()) {
            assert!(correction.is_identity_within(1e-3), "{correction:?}");
        };
    }
    let metrics = pipeline.metrics();
    assert_eq!(metrics.phase, PipelinePhase::Tracking);
    assert!(metrics.transform_stability > 0.99);
    assert_eq!(metrics.consecutive_failures, 0);
}

#[test]
fn crop_mode_leaves_no_black_border() {
    let config = StabilizerConfig {
        smoothing_window: 5,
        max_correction: 10.0,
        edge_mode: EdgeMode::Crop,
        ..Default::default()
    };
    let pipeline = StabilizationPipeline::new(config);
    let mut first = textured_frame(320, 240, PixelFormat::Nv12, 0.0, 0.0);
    pipeline.process(&mut first.view_mut());

    let mut second = textured_frame(320, 240, PixelFormat::Nv12, 6.0, -4.0);
    let outcome = pipeline.process(&mut second.view_mut());
    assert!(matches!(outcome, FrameOutcome::Stabilized { .. }), "{outcome:?}");
    // The texture never reaches black, so any zero is padding.
    assert!(!second.planes[0].data.contains(&0));
}

#[test]
fn adaptive_pipeline_reports_motion_and_window() {
    let pipeline = StabilizationPipeline::new(StabilizerConfig {
        adaptive: true,
        ..Default::default()
    });
    for i in 0..16 {
        let dx = if i % 2 == 0 { 0.0 } else { 10.0 };
        let mut frame = textured_frame(320, 240, PixelFormat::Yuv420P, dx, 0.0);
        pipeline.process(&mut frame.view_mut());
    }
    let metrics = pipeline.metrics();
    assert_ne!(metrics.motion, MotionType::Static);
    assert_ne!(metrics.smoothing_window, 30);
    assert_eq!(pipeline.config().smoothing_window, 30);
}

// ── Pass-through ───────────────────────────────────────────────

#[test]
fn unknown_format_passes_through_untouched() {
    let pipeline = StabilizationPipeline::default();
    let mut frame = FrameBuffer::new(320, 240, PixelFormat::Unknown(42));
    for (i, v) in frame.planes[0].data.iter_mut().enumerate() {
        *v = (i % 253) as u8;
    }
    let before = snapshot(&frame);
    for _ in 0..3 {
        let outcome = pipeline.process(&mut frame.view_mut());
        assert!(matches!(
            outcome,
            FrameOutcome::PassThrough(PassReason::Rejected(SteadyError::UnsupportedFormat(_)))
        ));
    }
    assert_eq!(snapshot(&frame), before);
    assert_eq!(pipeline.phase(), PipelinePhase::Uninitialized);
}

#[test]
fn tiny_frames_are_rejected_without_state_change() {
    let pipeline = StabilizationPipeline::default();
    let mut frame = textured_frame(48, 320, PixelFormat::Gray8, 0.0, 0.0);
    let before = snapshot(&frame);
    assert!(pipeline.process(&mut frame.view_mut()).is_pass_through());
    assert_eq!(snapshot(&frame), before);
    assert_eq!(pipeline.metrics().frames_processed, 0);
}

// ── Concurrency ────────────────────────────────────────────────

#[test]
fn config_updates_race_frame_processing() {
    let pipeline = Arc::new(StabilizationPipeline::default());
    let done = Arc::new(AtomicBool::new(false));

    let updater = {
        let pipeline = Arc::clone(&pipeline);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut updates = 0u32;
            while !done.load(Ordering::Relaxed) {
                pipeline.update_config(StabilizerConfig {
                    smoothing_window: 5 + (updates % 20) as usize,
                    max_features: 100 + (updates % 5) as usize * 50,
                    ..Default::default()
                });
                updates += 1;
                thread::yield_now();
            }
            updates
        })
    };

    for i in 0..20 {
        let mut frame = textured_frame(160, 120, PixelFormat::Nv12, (i % 3) as f32, 0.0);
        let outcome = pipeline.process(&mut frame.view_mut());
        assert!(
            !matches!(outcome, FrameOutcome::PassThrough(PassReason::Failed(_))),
            "frame {i}: {outcome:?}"
        );
    }
    done.store(true, Ordering::Relaxed);
    let updates = updater.join().unwrap();

    if updates > 0 {
        assert!((5..=24).contains(&pipeline.config().smoothing_window));
    }
    assert_eq!(pipeline.metrics().frames_processed, 20);
}
