//! Integration tests for the tracking building blocks.
//!
//! Exercises detection, tracking, estimation, smoothing and warping
//! together on synthetic frames.

use steadyframe_core::{FrameBuffer, PixelFormat, Transform};
use steadyframe_tracking::{
    EdgeMode, FeatureDetector, FeatureTracker, FrameWarper, TransformEstimator, TransformHistory,
    TransformSmoother, WarpOutcome,
};

use crate::support::{gray_image, snapshot};

// ── Detection & tracking ───────────────────────────────────────

#[test]
fn vga_shift_is_tracked() {
    let prev = gray_image(640, 480, 0.0, 0.0);
    let curr = gray_image(640, 480, 3.0, 2.0);

    let points = FeatureDetector::new().detect(&prev, 100, 0.01, 10.0);
    assert!(points.len() >= 50, "only {} features", points.len());
    assert!(points.len() <= 100);

    let result = FeatureTracker::new().track(&prev, &curr, &points);
    assert_eq!(result.len(), points.len());

    let good: Vec<_> = (0..result.len())
        .filter(|&i| result.status[i] && result.error[i] < 30.0)
        .collect();
    assert!(good.len() * 2 >= points.len(), "{} of {} tracked", good.len(), points.len());

    for &i in &good {
        let d = result.points[i] - points[i];
        assert!((d.x - 3.0).abs() < 0.5 && (d.y - 2.0).abs() < 0.5, "point {i} moved {d:?}");
    }
}

#[test]
fn tracked_shift_estimates_translation() {
    let prev = gray_image(640, 480, 0.0, 0.0);
    let curr = gray_image(640, 480, -4.0, 1.5);
    let points = FeatureDetector::new().detect(&prev, 150, 0.01, 12.0);
    let result = FeatureTracker::new().track(&prev, &curr, &points);

    let (p, c): (Vec<_>, Vec<_>) = points
        .iter()
        .zip(&result.points)
        .zip(&result.status)
        .filter(|(_, ok)| **ok)
        .map(|((p, c), _)| (*p, *c))
        .unzip();

    // Motion maps current points back onto previous ones.
    let motion = TransformEstimator::new().estimate(&p, &c);
    let t = motion.translation();
    assert!((t.x - 4.0).abs() < 0.3 && (t.y + 1.5).abs() < 0.3, "{motion:?}");
    assert!((motion.scale() - 1.0).abs() < 0.01);
}

#[test]
fn mismatched_frames_lose_every_point() {
    let prev = gray_image(640, 480, 0.0, 0.0);
    let curr = gray_image(320, 240, 0.0, 0.0);
    let points = FeatureDetector::new().detect(&prev, 20, 0.01, 10.0);
    let result = FeatureTracker::new().track(&prev, &curr, &points);
    assert_eq!(result.tracked_count(), 0);
    assert_eq!(result.points, points);
}

// ── Smoothing ──────────────────────────────────────────────────

fn jitter(i: usize) -> Transform {
    let s = ((i * 7919) % 13) as f64 - 6.0;
    Transform::translate(s, -0.5 * s)
}

fn variance(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[test]
fn smoothing_reduces_translation_variance() {
    let raw: Vec<f64> = (0..120).map(|i| jitter(i).translation().x).collect();
    let mut smoother = TransformSmoother::new(10);
    let smoothed: Vec<f64> = (0..120).map(|i| smoother.push(jitter(i)).translation().x).collect();
    assert!(variance(&smoothed[10..]) < variance(&raw[10..]) * 0.5);
}

#[test]
fn history_is_bounded_by_capacity() {
    let mut history = TransformHistory::new(5);
    for i in 0..200 {
        history.push(jitter(i));
    }
    assert_eq!(history.len(), 5);
    assert_eq!(history.iter().last(), Some(&jitter(199)));
}

// ── Warping ────────────────────────────────────────────────────

#[test]
fn identity_warp_leaves_bytes_identical() {
    for format in [PixelFormat::Nv12, PixelFormat::Yuv420P, PixelFormat::Rgba8] {
        let mut frame = crate::support::textured_frame(96, 64, format, 0.0, 0.0);
        let before = snapshot(&frame);
        let outcome = FrameWarper::default()
            .apply(&mut frame.view_mut(), &Transform::IDENTITY)
            .unwrap();
        assert_eq!(outcome, WarpOutcome::Identity);
        assert_eq!(snapshot(&frame), before, "{format:?}");
    }
}

/// Distinct chroma values per sample so shifts are observable.
fn chroma_pattern(x: u32, y: u32, channel: usize) -> u8 {
    ((x * 5 + y * 11 + channel as u32 * 67) % 251) as u8
}

fn chroma_frame(format: PixelFormat) -> FrameBuffer {
    let mut frame = FrameBuffer::new(640, 480, format);
    frame.fill_with(|plane, x, y, channel| {
        if plane == 0 {
            ((x + 3 * y) % 256) as u8
        } else {
            chroma_pattern(x, y, channel + plane)
        }
    });
    frame
}

#[test]
fn chroma_moves_half_as_far_as_luma() {
    let correction = Transform::translate(4.0, 2.0);
    for format in [PixelFormat::Yuv420P, PixelFormat::Nv12] {
        for layout in format.planes().iter().skip(1) {
            let t = FrameWarper::plane_transform(&correction, layout).translation();
            assert_eq!((t.x, t.y), (2.0, 1.0));
        }

        let source = chroma_frame(format);
        let mut frame = source.clone();
        FrameWarper::new(EdgeMode::Padding)
            .apply(&mut frame.view_mut(), &correction)
            .unwrap();

        // dst(x, y) = src(x + 4, y + 2) on luma
        let (src, dst) = (&source.planes[0], &frame.planes[0]);
        for (x, y) in [(10u32, 10u32), (300, 200), (600, 450)] {
            assert_eq!(dst.row(y)[x as usize], src.row(y + 2)[x as usize + 4]);
        }

        // dst(x, y) = src(x + 2, y + 1) on every chroma plane
        for (src, dst) in source.planes.iter().zip(&frame.planes).skip(1) {
            let bpp = src.bytes_per_pixel;
            for (x, y) in [(5u32, 5u32), (150, 100), (300, 230)] {
                for c in 0..bpp {
                    let got = dst.row(y)[x as usize * bpp + c];
                    let want = src.row(y + 1)[(x as usize + 2) * bpp + c];
                    assert_eq!(got, want, "{format:?} ({x}, {y}) channel {c}");
                }
            }
        }
    }
}

#[test]
fn uncovered_chroma_is_neutral() {
    let mut frame = chroma_frame(PixelFormat::Nv12);
    FrameWarper::new(EdgeMode::Padding)
        .apply(&mut frame.view_mut(), &Transform::translate(20.0, 0.0))
        .unwrap();
    let luma = &frame.planes[0];
    let chroma = &frame.planes[1];
    assert_eq!(luma.row(100)[639], 0);
    assert_eq!(&chroma.row(100)[2 * 319..2 * 320], &[128, 128]);
}
