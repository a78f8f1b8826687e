//! Integration tests for the host-facing plugin layer.
//!
//! Frames enter through host descriptors and settings through JSON, the
//! same way a host application drives the filter.

use steadyframe_core::PixelFormat;
use steadyframe_plugin::host::format_code;
use steadyframe_plugin::{frame_view, FilterRegistry, FilterSettings, HostPlane, StabilizerFilter, VideoFilter};
use steadyframe_tracking::{EdgeMode, FrameOutcome, PassReason, Preset};

use crate::support::textured_frame;

/// Owned NV12 planes packed the way a host would hand them over.
struct HostNv12 {
    width: u32,
    height: u32,
    luma: Vec<u8>,
    chroma: Vec<u8>,
}

impl HostNv12 {
    fn textured(width: u32, height: u32, dx: f32, dy: f32) -> Self {
        let frame = textured_frame(width, height, PixelFormat::Nv12, dx, dy);
        let pack = |index: usize| {
            let plane = &frame.planes[index];
            (0..plane.height).flat_map(|y| plane.row(y).to_vec()).collect::<Vec<u8>>()
        };
        Self {
            width,
            height,
            luma: pack(0),
            chroma: pack(1),
        }
    }

    fn process(&mut self, filter: &dyn VideoFilter) -> FrameOutcome {
        let mut view = frame_view(
            format_code::NV12,
            self.width,
            self.height,
            [
                HostPlane::new(&mut self.luma, self.width as usize),
                HostPlane::new(&mut self.chroma, self.width as usize),
            ],
        )
        .unwrap();
        filter.process(&mut view)
    }
}

// ── Settings ───────────────────────────────────────────────────

#[test]
fn host_settings_reach_the_pipeline() {
    let settings = FilterSettings::from_json(
        r#"{"preset": "recording", "smoothing_radius": 12, "edge_mode": "crop", "adaptive_stabilization": true}"#,
    )
    .unwrap();
    let filter = StabilizerFilter::create(&settings).unwrap();
    let config = filter.pipeline().config();
    assert_eq!(config.smoothing_window, 12);
    assert_eq!(config.max_features, Preset::Recording.config().max_features);
    assert_eq!(config.pyramid_levels, 4);
    assert_eq!(config.edge_mode, EdgeMode::Crop);
    assert!(config.adaptive);
}

#[test]
fn defaults_round_trip_through_host_json() {
    let json = StabilizerFilter::defaults().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["enable_stabilization"], serde_json::json!(true));

    let filter = FilterRegistry::new().create(StabilizerFilter::ID, &json).unwrap();
    assert_eq!(filter.name(), StabilizerFilter::ID);
    for property in filter.properties() {
        assert!(
            property.name == "preset" || value.get(&property.name).is_some(),
            "{} not in defaults",
            property.name
        );
    }
}

// ── Frames ─────────────────────────────────────────────────────

#[test]
fn host_frames_are_stabilized() {
    let registry = FilterRegistry::new();
    let filter = registry.create(StabilizerFilter::ID, r#"{"smoothing_radius": 5}"#).unwrap();

    let mut first = HostNv12::textured(320, 240, 0.0, 0.0);
    assert!(matches!(first.process(filter.as_ref()), FrameOutcome::FirstFrame { .. }));

    let mut second = HostNv12::textured(320, 240, 3.0, 0.0);
    let untouched = second.luma.clone();
    match second.process(filter.as_ref()) {
        FrameOutcome::Stabilized { correction, .. } => {
            assert!((correction.translation().x - 3.0).abs() < 0.3, "{correction:?}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_ne!(second.luma, untouched);
    filter.destroy();
}

#[test]
fn disabling_from_host_passes_frames_through() {
    let filter = StabilizerFilter::create(&FilterSettings::default()).unwrap();
    let mut first = HostNv12::textured(160, 120, 0.0, 0.0);
    first.process(&filter);

    filter.update(&FilterSettings::from_json(r#"{"enable_stabilization": false}"#).unwrap());
    let mut second = HostNv12::textured(160, 120, 4.0, 4.0);
    let (luma, chroma) = (second.luma.clone(), second.chroma.clone());
    assert_eq!(second.process(&filter), FrameOutcome::PassThrough(PassReason::Disabled));
    assert_eq!((second.luma, second.chroma), (luma, chroma));
    assert_eq!(filter.metrics().frames_processed, 1);
}

#[test]
fn unknown_host_format_is_untouched() {
    let filter = StabilizerFilter::create(&FilterSettings::default()).unwrap();
    let mut data: Vec<u8> = (0..320 * 240 * 2).map(|i| (i % 249) as u8).collect();
    let before = data.clone();
    {
        let mut view = frame_view(3, 320, 240, [HostPlane::new(&mut data, 640)]).unwrap();
        assert!(filter.process(&mut view).is_pass_through());
    }
    assert_eq!(data, before);
}
