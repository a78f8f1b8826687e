//! Synthetic frames shared by the integration tests.

use steadyframe_core::{FrameBuffer, PixelFormat};
use steadyframe_tracking::GrayImage;

/// Smooth texture with corners in several orientations, sampled at
/// `(x - dx, y - dy)` so that larger `dx` moves content right.
pub fn texture(x: f32, y: f32, dx: f32, dy: f32) -> f32 {
    let (fx, fy) = (x - dx, y - dy);
    128.0
        + 45.0 * (fx * 0.12).sin() * (fy * 0.10).cos()
        + 35.0 * (fx * 0.045 + fy * 0.065).sin()
        + 25.0 * (fx * 0.08 - fy * 0.05).cos()
}

pub fn gray_image(w: u32, h: u32, dx: f32, dy: f32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| texture(x as f32, y as f32, dx, dy))
}

/// A frame whose luma carries the texture and whose chroma is mid-grey.
pub fn textured_frame(w: u32, h: u32, format: PixelFormat, dx: f32, dy: f32) -> FrameBuffer {
    let mut frame = FrameBuffer::new(w, h, format);
    frame.fill_with(|plane, x, y, channel| match (format, plane) {
        (PixelFormat::Rgba8 | PixelFormat::Bgra8, _) if channel == 3 => 255,
        (PixelFormat::Nv12 | PixelFormat::Yuv420P, 1..) => 128,
        _ => texture(x as f32, y as f32, dx, dy).round().clamp(0.0, 255.0) as u8,
    });
    frame
}

/// Every plane's bytes, padding included.
pub fn snapshot(frame: &FrameBuffer) -> Vec<Vec<u8>> {
    frame.planes.iter().map(|p| p.data.clone()).collect()
}
