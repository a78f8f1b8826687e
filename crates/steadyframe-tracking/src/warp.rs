//! Format-aware affine warping of host frames in place.
//!
//! Output pixel `x` of every plane is sampled (bilinearly, per channel) from
//! the input at `T * x`, where `T` is the correction carried onto that
//! plane's own grid. Subsampled chroma planes keep the linear part and
//! divide the translation by their subsampling factor.
//!
//! The crop and scale edge modes compose the correction with a zoom about
//! the frame centre, `T = C * Z`, so the uncovered border falls outside
//! the output. Pixels still uncovered get the padding fill.

use rayon::prelude::*;
use steadyframe_core::{FrameView, PlaneLayout, PlaneView, Result, SteadyError, Transform};
use tracing::trace;

use crate::config::EdgeMode;

/// What [`FrameWarper::apply`] did to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpOutcome {
    /// Every plane was resampled.
    Warped,
    /// The correction is the identity; nothing was touched.
    Identity,
    /// The pixel format is not understood; nothing was touched.
    Unsupported,
}

/// Smallest zoom factor the crop and scale modes use.
const MIN_FRAMING_SCALE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct FrameWarper {
    pub edge_mode: EdgeMode,
    /// Largest correction as a fraction of frame size; sets the crop zoom.
    pub max_correction: f64,
}

impl Default for FrameWarper {
    fn default() -> Self {
        Self::new(EdgeMode::default())
    }
}

impl FrameWarper {
    pub fn new(edge_mode: EdgeMode) -> Self {
        Self {
            edge_mode,
            max_correction: 0.3,
        }
    }

    pub fn with_max_correction(mut self, fraction: f64) -> Self {
        self.max_correction = fraction;
        self
    }

    /// Zoom factor the edge mode applies around `correction`.
    pub fn framing_scale(&self, correction: &Transform, width: u32, height: u32) -> f64 {
        let scale = match self.edge_mode {
            EdgeMode::Padding => return 1.0,
            EdgeMode::Crop => 1.0 - 2.0 * self.max_correction,
            EdgeMode::Scale => {
                let t = correction.translation();
                let span_x = width.saturating_sub(1).max(1) as f64;
                let span_y = height.saturating_sub(1).max(1) as f64;
                1.0 - 2.0 * (t.x.abs() / span_x).max(t.y.abs() / span_y)
            }
        };
        if scale.is_finite() {
            scale.clamp(MIN_FRAMING_SCALE, 1.0)
        } else {
            1.0
        }
    }

    /// The luma-grid transform sampled for `correction`, framing zoom included.
    pub fn output_transform(&self, correction: &Transform, width: u32, height: u32) -> Transform {
        let scale = self.framing_scale(correction, width, height);
        if scale == 1.0 {
            return *correction;
        }
        let cx = (width as f64 - 1.0) / 2.0;
        let cy = (height as f64 - 1.0) / 2.0;
        // Z(x) = c + s * (x - c)
        let zoom = Transform::similarity(scale, 0.0, cx * (1.0 - scale), cy * (1.0 - scale));
        correction.then(zoom)
    }

    /// The correction as applied to a plane with the given layout.
    pub fn plane_transform(correction: &Transform, layout: &PlaneLayout) -> Transform {
        if layout.subsample_x == 1 && layout.subsample_y == 1 {
            *correction
        } else {
            correction.with_translation_divided(layout.subsample_x as f64, layout.subsample_y as f64)
        }
    }

    /// Warp `frame` by `correction`.
    ///
    /// All planes are resampled into scratch buffers first and only copied
    /// back once every plane is done, so an error leaves the frame as it was.
    pub fn apply(&self, frame: &mut FrameView<'_>, correction: &Transform) -> Result<WarpOutcome> {
        if !frame.format.is_supported() {
            return Ok(WarpOutcome::Unsupported);
        }
        frame.validate()?;
        if !correction.is_finite() {
            return Err(SteadyError::Numeric("non-finite correction".into()));
        }
        if correction.is_identity_within(1e-9) {
            return Ok(WarpOutcome::Identity);
        }

        let sampled = self.output_transform(correction, frame.width, frame.height);
        let layouts = frame.format.planes();
        let scratch: Vec<Vec<u8>> = frame
            .planes
            .iter()
            .zip(layouts)
            .map(|(plane, layout)| {
                let t = Self::plane_transform(&sampled, layout);
                trace!(plane = ?layout.kind, tx = t.translation().x, ty = t.translation().y, "warping plane");
                Self::warp_plane(plane, &t, layout.fill_value())
            })
            .collect();

        for (plane, packed) in frame.planes.iter_mut().zip(&scratch) {
            plane.write_packed(packed);
        }
        Ok(WarpOutcome::Warped)
    }

    /// Resample one plane into a tightly packed buffer.
    fn warp_plane(plane: &PlaneView<'_>, t: &Transform, fill: u8) -> Vec<u8> {
        let w = plane.width as usize;
        let h = plane.height as usize;
        let bpp = plane.bytes_per_pixel;
        let row_bytes = plane.row_bytes();
        let mut out = vec![0u8; row_bytes * h];

        let fetch = |x: i64, y: i64, c: usize| -> f32 {
            if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
                return fill as f32;
            }
            plane.data[y as usize * plane.stride + x as usize * bpp + c] as f32
        };

        out.par_chunks_mut(row_bytes).enumerate().for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
                let src = t.transform_point_f64(x as f64, y as f64);
                let x0 = src.x.floor();
                let y0 = src.y.floor();
                let fx = (src.x - x0) as f32;
                let fy = (src.y - y0) as f32;
                let (ix, iy) = (x0 as i64, y0 as i64);
                for (c, value) in px.iter_mut().enumerate() {
                    let top = fetch(ix, iy, c) * (1.0 - fx) + fetch(ix + 1, iy, c) * fx;
                    let bottom = fetch(ix, iy + 1, c) * (1.0 - fx) + fetch(ix + 1, iy + 1, c) * fx;
                    let v = top * (1.0 - fy) + bottom * fy;
                    *value = (v + 0.5).clamp(0.0, 255.0) as u8;
                }
            }
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyframe_core::{FrameBuffer, PixelFormat};

    fn gradient_frame(format: PixelFormat, w: u32, h: u32) -> FrameBuffer {
        let mut frame = FrameBuffer::new(w, h, format);
        frame.fill_with(|plane, x, y, c| ((x * 7 + y * 3 + plane as u32 * 40 + c as u32 * 11) % 256) as u8);
        frame
    }

    /// Values in 50..150 so the black padding fill is recognisable.
    fn bright_frame(w: u32, h: u32) -> FrameBuffer {
        let mut frame = FrameBuffer::new(w, h, PixelFormat::Gray8);
        frame.fill_with(|_, x, y, _| (50 + (x * 3 + y) % 100) as u8);
        frame
    }

    const EDGE_MODES: [EdgeMode; 3] = [EdgeMode::Padding, EdgeMode::Crop, EdgeMode::Scale];

    #[test]
    fn test_identity_leaves_bytes_identical() {
        for edge_mode in EDGE_MODES {
            for format in [PixelFormat::Rgba8, PixelFormat::Nv12, PixelFormat::Yuv420P, PixelFormat::Gray8] {
                let mut frame = gradient_frame(format, 64, 48);
                let before = frame.clone();
                let outcome = FrameWarper::new(edge_mode)
                    .apply(&mut frame.view_mut(), &Transform::IDENTITY)
                    .unwrap();
                assert_eq!(outcome, WarpOutcome::Identity, "{edge_mode:?}");
                for (a, b) in frame.planes.iter().zip(&before.planes) {
                    assert_eq!(a.data, b.data);
                }
            }
        }
    }

    #[test]
    fn test_unsupported_format_is_noop() {
        let mut frame = FrameBuffer::new(64, 48, PixelFormat::Unknown(0x3231_5659));
        frame.planes[0].data.iter_mut().enumerate().for_each(|(i, v)| *v = i as u8);
        let before = frame.planes[0].data.clone();
        let outcome = FrameWarper::default()
            .apply(&mut frame.view_mut(), &Transform::translate(5.0, 5.0))
            .unwrap();
        assert_eq!(outcome, WarpOutcome::Unsupported);
        assert_eq!(frame.planes[0].data, before);
    }

    #[test]
    fn test_integer_translation_shifts_pixels() {
        let mut frame = gradient_frame(PixelFormat::Gray8, 32, 32);
        let before = frame.clone();
        FrameWarper::default()
            .apply(&mut frame.view_mut(), &Transform::translate(3.0, 2.0))
            .unwrap();
        let (out, src) = (&frame.planes[0], &before.planes[0]);
        assert_eq!(out.row(5)[4], src.row(7)[7]);
        // Samples past the right/bottom edge are padded with black.
        assert_eq!(out.row(31)[10], 0);
        assert_eq!(out.row(10)[30], 0);
    }

    #[test]
    fn test_crop_zooms_about_the_centre() {
        let warper = FrameWarper::new(EdgeMode::Crop).with_max_correction(0.1);
        assert!((warper.framing_scale(&Transform::IDENTITY, 101, 51) - 0.8).abs() < 1e-12);

        let t = warper.output_transform(&Transform::translate(1.0, 0.0), 101, 51);
        let corner = t.transform_point_f64(0.0, 0.0);
        assert!((corner.x - 11.0).abs() < 1e-9 && (corner.y - 5.0).abs() < 1e-9, "{corner:?}");
        let centre = t.transform_point_f64(50.0, 25.0);
        assert!((centre.x - 51.0).abs() < 1e-9 && (centre.y - 25.0).abs() < 1e-9, "{centre:?}");
    }

    #[test]
    fn test_crop_hides_border_up_to_max_correction() {
        let correction = Transform::translate(6.0, -4.0);
        let mut padded = bright_frame(64, 48);
        FrameWarper::new(EdgeMode::Padding)
            .apply(&mut padded.view_mut(), &correction)
            .unwrap();
        assert!(padded.planes[0].data.contains(&0));

        let mut cropped = bright_frame(64, 48);
        let outcome = FrameWarper::new(EdgeMode::Crop)
            .with_max_correction(0.1)
            .apply(&mut cropped.view_mut(), &correction)
            .unwrap();
        assert_eq!(outcome, WarpOutcome::Warped);
        assert!(cropped.planes[0].data.iter().all(|&v| v >= 50));
    }

    #[test]
    fn test_scale_follows_the_translation() {
        let warper = FrameWarper::new(EdgeMode::Scale);
        // 1 - 2 * 5 / 100
        assert!((warper.framing_scale(&Transform::translate(5.0, 0.0), 101, 51) - 0.9).abs() < 1e-12);
        assert!((warper.framing_scale(&Transform::translate(0.0, 5.0), 101, 51) - 0.8).abs() < 1e-12);
        assert_eq!(warper.framing_scale(&Transform::translate(500.0, 0.0), 101, 51), MIN_FRAMING_SCALE);
        assert_eq!(warper.framing_scale(&Transform::similarity(1.0, 0.01, 0.0, 0.0), 101, 51), 1.0);

        let mut frame = bright_frame(101, 51);
        warper.apply(&mut frame.view_mut(), &Transform::translate(5.0, 3.0)).unwrap();
        assert!(frame.planes[0].data.iter().all(|&v| v >= 50));
    }

    #[test]
    fn test_chroma_translation_is_halved() {
        let correction = Transform::similarity(1.0, 0.02, 6.0, -4.0);
        let layouts = PixelFormat::Yuv420P.planes();
        let luma = FrameWarper::plane_transform(&correction, &layouts[0]);
        let chroma = FrameWarper::plane_transform(&correction, &layouts[1]);
        assert_eq!(luma, correction);
        assert_eq!(chroma.translation(), correction.translation() / 2.0);
        assert!((chroma.rotation() - correction.rotation()).abs() < 1e-12);
    }

    #[test]
    fn test_nv12_chroma_fill_is_neutral() {
        let mut frame = gradient_frame(PixelFormat::Nv12, 64, 48);
        FrameWarper::default()
            .apply(&mut frame.view_mut(), &Transform::translate(-20.0, 0.0))
            .unwrap();
        assert_eq!(frame.planes[0].row(10)[0], 0);
        assert_eq!(&frame.planes[1].row(5)[0..2], &[128, 128]);
    }

    #[test]
    fn test_padded_stride_is_preserved() {
        let mut y = vec![77u8; 80 * 60];
        {
            let mut view = FrameView::new(
                PixelFormat::Gray8,
                64,
                60,
                smallvec::smallvec![PlaneView::new(&mut y, 80, 64, 60, 1)],
            );
            FrameWarper::default().apply(&mut view, &Transform::translate(1.0, 0.0)).unwrap();
        }
        assert!(y.chunks(80).all(|row| row[64..].iter().all(|&v| v == 77)));
    }
}
