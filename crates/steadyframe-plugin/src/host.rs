//! Mapping between the host's frame descriptors and [`FrameView`].
//!
//! The host hands over a format code, frame dimensions and one
//! `(data, stride)` pair per plane. Plane sizes follow from the format.

use smallvec::SmallVec;
use steadyframe_core::{FrameView, PixelFormat, PlaneView, SteadyError};

use crate::error::PluginError;

/// Host video format codes.
pub mod format_code {
    pub const NONE: u32 = 0;
    pub const I420: u32 = 1;
    pub const NV12: u32 = 2;
    pub const RGBA: u32 = 6;
    pub const BGRA: u32 = 7;
    /// BGRA with the alpha byte ignored.
    pub const BGRX: u32 = 8;
    pub const Y800: u32 = 9;
}

/// Translate a host format code.
pub fn pixel_format(code: u32) -> PixelFormat {
    match code {
        format_code::I420 => PixelFormat::Yuv420P,
        format_code::NV12 => PixelFormat::Nv12,
        format_code::RGBA => PixelFormat::Rgba8,
        format_code::BGRA | format_code::BGRX => PixelFormat::Bgra8,
        format_code::Y800 => PixelFormat::Gray8,
        other => PixelFormat::Unknown(other),
    }
}

/// One host-owned plane.
#[derive(Debug)]
pub struct HostPlane<'a> {
    pub data: &'a mut [u8],
    /// Bytes per row, including any padding.
    pub stride: usize,
}

impl<'a> HostPlane<'a> {
    pub fn new(data: &'a mut [u8], stride: usize) -> Self {
        Self { data, stride }
    }
}

/// Borrow a host frame as a [`FrameView`].
///
/// Unknown formats produce a view the pipeline will pass through untouched.
/// Missing planes for a known format are an error.
pub fn frame_view<'a>(
    code: u32,
    width: u32,
    height: u32,
    planes: impl IntoIterator<Item = HostPlane<'a>>,
) -> Result<FrameView<'a>, PluginError> {
    let format = pixel_format(code);
    let mut host_planes = planes.into_iter();
    let layouts = format.planes();

    let views: SmallVec<[PlaneView<'a>; 3]> = if layouts.is_empty() {
        host_planes
            .map(|p| PlaneView::new(p.data, p.stride, width, height, 1))
            .collect()
    } else {
        let mut views = SmallVec::new();
        for (index, layout) in layouts.iter().enumerate() {
            let plane = host_planes.next().ok_or_else(|| {
                SteadyError::InvalidFrame(format!(
                    "{} needs {} planes, host gave {index}",
                    format.name(),
                    layouts.len()
                ))
            })?;
            let (w, h) = layout.plane_size(width, height);
            views.push(PlaneView::new(plane.data, plane.stride, w, h, layout.bytes_per_pixel));
        }
        views
    };

    Ok(FrameView::new(format, width, height, views))
}
