//! Frame buffer types for video frames in CPU memory.
//!
//! The host owns every frame handed to the stabilizer. [`FrameView`] borrows
//! the host's planes for the duration of one call; [`FrameBuffer`] is an
//! owned equivalent used by tools and tests that lends out a view.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Result, SteadyError};
use crate::limits;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, packed (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit BGRA, packed (32 bits per pixel)
    Bgra8,
    /// 8-bit grayscale
    Gray8,
    /// Y plane + interleaved UV plane at half resolution (4:2:0)
    Nv12,
    /// Y + U + V planes, U/V at half resolution (4:2:0, I420)
    Yuv420P,
    /// A host format code this crate does not understand
    Unknown(u32),
}

/// What a plane carries, which decides the border fill used when warping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneKind {
    /// Luma samples.
    Luma,
    /// Chroma difference samples (neutral value 128).
    Chroma,
    /// Packed color (all channels in one plane).
    Packed,
}

/// Geometry of one plane relative to the frame it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneLayout {
    pub kind: PlaneKind,
    pub bytes_per_pixel: usize,
    /// Horizontal subsampling factor (1 = full resolution).
    pub subsample_x: u32,
    /// Vertical subsampling factor (1 = full resolution).
    pub subsample_y: u32,
}

impl PlaneLayout {
    const fn new(kind: PlaneKind, bytes_per_pixel: usize, subsample_x: u32, subsample_y: u32) -> Self {
        Self {
            kind,
            bytes_per_pixel,
            subsample_x,
            subsample_y,
        }
    }

    /// Plane dimensions for a frame of `width` x `height`.
    pub fn plane_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.subsample_x), height.div_ceil(self.subsample_y))
    }

    /// Value written into uncovered border pixels.
    pub fn fill_value(&self) -> u8 {
        match self.kind {
            PlaneKind::Chroma => 128,
            PlaneKind::Luma | PlaneKind::Packed => 0,
        }
    }
}

const PACKED_4: [PlaneLayout; 1] = [PlaneLayout::new(PlaneKind::Packed, 4, 1, 1)];
const GRAY: [PlaneLayout; 1] = [PlaneLayout::new(PlaneKind::Luma, 1, 1, 1)];
const NV12: [PlaneLayout; 2] = [
    PlaneLayout::new(PlaneKind::Luma, 1, 1, 1),
    PlaneLayout::new(PlaneKind::Chroma, 2, 2, 2),
];
const YUV420P: [PlaneLayout; 3] = [
    PlaneLayout::new(PlaneKind::Luma, 1, 1, 1),
    PlaneLayout::new(PlaneKind::Chroma, 1, 2, 2),
    PlaneLayout::new(PlaneKind::Chroma, 1, 2, 2),
];

impl PixelFormat {
    /// Plane layouts for this format. Empty for unknown formats.
    pub fn planes(self) -> &'static [PlaneLayout] {
        match self {
            Self::Rgba8 | Self::Bgra8 => &PACKED_4,
            Self::Gray8 => &GRAY,
            Self::Nv12 => &NV12,
            Self::Yuv420P => &YUV420P,
            Self::Unknown(_) => &[],
        }
    }

    /// Number of planes for this format.
    pub fn plane_count(self) -> usize {
        self.planes().len()
    }

    /// Whether the stabilizer can analyse and warp this format.
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Short name for logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Rgba8 => "RGBA",
            Self::Bgra8 => "BGRA",
            Self::Gray8 => "Y800",
            Self::Nv12 => "NV12",
            Self::Yuv420P => "I420",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Calculate total tightly packed bytes for a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        self.planes()
            .iter()
            .map(|layout| {
                let (w, h) = layout.plane_size(width, height);
                w as usize * h as usize * layout.bytes_per_pixel
            })
            .sum()
    }
}

/// An owned plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel (2 for interleaved UV)
    pub bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a new zeroed frame plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        // Align stride to 64 bytes for SIMD compatibility
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self::with_stride(width, height, bytes_per_pixel, stride)
    }

    /// Create a new zeroed plane with an explicit stride.
    pub fn with_stride(width: u32, height: u32, bytes_per_pixel: usize, stride: usize) -> Self {
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Get a row of pixel data (without padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }

    /// Borrow this plane as a view.
    pub fn view_mut(&mut self) -> PlaneView<'_> {
        PlaneView {
            data: &mut self.data,
            stride: self.stride,
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bytes_per_pixel,
        }
    }
}

/// A mutable borrow of one host-owned plane.
#[derive(Debug)]
pub struct PlaneView<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
}

impl<'a> PlaneView<'a> {
    pub fn new(
        data: &'a mut [u8],
        stride: usize,
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
    ) -> Self {
        Self {
            data,
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Bytes of pixel data in one row, excluding padding.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.row_bytes();
        &mut self.data[start..end]
    }

    /// Check that the stride and buffer length cover the declared geometry.
    pub fn validate(&self) -> Result<()> {
        let row_bytes = self.row_bytes();
        if self.width == 0 || self.height == 0 {
            return Err(SteadyError::InvalidFrame("empty plane".into()));
        }
        if self.stride < row_bytes {
            return Err(SteadyError::InvalidFrame(format!(
                "stride {} shorter than row of {} bytes",
                self.stride, row_bytes
            )));
        }
        let required = self.stride * (self.height as usize - 1) + row_bytes;
        if self.data.len() < required {
            return Err(SteadyError::InvalidFrame(format!(
                "plane holds {} bytes, geometry needs {}",
                self.data.len(),
                required
            )));
        }
        Ok(())
    }

    /// Copy tightly packed rows (`row_bytes()` per row) into this plane,
    /// leaving row padding untouched.
    pub fn write_packed(&mut self, packed: &[u8]) {
        let row_bytes = self.row_bytes();
        for (y, src) in packed.chunks_exact(row_bytes).take(self.height as usize).enumerate() {
            self.row_mut(y as u32).copy_from_slice(src);
        }
    }
}

/// A host frame borrowed for one processing call.
#[derive(Debug)]
pub struct FrameView<'a> {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: SmallVec<[PlaneView<'a>; 3]>,
}

impl<'a> FrameView<'a> {
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: SmallVec<[PlaneView<'a>; 3]>,
    ) -> Self {
        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Check format support and that every plane matches the format's layout.
    pub fn validate(&self) -> Result<()> {
        if !self.format.is_supported() {
            return Err(SteadyError::UnsupportedFormat(format!("{:?}", self.format)));
        }
        if self.width == 0
            || self.height == 0
            || self.width > limits::MAX_FRAME_WIDTH
            || self.height > limits::MAX_FRAME_HEIGHT
        {
            return Err(SteadyError::InvalidFrame(format!(
                "dimensions {}x{} out of range",
                self.width, self.height
            )));
        }
        let layouts = self.format.planes();
        if self.planes.len() != layouts.len() {
            return Err(SteadyError::InvalidFrame(format!(
                "{} expects {} planes, got {}",
                self.format.name(),
                layouts.len(),
                self.planes.len()
            )));
        }
        for (index, (plane, layout)) in self.planes.iter().zip(layouts).enumerate() {
            let (w, h) = layout.plane_size(self.width, self.height);
            if plane.width != w || plane.height != h || plane.bytes_per_pixel != layout.bytes_per_pixel {
                return Err(SteadyError::InvalidFrame(format!(
                    "plane {index} is {}x{}@{}, expected {w}x{h}@{}",
                    plane.width, plane.height, plane.bytes_per_pixel, layout.bytes_per_pixel
                )));
            }
            plane.validate()?;
        }
        Ok(())
    }
}

/// An owned video frame in CPU memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel data planes (1-3 depending on format)
    pub planes: SmallVec<[FramePlane; 3]>,
}

impl FrameBuffer {
    /// Create a new zeroed frame buffer with the given dimensions and format.
    ///
    /// Unknown formats get a single opaque 4-byte-per-pixel plane.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = match format {
            PixelFormat::Unknown(_) => smallvec::smallvec![FramePlane::new(width, height, 4)],
            _ => format
                .planes()
                .iter()
                .map(|layout| {
                    let (w, h) = layout.plane_size(width, height);
                    FramePlane::new(w, h, layout.bytes_per_pixel)
                })
                .collect(),
        };

        Self {
            format,
            width,
            height,
            planes,
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Get the primary plane (plane 0).
    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    /// Get the primary plane mutably.
    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }

    /// Borrow the whole frame as a view.
    pub fn view_mut(&mut self) -> FrameView<'_> {
        FrameView {
            format: self.format,
            width: self.width,
            height: self.height,
            planes: self.planes.iter_mut().map(FramePlane::view_mut).collect(),
        }
    }

    /// Fill every pixel of every plane from a per-plane generator
    /// `f(plane_index, x, y, channel)`.
    pub fn fill_with<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, u32, u32, usize) -> u8,
    {
        for (index, plane) in self.planes.iter_mut().enumerate() {
            let bpp = plane.bytes_per_pixel;
            for y in 0..plane.height {
                let row = plane.row_mut(y);
                for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
                    for (c, v) in px.iter_mut().enumerate() {
                        *v = f(index, x as u32, y, c);
                    }
                }
            }
        }
    }
}
