//! Grayscale images and image pyramids for multi-scale tracking.

use steadyframe_core::{FrameView, PixelFormat, Result, SteadyError};

/// A grayscale image stored as f32 intensities on the 0..=255 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    /// Build an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> f32,
    {
        let mut img = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.data[(y * width + x) as usize] = f(x, y);
            }
        }
        img
    }

    /// Pixel at integer coordinates, clamped to the border.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Bilinear sample at sub-pixel coordinates, clamped to the border.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (ix, iy) = (x0 as i32, y0 as i32);
        let top = self.get(ix, iy) * (1.0 - fx) + self.get(ix + 1, iy) * fx;
        let bottom = self.get(ix, iy + 1) * (1.0 - fx) + self.get(ix + 1, iy + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Extract the grayscale image the tracker works on from a host frame.
    ///
    /// Y-based formats use the luma plane directly; packed RGB formats are
    /// converted with Rec.601 weights.
    pub fn from_frame(frame: &FrameView<'_>) -> Result<Self> {
        frame.validate()?;
        let plane = &frame.planes[0];
        let (w, h) = (frame.width, frame.height);
        let mut gray = Self::new(w, h);
        match frame.format {
            PixelFormat::Gray8 | PixelFormat::Nv12 | PixelFormat::Yuv420P => {
                for y in 0..h {
                    let dst = &mut gray.data[(y * w) as usize..((y + 1) * w) as usize];
                    for (d, &s) in dst.iter_mut().zip(plane.row(y)) {
                        *d = s as f32;
                    }
                }
            }
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => {
                let (r, b) = if frame.format == PixelFormat::Rgba8 { (0, 2) } else { (2, 0) };
                for y in 0..h {
                    let dst = &mut gray.data[(y * w) as usize..((y + 1) * w) as usize];
                    for (d, px) in dst.iter_mut().zip(plane.row(y).chunks_exact(4)) {
                        *d = 0.299 * px[r] as f32 + 0.587 * px[1] as f32 + 0.114 * px[b] as f32;
                    }
                }
            }
            PixelFormat::Unknown(code) => {
                return Err(SteadyError::UnsupportedFormat(format!("host format {code}")));
            }
        }
        Ok(gray)
    }
}

/// Multi-scale image pyramid. Level 0 is full resolution; each further
/// level halves both dimensions.
#[derive(Debug, Clone)]
pub struct ImagePyramid {
    pub levels: Vec<GrayImage>,
}

impl ImagePyramid {
    /// Stops early once a level would drop below 8 pixels on either side.
    pub fn build(gray: &GrayImage, num_levels: u32) -> Self {
        const MIN_LEVEL_SIZE: u32 = 8;

        let mut levels = vec![gray.clone()];
        for _ in 1..num_levels.max(1) {
            let prev = &levels[levels.len() - 1];
            let nw = prev.width.div_ceil(2);
            let nh = prev.height.div_ceil(2);
            if nw < MIN_LEVEL_SIZE || nh < MIN_LEVEL_SIZE {
                break;
            }
            let mut level = GrayImage::new(nw, nh);
            for y in 0..nh {
                for x in 0..nw {
                    let sx = (x * 2) as i32;
                    let sy = (y * 2) as i32;
                    let avg = (prev.get(sx, sy)
                        + prev.get(sx + 1, sy)
                        + prev.get(sx, sy + 1)
                        + prev.get(sx + 1, sy + 1))
                        * 0.25;
                    level.set(x, y, avg);
                }
            }
            levels.push(level);
        }
        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}
