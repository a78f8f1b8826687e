//! SteadyFrame Core - Foundation types for real-time stabilization
//!
//! This crate provides the types shared by the tracking pipeline and the
//! host-facing plugin layer:
//! - Frame buffers, borrowed frame views and pixel formats
//! - 2x3 affine transforms and geometric primitives
//! - The error type used at module seams

pub mod error;
pub mod frame;
pub mod geometry;

pub use error::{Result, SteadyError};
pub use frame::{FrameBuffer, FramePlane, FrameView, PixelFormat, PlaneKind, PlaneLayout, PlaneView};
pub use geometry::{FeaturePoint, Rect, Transform, Vec2};

/// Limits shared by every stage that inspects frame geometry.
pub mod limits {
    /// Frames smaller than this in either dimension are not analysed.
    pub const MIN_FRAME_DIMENSION: u32 = 50;

    /// Largest frame width accepted from the host (8K UHD).
    pub const MAX_FRAME_WIDTH: u32 = 7680;

    /// Largest frame height accepted from the host (8K UHD).
    pub const MAX_FRAME_HEIGHT: u32 = 4320;
}
