//! Error types for SteadyFrame.

use thiserror::Error;

/// Main error type for stabilization operations.
///
/// None of these are fatal to the host: the pipeline converts every one of
/// them into a pass-through frame at the per-frame boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SteadyError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame too small: {width}x{height}")]
    FrameTooSmall { width: u32, height: u32 },

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for SteadyFrame operations.
pub type Result<T> = std::result::Result<T, SteadyError>;
