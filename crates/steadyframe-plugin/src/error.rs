//! Plugin subsystem errors.

use steadyframe_core::SteadyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("filter not found: {0}")]
    NotFound(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
    #[error("invalid host frame: {0}")]
    Frame(#[from] SteadyError),
}
