//! Integration test crate for SteadyFrame.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every steadyframe crate to verify they work together.

#[cfg(test)]
mod support;

#[cfg(test)]
mod tracking;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod plugin;
