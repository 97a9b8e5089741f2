//! Error types for Mudra Flux
//!
//! The per-tick core never fails; these errors only surface at the boundary
//! where JSON, configuration, or host-supplied readings enter the crate.

use thiserror::Error;

/// Errors that can occur while decoding or validating inputs
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid landmark: {0}")]
    InvalidLandmark(String),

    #[error("Invalid physiology reading: {0}")]
    InvalidReading(String),

    #[error("Tick timestamp went backwards: {0}")]
    NonMonotonicTick(String),

    #[error("No ticks in input")]
    EmptyInput,
}
