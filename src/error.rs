//! Error types for the compass fusion loop

use crate::sensor::Axis;

/// Errors reported by a [`SensorSource`](crate::SensorSource).
///
/// A sensor error is never fatal to the loop: the iteration that hit it is
/// skipped and the previous orientation state is kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("I/O error reading {axis}: {message}")]
    Io { axis: Axis, message: String },

    #[error("Sensor not ready")]
    NotReady,

    #[error("Invalid reading on {axis}")]
    InvalidReading { axis: Axis },
}

/// Errors that can occur when configuring or driving the fusion loop.
#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Invalid settings: {0}")]
    InvalidSettings(&'static str),

    #[error("Fusion loop thread panicked")]
    ThreadPanicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate
pub type Result<T> = core::result::Result<T, FusionError>;
