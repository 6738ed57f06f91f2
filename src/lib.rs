//! Compass Fusion - orientation loop for 9-DOF IMUs
//!
//! This library fuses raw accelerometer, gyroscope and magnetometer readings
//! into continuously updated roll and pitch angles and a tilt-compensated
//! compass heading.
//!
//! Each iteration integrates the gyroscope, derives tilt angles from gravity,
//! and computes both a plain and a tilt-compensated magnetometer heading. The
//! gyro- and accelerometer-derived angles are published side by side; a
//! [`ComplementaryFilter`] blends them downstream.
//!
//! # Features
//!
//! - Hard-iron magnetometer calibration from per-axis min/max extremes
//! - Upright and inverted (upside-down) mounting
//! - Explicit handling of degenerate geometry: no NaN headings
//! - Clock glitches clamped instead of integrated
//! - Thread-safe loop with consistent snapshots and cooperative stop
//!
//! # Quick Start
//!
//! ```rust
//! use core::time::Duration;
//! use nalgebra::Vector3;
//! use compass_fusion::{
//!     Fusion, FusionSettings, MagnetometerCalibration, OrientationState, RawSample,
//! };
//!
//! let fusion = Fusion::new(FusionSettings::default(), MagnetometerCalibration::default())?;
//! let mut state = OrientationState::new(Duration::ZERO);
//!
//! // Raw sensor readings
//! let sample = RawSample::new(
//!     Vector3::new(0.0, 0.0, 1.0),   // accelerometer
//!     Vector3::new(12.0, 0.0, -3.0), // gyroscope, LSB
//!     Vector3::new(1.0, 0.0, 0.0),   // magnetometer
//! );
//!
//! // One 30 ms iteration
//! let estimate = fusion.step(&mut state, &sample, Duration::from_millis(30))?;
//!
//! println!(
//!     "roll {:.1} pitch {:.1} heading {:?}",
//!     estimate.accel_angle_x, estimate.accel_angle_y, estimate.tilt_compensated_heading
//! );
//! # Ok::<(), compass_fusion::FusionError>(())
//! ```

mod blend;
pub mod calibration;
pub mod compass;
mod error;
mod fusion;
mod fusion_loop;
mod math;
mod sensor;
pub mod tilt;
mod types;

// Re-export all public types and functions
pub use blend::{BlendedAngles, ComplementaryFilter};
pub use calibration::{MagnetometerCalibration, calibrate_magnetic};
pub use compass::{heading, tilt_compensated_heading};
pub use error::{FusionError, Result, SensorError};
pub use fusion::{Fusion, MIN_DELTA_TIME, OrientationState};
pub use fusion_loop::{
    FusionLoop, FusionLoopHandle, IterationOutcome, OrientationSnapshot, SharedOrientation,
    StopHandle,
};
pub use math::{DEG_TO_RAD, GEOMETRY_EPSILON, RAD_TO_DEG, Vector3Ext, wrap_degrees};
pub use sensor::{Axis, Clock, ManualClock, MonotonicClock, RawSample, SensorSource};
pub use types::*;
