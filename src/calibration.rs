//! Magnetometer hard-iron calibration

use nalgebra::Vector3;

use crate::error::{FusionError, Result};

/// Per-axis magnetometer extremes recorded during a calibration sweep
///
/// The hard-iron offset of each axis is the midpoint of its extremes. All
/// zeros (the default) means "uncalibrated" and leaves readings untouched.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_fusion::MagnetometerCalibration;
///
/// let calibration = MagnetometerCalibration {
///     x_min: -1748.0,
///     x_max: 959.0,
///     y_min: -1025.0,
///     y_max: 1651.0,
///     z_min: -1876.0,
///     z_max: 708.0,
/// };
///
/// let offset = calibration.hard_iron_offset();
/// assert_eq!(offset, Vector3::new(-394.5, 313.0, -584.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagnetometerCalibration {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_min: f32,
    pub z_max: f32,
}

impl MagnetometerCalibration {
    /// Hard-iron offset, `(min + max) / 2` per axis
    pub fn hard_iron_offset(&self) -> Vector3<f32> {
        Vector3::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
            (self.z_min + self.z_max) / 2.0,
        )
    }

    /// Subtract the hard-iron offset from a raw reading
    pub fn apply(&self, uncalibrated: Vector3<f32>) -> Vector3<f32> {
        calibrate_magnetic(uncalibrated, self.hard_iron_offset())
    }

    /// Check that every axis has finite extremes with `min <= max`
    ///
    /// # Errors
    ///
    /// Returns `FusionError::InvalidSettings` for an inverted or non-finite pair.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            (self.x_min, self.x_max),
            (self.y_min, self.y_max),
            (self.z_min, self.z_max),
        ];
        for (min, max) in pairs {
            if !min.is_finite() || !max.is_finite() {
                return Err(FusionError::InvalidSettings(
                    "magnetometer calibration must be finite",
                ));
            }
            if min > max {
                return Err(FusionError::InvalidSettings(
                    "magnetometer calibration min exceeds max",
                ));
            }
        }
        Ok(())
    }
}

/// Applies magnetometer hard-iron correction
///
/// # Arguments
/// * `uncalibrated` - Raw magnetometer reading
/// * `hard_iron_offset` - Hard iron offset vector
///
/// # Returns
/// Calibrated magnetometer reading
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_fusion::calibration::calibrate_magnetic;
///
/// let raw = Vector3::new(100.0, 200.0, 300.0);
/// let hard_iron = Vector3::new(10.0, 20.0, 30.0);
///
/// let calibrated = calibrate_magnetic(raw, hard_iron);
/// assert_eq!(calibrated, Vector3::new(90.0, 180.0, 270.0));
/// ```
pub fn calibrate_magnetic(
    uncalibrated: Vector3<f32>,
    hard_iron_offset: Vector3<f32>,
) -> Vector3<f32> {
    uncalibrated - hard_iron_offset
}
