//! Core types and settings for the compass fusion loop

use core::time::Duration;

use nalgebra::Vector3;

use crate::error::{FusionError, Result};

/// Fusion loop settings
///
/// Chosen once at startup and fixed for the lifetime of the loop.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use compass_fusion::FusionSettings;
///
/// let settings = FusionSettings {
///     inverted_mount: true,                    // skull logo facing up
///     gyroscope_gain: 0.0175,                  // 500 dps full scale
///     loop_period: Duration::from_millis(20),
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FusionSettings {
    /// Device is mounted upside down
    pub inverted_mount: bool,
    /// Gyroscope scale in degrees per second per LSB
    ///
    /// Depends on the configured full-scale range of the gyroscope. The
    /// default matches a 2000 dps range.
    pub gyroscope_gain: f32,
    /// Complementary filter constant used by [`ComplementaryFilter`](crate::ComplementaryFilter)
    ///
    /// Weight given to the gyro-integrated angle; the remainder goes to the
    /// accelerometer angle.
    pub filter_blend: f32,
    /// Delay between loop iterations
    pub loop_period: Duration,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            inverted_mount: false,
            gyroscope_gain: 0.070,
            filter_blend: 0.40,
            loop_period: Duration::from_millis(30),
        }
    }
}

impl FusionSettings {
    /// Check the settings before starting a loop
    ///
    /// # Errors
    ///
    /// Returns `FusionError::InvalidSettings` if the gyroscope gain is not a
    /// positive finite number or the filter blend lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.gyroscope_gain.is_finite() || self.gyroscope_gain <= 0.0 {
            return Err(FusionError::InvalidSettings(
                "gyroscope gain must be positive and finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.filter_blend) {
            return Err(FusionError::InvalidSettings(
                "filter blend must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Compass heading in degrees
///
/// `Indeterminate` is returned instead of NaN whenever the geometry leaves the
/// heading undefined: no horizontal field component, a zero gravity vector,
/// or a pitch of ±90° in the tilt-compensated case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Heading {
    /// Heading in `[0, 360)`
    Degrees(f32),
    Indeterminate,
}

impl Heading {
    pub fn degrees(self) -> Option<f32> {
        match self {
            Heading::Degrees(degrees) => Some(degrees),
            Heading::Indeterminate => None,
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Heading::Indeterminate)
    }
}

/// Orientation published after every successful iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimate {
    /// Cumulative gyro-integrated angles in degrees (X, Y, Z)
    pub gyro_angle: Vector3<f32>,
    /// Roll from the accelerometer in degrees
    pub accel_angle_x: f32,
    /// Pitch from the accelerometer in degrees, re-ranged so level reads 0
    pub accel_angle_y: f32,
    /// Magnetometer heading without tilt compensation
    pub heading: Heading,
    pub tilt_compensated_heading: Heading,
    /// Integration interval used for this iteration, in seconds
    pub delta_time: f32,
}
