//! Magnetometer compass headings
//!
//! Both headings are reported in `[0, 360)` degrees, or
//! [`Heading::Indeterminate`] when the geometry leaves the direction
//! undefined. NaN never escapes these functions.

use nalgebra::Vector3;

use crate::math::{GEOMETRY_EPSILON, RAD_TO_DEG, Vector3Ext, wrap_degrees};
use crate::tilt::{self, PitchRoll};
use crate::types::Heading;

/// Apply the mount orientation to a calibrated magnetometer reading
///
/// An inverted mount negates the Y axis only.
#[inline]
fn mounted(magnetometer: Vector3<f32>, inverted_mount: bool) -> Vector3<f32> {
    if inverted_mount {
        Vector3::new(magnetometer.x, -magnetometer.y, magnetometer.z)
    } else {
        magnetometer
    }
}

/// `atan2(y, x)` in `[0, 360)`, or indeterminate if `(x, y)` is negligible
/// next to `reference`, the magnitude of the full field
fn heading_from_components(y: f32, x: f32, reference: f32) -> Heading {
    if !x.is_finite() || !y.is_finite() {
        return Heading::Indeterminate;
    }
    if x.hypot(y) <= GEOMETRY_EPSILON * reference {
        return Heading::Indeterminate;
    }
    Heading::Degrees(wrap_degrees(y.atan2(x) * RAD_TO_DEG))
}

/// Calculate the magnetic heading assuming the device is level
///
/// # Arguments
/// * `magnetometer` - Calibrated magnetometer reading
/// * `inverted_mount` - Device is mounted upside down
///
/// # Returns
/// Heading in `[0, 360)`, or `Indeterminate` with no horizontal field
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_fusion::{Heading, compass::heading};
///
/// let north = heading(Vector3::new(1.0, 0.0, 0.0), false);
/// assert_eq!(north, Heading::Degrees(0.0));
/// ```
pub fn heading(magnetometer: Vector3<f32>, inverted_mount: bool) -> Heading {
    if !magnetometer.all_finite() {
        return Heading::Indeterminate;
    }
    let mag = mounted(magnetometer, inverted_mount);
    heading_from_components(mag.y, mag.x, mag.norm())
}

/// Calculate the tilt-compensated magnetic heading
///
/// Pitch and roll come from the normalised accelerometer (see
/// [`tilt::pitch_roll`]); the magnetometer is projected back onto the
/// horizontal plane before taking the heading:
///
/// ```text
/// magXcomp = MAGx*cos(pitch) + MAGz*sin(pitch)
/// magYcomp = MAGx*sin(roll)*sin(pitch) + MAGy*cos(roll) + MAGz*sin(roll)*cos(pitch)
/// ```
///
/// # Returns
/// Heading in `[0, 360)`, or `Indeterminate` when the accelerometer reads
/// zero, the device points straight up or down, or the compensated field has
/// no horizontal component.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_fusion::compass::{heading, tilt_compensated_heading};
///
/// let level = Vector3::new(0.0, 0.0, 1.0);
/// let mag = Vector3::new(0.3, 0.4, -0.5);
///
/// // On a level device both headings agree
/// let raw = heading(mag, false).degrees().unwrap();
/// let compensated = tilt_compensated_heading(level, mag, false).degrees().unwrap();
/// assert!((raw - compensated).abs() < 1e-3);
/// ```
pub fn tilt_compensated_heading(
    accelerometer: Vector3<f32>,
    magnetometer: Vector3<f32>,
    inverted_mount: bool,
) -> Heading {
    if !magnetometer.all_finite() {
        return Heading::Indeterminate;
    }
    let Some(normalised) = tilt::normalise(accelerometer, inverted_mount) else {
        return Heading::Indeterminate;
    };
    let Some(angles) = tilt::pitch_roll(normalised) else {
        return Heading::Indeterminate;
    };

    let mag = mounted(magnetometer, inverted_mount);
    let (compensated_x, compensated_y) = compensate(mag, angles);
    heading_from_components(compensated_y, compensated_x, mag.norm())
}

/// Project the magnetometer onto the horizontal plane
fn compensate(mag: Vector3<f32>, angles: PitchRoll) -> (f32, f32) {
    let (sin_pitch, cos_pitch) = angles.pitch.sin_cos();
    let (sin_roll, cos_roll) = angles.roll.sin_cos();

    let x = mag.x * cos_pitch + mag.z * sin_pitch;
    let y = mag.x * sin_roll * sin_pitch + mag.y * cos_roll + mag.z * sin_roll * cos_pitch;
    (x, y)
}
