//! Gravity-derived tilt angles
//!
//! Two views of the accelerometer vector are computed each iteration:
//! display angles for the X and Y axes (degrees, no history), and the
//! pitch/roll pair (radians) used to tilt-compensate the compass.

use core::f32::consts::PI;

use nalgebra::Vector3;

use crate::math::{GEOMETRY_EPSILON, RAD_TO_DEG, Vector3Ext, clamp_unit};

/// Accelerometer tilt angles in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelAngles {
    /// Rotation about X, `atan2(y, z)`
    pub x: f32,
    /// Rotation about Y, re-ranged so that a level device reads 0
    pub y: f32,
}

/// Calculate accelerometer tilt angles
///
/// An inverted mount negates all three axes before the angles are taken.
/// The Y angle comes out of `atan2(z, x) + π` in `[0, 360]` and is then
/// rotated so the zero point is "up": values above 90 lose 270, the rest
/// gain 90.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use compass_fusion::tilt::accelerometer_angles;
///
/// let level = accelerometer_angles(Vector3::new(0.0, 0.0, 1.0), false);
/// assert!(level.x.abs() < 1e-4);
/// assert!(level.y.abs() < 1e-4);
/// ```
pub fn accelerometer_angles(accelerometer: Vector3<f32>, inverted_mount: bool) -> AccelAngles {
    let acc = if inverted_mount {
        -accelerometer
    } else {
        accelerometer
    };

    let x = acc.y.atan2(acc.z) * RAD_TO_DEG;
    let y = (acc.z.atan2(acc.x) + PI) * RAD_TO_DEG;

    AccelAngles {
        x,
        y: rerange_y_angle(y),
    }
}

/// Rotate the raw `[0, 360]` Y angle into `(-180, 180]` with 0 pointing up
#[inline]
fn rerange_y_angle(raw: f32) -> f32 {
    if raw > 90.0 { raw - 270.0 } else { raw + 90.0 }
}

/// Normalised horizontal accelerometer components
///
/// `x` carries the mount sign, `y` does not: an inverted mount negates the X
/// component only, which flips the sign of roll on an inverted device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalisedTilt {
    pub x: f32,
    pub y: f32,
}

/// Normalise the accelerometer for tilt compensation
///
/// Returns `None` when the vector has zero or non-finite magnitude.
pub fn normalise(accelerometer: Vector3<f32>, inverted_mount: bool) -> Option<NormalisedTilt> {
    let unit = accelerometer.checked_normalize()?;
    let x = if inverted_mount { -unit.x } else { unit.x };
    Some(NormalisedTilt { x, y: unit.y })
}

/// Pitch and roll in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRoll {
    pub pitch: f32,
    pub roll: f32,
}

/// Derive pitch and roll from normalised accelerometer components
///
/// `pitch = asin(x)` and `roll = -asin(y / cos(pitch))`. Both `asin`
/// arguments are clamped to `[-1, 1]` so rounding can never produce NaN.
/// Returns `None` at ±90° pitch, where `cos(pitch)` vanishes and roll is
/// undefined.
pub fn pitch_roll(tilt: NormalisedTilt) -> Option<PitchRoll> {
    let pitch = clamp_unit(tilt.x).asin();
    let cos_pitch = pitch.cos();
    if cos_pitch.abs() < GEOMETRY_EPSILON {
        return None;
    }
    let roll = -clamp_unit(tilt.y / cos_pitch).asin();
    Some(PitchRoll { pitch, roll })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_level_device_reads_zero() {
        // atan2(0, 1) = 0; (atan2(1, 0) + π) = 270° which re-ranges to 0
        let angles = accelerometer_angles(Vector3::new(0.0, 0.0, 1.0), false);
        assert!(angles.x.abs() < EPSILON, "x = {}", angles.x);
        assert!(angles.y.abs() < EPSILON, "y = {}", angles.y);
    }

    #[test]
    fn test_inverted_level_device_reads_zero() {
        // Upside down, gravity reads -1 on Z
        let angles = accelerometer_angles(Vector3::new(0.0, 0.0, -1.0), true);
        assert!(angles.x.abs() < EPSILON);
        assert!(angles.y.abs() < EPSILON);
    }

    #[test]
    fn test_roll_about_x() {
        // 45° roll: gravity split equally between Y and Z
        let angles = accelerometer_angles(Vector3::new(0.0, 1.0, 1.0), false);
        assert!((angles.x - 45.0).abs() < EPSILON);
        assert!(angles.y.abs() < EPSILON);
    }

    #[test]
    fn test_y_angle_rerange_branches() {
        // Gravity on +X: atan2(0, 1) + π = 180° -> 180 - 270 = -90
        let nose_down = accelerometer_angles(Vector3::new(1.0, 0.0, 0.0), false);
        assert!((nose_down.y + 90.0).abs() < EPSILON);

        // Gravity on -X: atan2(0, -1) + π = 360° -> 90
        let nose_up = accelerometer_angles(Vector3::new(-1.0, 0.0, 0.0), false);
        assert!((nose_up.y - 90.0).abs() < EPSILON);

        // atan2(-1, 1) + π = 135° -> -135
        let upper = accelerometer_angles(Vector3::new(1.0, 0.0, -1.0), false);
        assert!((upper.y + 135.0).abs() < EPSILON);

        // atan2(-1, -1) + π = 45° -> 135
        let lower = accelerometer_angles(Vector3::new(-1.0, 0.0, -1.0), false);
        assert!((lower.y - 135.0).abs() < EPSILON);
    }

    #[test]
    fn test_rerange_boundary() {
        assert_eq!(rerange_y_angle(90.0), 180.0);
        assert!((rerange_y_angle(90.001) - (90.001 - 270.0)).abs() < EPSILON);
        assert_eq!(rerange_y_angle(0.0), 90.0);
        assert_eq!(rerange_y_angle(360.0), 90.0);
    }

    #[test]
    fn test_normalise_sign_asymmetry() {
        let acc = Vector3::new(3.0, 4.0, 0.0);

        let upright = normalise(acc, false).unwrap();
        assert!((upright.x - 0.6).abs() < 1e-6);
        assert!((upright.y - 0.8).abs() < 1e-6);

        // Only X flips on an inverted mount
        let inverted = normalise(acc, true).unwrap();
        assert!((inverted.x + 0.6).abs() < 1e-6);
        assert!((inverted.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalise_zero_vector() {
        assert!(normalise(Vector3::zeros(), false).is_none());
        assert!(normalise(Vector3::zeros(), true).is_none());
    }

    #[test]
    fn test_pitch_roll_level() {
        let tilt = normalise(Vector3::new(0.0, 0.0, 1.0), false).unwrap();
        let pr = pitch_roll(tilt).unwrap();
        assert!(pr.pitch.abs() < 1e-6);
        assert!(pr.roll.abs() < 1e-6);
    }

    #[test]
    fn test_pitch_roll_vertical_is_undefined() {
        let tilt = NormalisedTilt { x: 1.0, y: 0.0 };
        assert!(pitch_roll(tilt).is_none());

        let tilt = NormalisedTilt { x: -1.0, y: 0.0 };
        assert!(pitch_roll(tilt).is_none());
    }

    #[test]
    fn test_pitch_roll_clamps_rounding_overshoot() {
        // Slightly outside the asin domain from rounding
        let tilt = NormalisedTilt {
            x: 0.0,
            y: 1.000_000_1,
        };
        let pr = pitch_roll(tilt).unwrap();
        assert!(pr.roll.is_finite());
        assert!((pr.roll + core::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
