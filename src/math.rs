//! Mathematical utilities and nalgebra extensions for the compass fusion loop

use nalgebra::Vector3;

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Magnitudes below this are treated as zero when dividing by them
pub const GEOMETRY_EPSILON: f32 = 1.0e-6;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning `None` if the magnitude is zero or not finite
    fn checked_normalize(&self) -> Option<Vector3<f32>>;

    /// True if every component is finite
    fn all_finite(&self) -> bool;
}

impl Vector3Ext for Vector3<f32> {
    fn checked_normalize(&self) -> Option<Vector3<f32>> {
        let magnitude = self.norm();
        if magnitude.is_finite() && magnitude > 0.0 {
            Some(*self / magnitude)
        } else {
            None
        }
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|component| component.is_finite())
    }
}

/// Wrap an `atan2`-derived angle in degrees into `[0, 360)`
///
/// Negative angles get 360 added. An angle that rounds up to exactly 360 after
/// the correction (a tiny negative input) maps to 0, and `-0.0` becomes `0.0`.
#[inline]
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = if degrees < 0.0 { degrees + 360.0 } else { degrees };
    if wrapped >= 360.0 { 0.0 } else { wrapped + 0.0 }
}

/// Clamp into the `asin` domain
#[inline]
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(-1.0, 1.0)
}
