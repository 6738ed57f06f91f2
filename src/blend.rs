//! Complementary filter over successive orientation estimates
//!
//! The fusion loop publishes gyro-integrated and accelerometer-derived angles
//! side by side. This consumer blends them:
//!
//! ```text
//! angle = blend * (angle + gyro_increment) + (1 - blend) * accel_angle
//! ```
//!
//! where `gyro_increment` is the change in the cumulative gyro angle since the
//! previous estimate (`rate * dt`).

use nalgebra::Vector3;

use crate::types::OrientationEstimate;

/// Blended roll/pitch angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlendedAngles {
    pub x: f32,
    pub y: f32,
}

/// Complementary filter fed from [`OrientationEstimate`]s
///
/// # Example
/// ```
/// use compass_fusion::{ComplementaryFilter, FusionSettings};
///
/// let settings = FusionSettings::default();
/// let mut filter = ComplementaryFilter::new(settings.filter_blend);
/// assert_eq!(filter.angles().x, 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ComplementaryFilter {
    blend: f32,
    angles: BlendedAngles,
    previous_gyro_angle: Vector3<f32>,
}

impl ComplementaryFilter {
    /// Create a filter with the given gyro weight
    ///
    /// `blend` is clamped into `[0, 1]`.
    pub fn new(blend: f32) -> Self {
        Self {
            blend: blend.clamp(0.0, 1.0),
            angles: BlendedAngles::default(),
            previous_gyro_angle: Vector3::zeros(),
        }
    }

    /// Feed the next estimate and return the blended angles
    ///
    /// Estimates must come from the same loop, in order. The gyro increment of
    /// the first estimate is measured from zero, which is where the loop's
    /// gyro angles start.
    pub fn update(&mut self, estimate: &OrientationEstimate) -> BlendedAngles {
        let increment = estimate.gyro_angle - self.previous_gyro_angle;
        self.previous_gyro_angle = estimate.gyro_angle;

        self.angles.x = self.mix(self.angles.x + increment.x, estimate.accel_angle_x);
        self.angles.y = self.mix(self.angles.y + increment.y, estimate.accel_angle_y);
        self.angles
    }

    #[inline]
    fn mix(&self, gyro: f32, accel: f32) -> f32 {
        self.blend * gyro + (1.0 - self.blend) * accel
    }

    pub fn angles(&self) -> BlendedAngles {
        self.angles
    }

    pub fn blend(&self) -> f32 {
        self.blend
    }

    /// Clear the blended angles, re-anchoring gyro increments at `gyro_angle`
    pub fn reset(&mut self, gyro_angle: Vector3<f32>) {
        self.angles = BlendedAngles::default();
        self.previous_gyro_angle = gyro_angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Heading;

    const EPSILON: f32 = 1e-4;

    fn estimate(gyro_angle: Vector3<f32>, accel_x: f32, accel_y: f32) -> OrientationEstimate {
        OrientationEstimate {
            gyro_angle,
            accel_angle_x: accel_x,
            accel_angle_y: accel_y,
            heading: Heading::Indeterminate,
            tilt_compensated_heading: Heading::Indeterminate,
            delta_time: 0.03,
        }
    }

    #[test]
    fn test_single_update_matches_formula() {
        let mut filter = ComplementaryFilter::new(0.40);
        let angles = filter.update(&estimate(Vector3::new(2.0, -1.0, 0.0), 10.0, 20.0));

        // 0.4 * (0 + 2) + 0.6 * 10, 0.4 * (0 - 1) + 0.6 * 20
        assert!((angles.x - 6.8).abs() < EPSILON);
        assert!((angles.y - 11.6).abs() < EPSILON);
    }

    #[test]
    fn test_uses_gyro_increment_not_total() {
        let mut filter = ComplementaryFilter::new(1.0);
        filter.update(&estimate(Vector3::new(5.0, 0.0, 0.0), 0.0, 0.0));
        let angles = filter.update(&estimate(Vector3::new(7.0, 0.0, 0.0), 0.0, 0.0));

        // Pure gyro: 5 then +2
        assert!((angles.x - 7.0).abs() < EPSILON);
    }

    #[test]
    fn test_converges_to_accelerometer_when_still() {
        let mut filter = ComplementaryFilter::new(0.40);
        let mut angles = BlendedAngles::default();
        for _ in 0..50 {
            angles = filter.update(&estimate(Vector3::zeros(), 30.0, -15.0));
        }
        assert!((angles.x - 30.0).abs() < EPSILON);
        assert!((angles.y + 15.0).abs() < EPSILON);
    }

    #[test]
    fn test_blend_is_clamped() {
        assert_eq!(ComplementaryFilter::new(2.0).blend(), 1.0);
        assert_eq!(ComplementaryFilter::new(-0.5).blend(), 0.0);
    }

    #[test]
    fn test_reset_reanchors() {
        let mut filter = ComplementaryFilter::new(1.0);
        filter.update(&estimate(Vector3::new(100.0, 0.0, 0.0), 0.0, 0.0));
        filter.reset(Vector3::new(100.0, 0.0, 0.0));
        assert_eq!(filter.angles(), BlendedAngles::default());

        let angles = filter.update(&estimate(Vector3::new(101.0, 0.0, 0.0), 0.0, 0.0));
        assert!((angles.x - 1.0).abs() < EPSILON);
    }
}
