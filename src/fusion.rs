//! Single-step orientation fusion
//!
//! [`Fusion`] turns one raw IMU sample plus a timestamp into an
//! [`OrientationEstimate`]. It owns no threads and no sensor; the
//! [`FusionLoop`](crate::FusionLoop) drives it, and tests can drive it
//! directly one step at a time.

use core::time::Duration;

use log::warn;
use nalgebra::Vector3;

use crate::calibration::MagnetometerCalibration;
use crate::compass;
use crate::error::{Result, SensorError};
use crate::sensor::RawSample;
use crate::tilt;
use crate::types::{FusionSettings, OrientationEstimate};

/// Smallest integration interval in seconds
///
/// Used in place of a zero or negative interval when the clock stalls or
/// steps backwards.
pub const MIN_DELTA_TIME: f32 = 1.0e-6;

/// Mutable orientation state carried between iterations
///
/// The gyro angles are an open-ended integral: they are only ever incremented
/// by `rate * dt`, never wrapped or reset, and drift over time. The
/// accelerometer and magnetometer angles published alongside them are what
/// corrects for that drift downstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationState {
    /// Cumulative gyro-integrated angles in degrees
    gyro_angle: Vector3<f32>,
    /// Clock reading at the previous successful iteration
    last_sample_time: Duration,
}

impl OrientationState {
    /// Create a state with zero gyro angles, timed from `now`
    pub fn new(now: Duration) -> Self {
        Self {
            gyro_angle: Vector3::zeros(),
            last_sample_time: now,
        }
    }

    pub fn gyro_angle(&self) -> Vector3<f32> {
        self.gyro_angle
    }

    pub fn last_sample_time(&self) -> Duration {
        self.last_sample_time
    }

    /// Seconds since the previous sample, and advance the sample time to `now`
    ///
    /// A clock that stalls or runs backwards yields [`MIN_DELTA_TIME`]. The
    /// stored sample time still moves to `now` so the next interval is
    /// measured from the latest reading.
    pub fn advance_time(&mut self, now: Duration) -> f32 {
        let elapsed = now.checked_sub(self.last_sample_time);
        self.last_sample_time = now;

        match elapsed {
            Some(elapsed) if elapsed.as_secs_f32() >= MIN_DELTA_TIME => elapsed.as_secs_f32(),
            Some(_) => MIN_DELTA_TIME,
            None => {
                warn!("Clock moved backwards; clamping integration interval");
                MIN_DELTA_TIME
            }
        }
    }

    /// Integrate an angular rate in degrees per second over `delta_time` seconds
    pub fn integrate(&mut self, rate: Vector3<f32>, delta_time: f32) {
        self.gyro_angle += rate * delta_time;
    }
}

/// The complementary fusion pipeline
///
/// Holds the fixed settings and calibration. The mutable
/// [`OrientationState`] is passed in on every step, so the caller decides
/// where it lives: on the stack for a single-step drive, or behind the
/// [`FusionLoop`](crate::FusionLoop)'s lock.
///
/// # Example
/// ```
/// use core::time::Duration;
/// use nalgebra::Vector3;
/// use compass_fusion::{
///     Fusion, FusionSettings, MagnetometerCalibration, OrientationState, RawSample,
/// };
///
/// let fusion = Fusion::new(FusionSettings::default(), MagnetometerCalibration::default())
///     .unwrap();
/// let mut state = OrientationState::new(Duration::ZERO);
///
/// let sample = RawSample::new(
///     Vector3::new(0.0, 0.0, 1.0),
///     Vector3::new(100.0, 0.0, 0.0),
///     Vector3::new(1.0, 0.0, 0.0),
/// );
/// let estimate = fusion.step(&mut state, &sample, Duration::from_millis(100)).unwrap();
///
/// // 100 LSB * 0.070 dps/LSB * 0.1 s
/// assert!((estimate.gyro_angle.x - 0.7).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Fusion {
    settings: FusionSettings,
    calibration: MagnetometerCalibration,
}

impl Fusion {
    /// # Errors
    ///
    /// Returns `FusionError::InvalidSettings` if the settings or the
    /// calibration fail validation.
    pub fn new(settings: FusionSettings, calibration: MagnetometerCalibration) -> Result<Self> {
        settings.validate()?;
        calibration.validate()?;
        Ok(Self {
            settings,
            calibration,
        })
    }

    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }

    pub fn calibration(&self) -> &MagnetometerCalibration {
        &self.calibration
    }

    /// Run one fusion iteration on `sample`, taken at clock time `now`
    ///
    /// On error `state` is left untouched, including the sample time, so the
    /// next successful step integrates over the whole gap.
    ///
    /// # Errors
    ///
    /// Returns `SensorError::InvalidReading` if the sample contains a NaN or
    /// infinite reading.
    pub fn step(
        &self,
        state: &mut OrientationState,
        sample: &RawSample,
        now: Duration,
    ) -> core::result::Result<OrientationEstimate, SensorError> {
        sample.validate()?;

        let magnetometer = self.calibration.apply(sample.magnetometer);

        let delta_time = state.advance_time(now);
        let rate = sample.gyroscope * self.settings.gyroscope_gain;
        state.integrate(rate, delta_time);

        let inverted = self.settings.inverted_mount;
        let accel_angles = tilt::accelerometer_angles(sample.accelerometer, inverted);
        let heading = compass::heading(magnetometer, inverted);
        let tilt_compensated_heading =
            compass::tilt_compensated_heading(sample.accelerometer, magnetometer, inverted);

        Ok(OrientationEstimate {
            gyro_angle: state.gyro_angle(),
            accel_angle_x: accel_angles.x,
            accel_angle_y: accel_angles.y,
            heading,
            tilt_compensated_heading,
            delta_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Heading;

    const EPSILON: f32 = 1e-4;

    fn level_sample(gyroscope: Vector3<f32>) -> RawSample {
        RawSample::new(
            Vector3::new(0.0, 0.0, 1.0),
            gyroscope,
            Vector3::new(1.0, 0.0, 0.0),
        )
    }

    fn fusion(settings: FusionSettings) -> Fusion {
        Fusion::new(settings, MagnetometerCalibration::default()).unwrap()
    }

    #[test]
    fn test_state_initialisation() {
        let state = OrientationState::new(Duration::from_secs(5));
        assert_eq!(state.gyro_angle(), Vector3::zeros());
        assert_eq!(state.last_sample_time(), Duration::from_secs(5));
    }

    #[test]
    fn test_advance_time() {
        let mut state = OrientationState::new(Duration::from_millis(100));
        let dt = state.advance_time(Duration::from_millis(130));
        assert!((dt - 0.030).abs() < 1e-6);
        assert_eq!(state.last_sample_time(), Duration::from_millis(130));
    }

    #[test]
    fn test_advance_time_clamps_stalled_clock() {
        let mut state = OrientationState::new(Duration::from_millis(100));
        assert_eq!(state.advance_time(Duration::from_millis(100)), MIN_DELTA_TIME);
    }

    #[test]
    fn test_advance_time_clamps_backwards_clock() {
        let mut state = OrientationState::new(Duration::from_millis(100));
        assert_eq!(state.advance_time(Duration::from_millis(40)), MIN_DELTA_TIME);

        // Next interval is measured from the regressed reading
        let dt = state.advance_time(Duration::from_millis(50));
        assert!((dt - 0.010).abs() < 1e-6);
    }

    #[test]
    fn test_integrate_accumulates() {
        let mut state = OrientationState::new(Duration::ZERO);
        state.integrate(Vector3::new(10.0, -20.0, 5.0), 0.5);
        state.integrate(Vector3::new(10.0, -20.0, 5.0), 0.5);
        assert!((state.gyro_angle() - Vector3::new(10.0, -20.0, 5.0)).norm() < 1e-6);
    }

    #[test]
    fn test_step_applies_gyroscope_gain() {
        let fusion = fusion(FusionSettings::default());
        let mut state = OrientationState::new(Duration::ZERO);
        let estimate = fusion
            .step(
                &mut state,
                &level_sample(Vector3::new(100.0, -50.0, 10.0)),
                Duration::from_secs(1),
            )
            .unwrap();

        // raw * 0.070 dps/LSB * 1 s
        assert!((estimate.gyro_angle - Vector3::new(7.0, -3.5, 0.7)).norm() < EPSILON);
        assert_eq!(estimate.gyro_angle, state.gyro_angle());
        assert!((estimate.delta_time - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_level_device() {
        let fusion = fusion(FusionSettings::default());
        let mut state = OrientationState::new(Duration::ZERO);
        let estimate = fusion
            .step(&mut state, &level_sample(Vector3::zeros()), Duration::from_millis(30))
            .unwrap();

        assert!(estimate.accel_angle_x.abs() < EPSILON);
        assert!(estimate.accel_angle_y.abs() < EPSILON);
        assert_eq!(estimate.heading, Heading::Degrees(0.0));
        let tilt = estimate.tilt_compensated_heading.degrees().unwrap();
        assert!(tilt < EPSILON || tilt > 360.0 - EPSILON);
    }

    #[test]
    fn test_step_subtracts_calibration() {
        let calibration = MagnetometerCalibration {
            x_min: 0.0,
            x_max: 200.0,
            y_min: -100.0,
            y_max: 300.0,
            ..Default::default()
        };
        let fusion = Fusion::new(FusionSettings::default(), calibration).unwrap();
        let mut state = OrientationState::new(Duration::ZERO);

        // Offset (100, 100, 0): raw (100, 200) centres to (0, 100), due 90°
        let sample = RawSample::new(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::zeros(),
            Vector3::new(100.0, 200.0, 0.0),
        );
        let estimate = fusion.step(&mut state, &sample, Duration::from_millis(30)).unwrap();
        assert!((estimate.heading.degrees().unwrap() - 90.0).abs() < EPSILON);
    }

    #[test]
    fn test_step_rejects_non_finite_sample_without_state_change() {
        let fusion = fusion(FusionSettings::default());
        let mut state = OrientationState::new(Duration::ZERO);
        fusion
            .step(
                &mut state,
                &level_sample(Vector3::new(10.0, 0.0, 0.0)),
                Duration::from_secs(1),
            )
            .unwrap();
        let before = state;

        let mut bad = level_sample(Vector3::zeros());
        bad.accelerometer.z = f32::INFINITY;
        assert!(fusion.step(&mut state, &bad, Duration::from_secs(2)).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_step_zero_interval_stays_finite() {
        let fusion = fusion(FusionSettings::default());
        let mut state = OrientationState::new(Duration::ZERO);
        let sample = level_sample(Vector3::new(1000.0, 1000.0, 1000.0));
        let first = fusion.step(&mut state, &sample, Duration::ZERO).unwrap();
        let second = fusion.step(&mut state, &sample, Duration::ZERO).unwrap();

        assert_eq!(first.delta_time, MIN_DELTA_TIME);
        assert!(second.gyro_angle.iter().all(|angle| angle.is_finite()));
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = FusionSettings {
            gyroscope_gain: -1.0,
            ..Default::default()
        };
        assert!(Fusion::new(settings, MagnetometerCalibration::default()).is_err());

        let calibration = MagnetometerCalibration {
            x_min: 5.0,
            x_max: -5.0,
            ..Default::default()
        };
        assert!(Fusion::new(FusionSettings::default(), calibration).is_err());
    }
}
