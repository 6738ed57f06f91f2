//! Sensor source and clock interfaces consumed by the fusion loop
//!
//! The hardware layer (bus access, device detection, register scaling) lives
//! behind [`SensorSource`]. The loop only needs nine signed axis readings and a
//! monotonic timestamp from a [`Clock`].

use core::fmt;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use nalgebra::Vector3;

use crate::error::SensorError;

/// One of the nine axes read from the IMU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    AccelerometerX,
    AccelerometerY,
    AccelerometerZ,
    GyroscopeX,
    GyroscopeY,
    GyroscopeZ,
    MagnetometerX,
    MagnetometerY,
    MagnetometerZ,
}

impl Axis {
    /// All axes, in the order they are read each iteration
    pub const ALL: [Axis; 9] = [
        Axis::AccelerometerX,
        Axis::AccelerometerY,
        Axis::AccelerometerZ,
        Axis::GyroscopeX,
        Axis::GyroscopeY,
        Axis::GyroscopeZ,
        Axis::MagnetometerX,
        Axis::MagnetometerY,
        Axis::MagnetometerZ,
    ];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::AccelerometerX => "accelerometer X",
            Axis::AccelerometerY => "accelerometer Y",
            Axis::AccelerometerZ => "accelerometer Z",
            Axis::GyroscopeX => "gyroscope X",
            Axis::GyroscopeY => "gyroscope Y",
            Axis::GyroscopeZ => "gyroscope Z",
            Axis::MagnetometerX => "magnetometer X",
            Axis::MagnetometerY => "magnetometer Y",
            Axis::MagnetometerZ => "magnetometer Z",
        };
        f.write_str(name)
    }
}

/// Raw readings for all three sensors, in sensor units (LSB)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub accelerometer: Vector3<f32>,
    pub gyroscope: Vector3<f32>,
    pub magnetometer: Vector3<f32>,
}

impl RawSample {
    pub fn new(
        accelerometer: Vector3<f32>,
        gyroscope: Vector3<f32>,
        magnetometer: Vector3<f32>,
    ) -> Self {
        Self {
            accelerometer,
            gyroscope,
            magnetometer,
        }
    }

    /// Reading for a single axis
    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::AccelerometerX => self.accelerometer.x,
            Axis::AccelerometerY => self.accelerometer.y,
            Axis::AccelerometerZ => self.accelerometer.z,
            Axis::GyroscopeX => self.gyroscope.x,
            Axis::GyroscopeY => self.gyroscope.y,
            Axis::GyroscopeZ => self.gyroscope.z,
            Axis::MagnetometerX => self.magnetometer.x,
            Axis::MagnetometerY => self.magnetometer.y,
            Axis::MagnetometerZ => self.magnetometer.z,
        }
    }

    /// Reject samples carrying NaN or infinite readings
    ///
    /// # Errors
    ///
    /// Returns `SensorError::InvalidReading` naming the first non-finite axis.
    pub fn validate(&self) -> Result<(), SensorError> {
        match Axis::ALL.into_iter().find(|&axis| !self.axis(axis).is_finite()) {
            Some(axis) => Err(SensorError::InvalidReading { axis }),
            None => Ok(()),
        }
    }
}

/// Source of raw IMU readings
///
/// Implementations wrap the actual device. Each read returns the signed raw
/// value for one axis, either an integer register value cast to `f32` or an
/// already-scaled float.
///
/// # Safety Invariants
///
/// - `initialise` is called once before the first read
/// - Only the fusion loop reads from the source once it is running
pub trait SensorSource {
    /// One-time device setup performed before the loop starts
    ///
    /// # Errors
    ///
    /// Returns `SensorError` if the device could not be brought up.
    fn initialise(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn read_accelerometer_x(&mut self) -> Result<f32, SensorError>;
    fn read_accelerometer_y(&mut self) -> Result<f32, SensorError>;
    fn read_accelerometer_z(&mut self) -> Result<f32, SensorError>;
    fn read_gyroscope_x(&mut self) -> Result<f32, SensorError>;
    fn read_gyroscope_y(&mut self) -> Result<f32, SensorError>;
    fn read_gyroscope_z(&mut self) -> Result<f32, SensorError>;
    fn read_magnetometer_x(&mut self) -> Result<f32, SensorError>;
    fn read_magnetometer_y(&mut self) -> Result<f32, SensorError>;
    fn read_magnetometer_z(&mut self) -> Result<f32, SensorError>;

    /// Read all nine axes
    ///
    /// Stops at the first failing read. The returned sample has already
    /// passed [`RawSample::validate`].
    ///
    /// # Errors
    ///
    /// Returns the first `SensorError` raised by an axis read, or
    /// `SensorError::InvalidReading` if a value is not finite.
    fn read_sample(&mut self) -> Result<RawSample, SensorError> {
        let accelerometer = Vector3::new(
            self.read_accelerometer_x()?,
            self.read_accelerometer_y()?,
            self.read_accelerometer_z()?,
        );
        let gyroscope = Vector3::new(
            self.read_gyroscope_x()?,
            self.read_gyroscope_y()?,
            self.read_gyroscope_z()?,
        );
        let magnetometer = Vector3::new(
            self.read_magnetometer_x()?,
            self.read_magnetometer_y()?,
            self.read_magnetometer_z()?,
        );

        let sample = RawSample::new(accelerometer, gyroscope, magnetometer);
        sample.validate()?;
        Ok(sample)
    }
}

/// Monotonic time source
///
/// `now` returns the time elapsed since an arbitrary, fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock implementation backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock
///
/// Clones share the same time, so a test can keep one handle while the loop
/// owns another. `set` may move time backwards to simulate a clock glitch.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: Duration) {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        // fetch_update never fails with a closure returning Some
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |nanos| {
                Some(nanos.saturating_add(delta))
            });
    }

    /// Jump to an absolute time
    pub fn set(&self, now: Duration) {
        let nanos = u64::try_from(now.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
