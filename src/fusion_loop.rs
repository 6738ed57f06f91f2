//! Continuously running fusion loop
//!
//! A single producer thread samples the IMU, runs one [`Fusion`] step and
//! publishes the result. The orientation state and the latest estimate sit
//! behind one mutex and are replaced together, so any reader sees a complete
//! snapshot: never a new heading next to an old gyro angle.
//!
//! # Example
//! ```
//! use core::time::Duration;
//! use compass_fusion::{
//!     FusionLoop, FusionSettings, MagnetometerCalibration, ManualClock, SensorError, SensorSource,
//! };
//!
//! struct LevelImu;
//!
//! impl SensorSource for LevelImu {
//!     fn read_accelerometer_x(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_accelerometer_y(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_accelerometer_z(&mut self) -> Result<f32, SensorError> { Ok(1.0) }
//!     fn read_gyroscope_x(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_gyroscope_y(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_gyroscope_z(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_magnetometer_x(&mut self) -> Result<f32, SensorError> { Ok(1.0) }
//!     fn read_magnetometer_y(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//!     fn read_magnetometer_z(&mut self) -> Result<f32, SensorError> { Ok(0.0) }
//! }
//!
//! let clock = ManualClock::new();
//! let mut fusion_loop = FusionLoop::new(
//!     LevelImu,
//!     clock.clone(),
//!     FusionSettings::default(),
//!     MagnetometerCalibration::default(),
//! )
//! .unwrap();
//!
//! clock.advance(Duration::from_millis(30));
//! fusion_loop.run_once();
//!
//! let estimate = fusion_loop.shared().latest_estimate().unwrap();
//! assert_eq!(estimate.heading.degrees(), Some(0.0));
//! ```

use core::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};

use crate::calibration::MagnetometerCalibration;
use crate::error::{FusionError, Result, SensorError};
use crate::fusion::{Fusion, OrientationState};
use crate::sensor::{Clock, SensorSource};
use crate::types::{FusionSettings, OrientationEstimate};

/// Consistent view of the loop's shared state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSnapshot {
    pub state: OrientationState,
    /// Estimate from the last successful iteration, `None` before the first
    pub estimate: Option<OrientationEstimate>,
    pub completed_iterations: u64,
    /// Iterations dropped because of a sensor fault
    pub skipped_iterations: u64,
}

impl OrientationSnapshot {
    fn new(state: OrientationState) -> Self {
        Self {
            state,
            estimate: None,
            completed_iterations: 0,
            skipped_iterations: 0,
        }
    }
}

/// Read handle on the loop's published orientation
///
/// Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct SharedOrientation {
    inner: Arc<Mutex<OrientationSnapshot>>,
}

impl SharedOrientation {
    fn new(state: OrientationState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OrientationSnapshot::new(state))),
        }
    }

    // The loop computes the new state before touching the guard and then
    // only assigns fields, so a poisoned lock still guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, OrientationSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> OrientationSnapshot {
        *self.lock()
    }

    pub fn latest_estimate(&self) -> Option<OrientationEstimate> {
        self.lock().estimate
    }
}

/// Cooperative stop signal for a running loop
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at the next iteration boundary
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Result of a single loop iteration
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// State advanced and a new estimate was published
    Updated(OrientationEstimate),
    /// The sensor failed; the previous state and estimate were kept
    Skipped(SensorError),
}

/// The fusion loop
///
/// Owns the sensor and the clock. [`run_once`](Self::run_once) performs a
/// single iteration for deterministic drives; [`run`](Self::run) repeats it
/// at the configured pace until stopped; [`spawn`](Self::spawn) does the
/// same on a dedicated thread.
pub struct FusionLoop<S, C> {
    sensor: S,
    clock: C,
    fusion: Fusion,
    loop_period: Duration,
    shared: SharedOrientation,
    stop: StopHandle,
}

impl<S, C> FusionLoop<S, C>
where
    S: SensorSource,
    C: Clock,
{
    /// Validate the configuration, initialise the sensor and zero the state
    ///
    /// The state's sample time starts at the clock's current reading.
    ///
    /// # Errors
    ///
    /// Returns `FusionError::InvalidSettings` for bad settings or calibration,
    /// and `FusionError::Sensor` if the sensor fails to initialise.
    pub fn new(
        mut sensor: S,
        clock: C,
        settings: FusionSettings,
        calibration: MagnetometerCalibration,
    ) -> Result<Self> {
        let fusion = Fusion::new(settings, calibration)?;
        sensor.initialise()?;
        debug!("Sensor initialised");

        let state = OrientationState::new(clock.now());
        Ok(Self {
            sensor,
            clock,
            fusion,
            loop_period: settings.loop_period,
            shared: SharedOrientation::new(state),
            stop: StopHandle::new(),
        })
    }

    pub fn shared(&self) -> SharedOrientation {
        self.shared.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one iteration
    ///
    /// Holds the state lock from the sensor read until the new estimate is
    /// published. A sensor fault leaves the snapshot untouched apart from the
    /// skipped-iteration count.
    pub fn run_once(&mut self) -> IterationOutcome {
        let mut shared = self.shared.lock();

        let sample = match self.sensor.read_sample() {
            Ok(sample) => sample,
            Err(err) => {
                warn!("Skipping iteration: {}", err);
                shared.skipped_iterations += 1;
                return IterationOutcome::Skipped(err);
            }
        };

        let now = self.clock.now();
        let mut state = shared.state;
        let estimate = match self.fusion.step(&mut state, &sample, now) {
            Ok(estimate) => estimate,
            Err(err) => {
                warn!("Skipping iteration: {}", err);
                shared.skipped_iterations += 1;
                return IterationOutcome::Skipped(err);
            }
        };

        shared.state = state;
        shared.estimate = Some(estimate);
        shared.completed_iterations += 1;
        drop(shared);

        if estimate.tilt_compensated_heading.is_indeterminate() {
            debug!("Tilt-compensated heading indeterminate");
        }
        trace!(
            "gyro ({:.2}, {:.2}, {:.2}) accel ({:.2}, {:.2}) heading {:?} tilt {:?} dt {:.4}",
            estimate.gyro_angle.x,
            estimate.gyro_angle.y,
            estimate.gyro_angle.z,
            estimate.accel_angle_x,
            estimate.accel_angle_y,
            estimate.heading,
            estimate.tilt_compensated_heading,
            estimate.delta_time,
        );

        IterationOutcome::Updated(estimate)
    }

    /// Run iterations until the stop handle fires
    ///
    /// The stop flag is checked at each iteration boundary, before the lock is
    /// taken again. Sensor faults never end the loop.
    pub fn run(&mut self) {
        debug!("Fusion loop started");
        while !self.stop.is_stopped() {
            self.run_once();
            if !self.loop_period.is_zero() {
                thread::sleep(self.loop_period);
            }
        }
        debug!("Fusion loop stopped");
    }
}

impl<S, C> FusionLoop<S, C>
where
    S: SensorSource + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Move the loop onto its own thread
    ///
    /// # Errors
    ///
    /// Returns `FusionError::Io` if the thread could not be created.
    pub fn spawn(mut self) -> Result<FusionLoopHandle> {
        let shared = self.shared();
        let stop = self.stop_handle();
        let thread = thread::Builder::new()
            .name("fusion-loop".into())
            .spawn(move || self.run())?;

        Ok(FusionLoopHandle {
            shared,
            stop,
            thread,
        })
    }
}

/// Handle to a loop running on its own thread
#[derive(Debug)]
pub struct FusionLoopHandle {
    shared: SharedOrientation,
    stop: StopHandle,
    thread: JoinHandle<()>,
}

impl FusionLoopHandle {
    pub fn shared(&self) -> SharedOrientation {
        self.shared.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Signal the loop to stop and wait for the thread to exit
    ///
    /// # Errors
    ///
    /// Returns `FusionError::ThreadPanicked` if the loop thread panicked.
    pub fn stop(self) -> Result<OrientationSnapshot> {
        self.stop.stop();
        self.thread
            .join()
            .map_err(|_| FusionError::ThreadPanicked)?;
        Ok(self.shared.snapshot())
    }
}
