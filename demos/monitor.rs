//! Threaded fusion loop demonstration
//!
//! Runs the fusion loop on its own thread over a simulated IMU that slowly
//! rocks and turns, then polls the shared snapshot from the main thread and
//! blends the published angles with a complementary filter.
//!
//! Run with: `RUST_LOG=debug cargo run --example monitor`

use compass_fusion::{
    Axis, ComplementaryFilter, FusionLoop, FusionSettings, Heading, MagnetometerCalibration,
    MonotonicClock, SensorError, SensorSource,
};
use core::time::Duration;
use log::info;
use std::error::Error;
use std::f32::consts::PI;
use std::thread;
use std::time::Instant;

/// Simulated 9-DOF board producing raw LSB readings
///
/// Every 50th sample fails with a bus error to show fault handling.
struct SimulatedImu {
    start: Instant,
    reads: u32,
    time: f32,
}

impl SimulatedImu {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            reads: 0,
            time: 0.0,
        }
    }

    fn tilt(&self) -> (f32, f32) {
        let roll = 0.3 * (self.time * 0.5 * 2.0 * PI).sin();
        let pitch = 0.2 * (self.time * 0.3 * 2.0 * PI).cos();
        (roll, pitch)
    }

    fn yaw(&self) -> f32 {
        (self.time * 20.0).to_radians()
    }
}

impl SensorSource for SimulatedImu {
    fn initialise(&mut self) -> Result<(), SensorError> {
        info!("Simulated IMU ready");
        Ok(())
    }

    fn read_accelerometer_x(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        self.time = self.start.elapsed().as_secs_f32();
        if self.reads % 50 == 0 {
            return Err(SensorError::Io {
                axis: Axis::AccelerometerX,
                message: "simulated bus error".into(),
            });
        }
        let (_, pitch) = self.tilt();
        Ok(16_384.0 * -pitch.sin())
    }
    fn read_accelerometer_y(&mut self) -> Result<f32, SensorError> {
        let (roll, pitch) = self.tilt();
        Ok(16_384.0 * roll.sin() * pitch.cos())
    }
    fn read_accelerometer_z(&mut self) -> Result<f32, SensorError> {
        let (roll, pitch) = self.tilt();
        Ok(16_384.0 * roll.cos() * pitch.cos())
    }
    fn read_gyroscope_x(&mut self) -> Result<f32, SensorError> {
        Ok(0.0)
    }
    fn read_gyroscope_y(&mut self) -> Result<f32, SensorError> {
        Ok(0.0)
    }
    fn read_gyroscope_z(&mut self) -> Result<f32, SensorError> {
        // 20 dps at 0.070 dps/LSB
        Ok(20.0 / 0.070)
    }
    fn read_magnetometer_x(&mut self) -> Result<f32, SensorError> {
        Ok(1200.0 * self.yaw().cos() - 394.5)
    }
    fn read_magnetometer_y(&mut self) -> Result<f32, SensorError> {
        Ok(1200.0 * self.yaw().sin() + 313.0)
    }
    fn read_magnetometer_z(&mut self) -> Result<f32, SensorError> {
        Ok(-600.0 - 584.0)
    }
}

fn format_heading(heading: Heading) -> String {
    match heading {
        Heading::Degrees(degrees) => format!("{:6.1}", degrees),
        Heading::Indeterminate => "   ---".to_string(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = FusionSettings::default();
    let calibration = MagnetometerCalibration {
        x_min: -1748.0,
        x_max: 959.0,
        y_min: -1025.0,
        y_max: 1651.0,
        z_min: -1876.0,
        z_max: 708.0,
    };
    info!(
        "Hard-iron offset {:?}, loop period {:?}",
        calibration.hard_iron_offset(),
        settings.loop_period
    );

    let fusion_loop = FusionLoop::new(
        SimulatedImu::new(),
        MonotonicClock::new(),
        settings,
        calibration,
    )?;
    let handle = fusion_loop.spawn()?;
    let shared = handle.shared();
    let mut filter = ComplementaryFilter::new(settings.filter_blend);

    println!("  iter   gyroZ   accX   accY  blendX  blendY  heading  tilt-comp");
    for _ in 0..20 {
        thread::sleep(Duration::from_millis(250));

        let snapshot = shared.snapshot();
        let Some(estimate) = snapshot.estimate else {
            continue;
        };
        let blended = filter.update(&estimate);

        println!(
            "{:6} {:7.1} {:6.1} {:6.1} {:7.1} {:7.1}  {}     {}",
            snapshot.completed_iterations,
            estimate.gyro_angle.z,
            estimate.accel_angle_x,
            estimate.accel_angle_y,
            blended.x,
            blended.y,
            format_heading(estimate.heading),
            format_heading(estimate.tilt_compensated_heading)
        );
    }

    let snapshot = handle.stop()?;
    info!(
        "Stopped after {} iterations ({} skipped)",
        snapshot.completed_iterations, snapshot.skipped_iterations
    );

    Ok(())
}
