use compass_fusion::{Fusion, FusionSettings, MagnetometerCalibration, OrientationState, RawSample};
use core::time::Duration;
use nalgebra::Vector3;

const SAMPLE_PERIOD: Duration = Duration::from_millis(30); // 30 ms loop period

fn main() -> Result<(), compass_fusion::FusionError> {
    let fusion = Fusion::new(FusionSettings::default(), MagnetometerCalibration::default())?;
    let mut state = OrientationState::new(Duration::ZERO);
    let mut now = Duration::ZERO;

    for _ in 0..10 {
        // this loop should repeat each time a new sample is available
        let accelerometer = Vector3::new(0.0, 0.0, 16_384.0); // replace with raw accelerometer LSB
        let gyroscope = Vector3::new(0.0, 0.0, 50.0); // replace with raw gyroscope LSB
        let magnetometer = Vector3::new(400.0, 300.0, -900.0); // replace with raw magnetometer LSB

        now += SAMPLE_PERIOD;
        let sample = RawSample::new(accelerometer, gyroscope, magnetometer);
        let estimate = fusion.step(&mut state, &sample, now)?;

        println!(
            "GyroZ: {:.2}, AccX: {:.2}, AccY: {:.2}, Heading: {:?}, Tilt heading: {:?}",
            estimate.gyro_angle.z,
            estimate.accel_angle_x,
            estimate.accel_angle_y,
            estimate.heading,
            estimate.tilt_compensated_heading
        );
    }

    Ok(())
}
