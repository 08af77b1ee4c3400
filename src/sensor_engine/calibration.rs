//! Calibration pass. Averages a burst of raw
//! samples per channel to derive each sensor's `reference_value` before
//! the engine is allowed into `READY`. Run from the engine's own
//! thread, blocking; this is a startup step, not a steady-state one.

use std::time::Duration;

use crate::error::HardwareError;
use crate::hardware::SensorInput;

const CALIBRATION_SAMPLES: usize = 20;
const CALIBRATION_INTERVAL: Duration = Duration::from_millis(20);

/// Averages `CALIBRATION_SAMPLES` raw readings off `channel`. Calibrating
/// twice without a hardware change yields equal values within tolerance,
/// which a plain arithmetic mean over a fixed sample count satisfies.
pub fn calibrate_channel(input: &mut dyn SensorInput, channel: i32) -> Result<f64, HardwareError> {
    let mut sum = 0.0;
    for _ in 0..CALIBRATION_SAMPLES {
        sum += input.read(channel)?;
        std::thread::sleep(CALIBRATION_INTERVAL);
    }
    Ok(sum / CALIBRATION_SAMPLES as f64)
}

/// Two calibration passes against the same unchanging input agree
/// within `tolerance`.
pub fn is_stable(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::sensor_input::SimulatedSensorInput;

    #[test]
    fn calibration_is_idempotent_on_a_steady_input() {
        let mut input = SimulatedSensorInput::new(1);
        input.set_level(0, 0.42);
        let first = calibrate_channel(&mut input, 0).unwrap();
        let second = calibrate_channel(&mut input, 0).unwrap();
        assert!(is_stable(first, second, 1e-9));
    }
}
