//! Uniform sensor-input interface, implemented once per board
//! variant plus a simulator used when `Config::use_simulator` is set.

use crate::error::HardwareError;

/// Reads raw voltage-ratio samples off the board's input channels.
/// `V2` returns an analog ratio read off its ADC; `V3` returns 0.0/1.0
/// off plain GPIO. Either way the caller compares against
/// `hardware::wiring::WiringLevels` rather than branching on variant.
pub trait SensorInput: Send {
    /// Raw sample in [0.0, 1.0] for the given channel.
    fn read(&mut self, channel: i32) -> Result<f64, HardwareError>;

    fn channel_count(&self) -> usize;
}

pub struct SimulatedSensorInput {
    channel_count: usize,
    levels: Vec<f64>,
}

impl SimulatedSensorInput {
    pub fn new(channel_count: usize) -> Self {
        SimulatedSensorInput {
            channel_count,
            levels: vec![0.0; channel_count],
        }
    }

    /// Test/simulator hook: force a channel's next reads to a fixed level.
    pub fn set_level(&mut self, channel: i32, level: f64) {
        if let Some(slot) = self.levels.get_mut(channel as usize) {
            *slot = level;
        }
    }
}

impl SensorInput for SimulatedSensorInput {
    fn read(&mut self, channel: i32) -> Result<f64, HardwareError> {
        self.levels
            .get(channel as usize)
            .copied()
            .ok_or(HardwareError::ChannelOutOfRange(channel))
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }
}
