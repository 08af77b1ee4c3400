//! Uniform output-driver interface: high-side switches for
//! siren, status LEDs and auxiliary relays.

use crate::error::HardwareError;

pub trait OutputDriver: Send {
    fn set(&mut self, channel: i32, on: bool) -> Result<(), HardwareError>;
    fn get(&self, channel: i32) -> Result<bool, HardwareError>;
    fn channel_count(&self) -> usize;
}

pub struct SimulatedOutputDriver {
    state: Vec<bool>,
}

impl SimulatedOutputDriver {
    pub fn new(channel_count: usize) -> Self {
        SimulatedOutputDriver {
            state: vec![false; channel_count],
        }
    }
}

impl OutputDriver for SimulatedOutputDriver {
    fn set(&mut self, channel: i32, on: bool) -> Result<(), HardwareError> {
        let slot = self
            .state
            .get_mut(channel as usize)
            .ok_or(HardwareError::ChannelOutOfRange(channel))?;
        *slot = on;
        Ok(())
    }

    fn get(&self, channel: i32) -> Result<bool, HardwareError> {
        self.state
            .get(channel as usize)
            .copied()
            .ok_or(HardwareError::ChannelOutOfRange(channel))
    }

    fn channel_count(&self) -> usize {
        self.state.len()
    }
}
