//! Uniform power-detect interface: whether mains power is
//! present, feeding the `POWER` key in `state_store`.

use crate::error::HardwareError;

pub trait PowerDetect: Send {
    fn mains_present(&mut self) -> Result<bool, HardwareError>;
}

pub struct SimulatedPowerDetect {
    present: bool,
}

impl SimulatedPowerDetect {
    pub fn new() -> Self {
        SimulatedPowerDetect { present: true }
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }
}

impl Default for SimulatedPowerDetect {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerDetect for SimulatedPowerDetect {
    fn mains_present(&mut self) -> Result<bool, HardwareError> {
        Ok(self.present)
    }
}
