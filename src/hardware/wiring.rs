//! Wiring-strategy voltage constants.
//!
//! A sensor's physical wiring (how many end-of-line resistors, and
//! whether its contact is normally-closed or normally-open) determines
//! which raw ADC reading counts as "default" (quiescent) and which
//! counts as "active" (triggered). These are plain resistor-divider
//! ratios against a fixed pull-up, reproduced from first principles
//! rather than measured; the same constants hold for any V2 board
//! regardless of installation.

use crate::model::{ChannelType, ContactType, EolCount};

/// Resistor values in ohms for one sensor's end-of-line network.
#[derive(Debug, Clone, Copy)]
pub struct EolResistors {
    pub pull_up: f64,
    pub r_a: f64,
    pub r_b: f64,
}

impl Default for EolResistors {
    fn default() -> Self {
        // Standard 2.2k EOL / 1k pull-up pairing used across the board's
        // input headers.
        EolResistors {
            pull_up: 1_000.0,
            r_a: 2_200.0,
            r_b: 2_200.0,
        }
    }
}

/// The voltage-ratio levels a sensor's channel can legitimately read,
/// expressed as a fraction of the supply rail (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WiringLevels {
    pub default_level: f64,
    pub active_level: f64,
    /// Second active level, only meaningful for `CHANNEL_A`/`CHANNEL_B`
    /// dual-sensor wiring where each channel has its own active ratio.
    pub secondary_active_level: Option<f64>,
}

/// Derives the expected default/active voltage ratios for a sensor's
/// wiring strategy (`eol_count`, `contact_type`, `channel_type`).
pub fn levels_for(
    eol_count: EolCount,
    contact_type: ContactType,
    channel_type: ChannelType,
    eol: EolResistors) -> WiringLevels {
    let EolResistors { pull_up, r_a, r_b } = eol;

    match (eol_count, channel_type) {
        (EolCount::Single, _) => {
            let default_level = r_a / (r_a + pull_up);
            let active_level = match contact_type {
                ContactType::Nc => 1.0,
                ContactType::No => 0.0,
            };
            WiringLevels {
                default_level,
                active_level,
                secondary_active_level: None,
            }
        }
        (EolCount::Double, ChannelType::ChannelA | ChannelType::ChannelB) => {
            // Dual-sensor wiring: two independent contacts share one
            // channel pair through a parallel EOL network.
            let r_ab = 1.0 / (1.0 / r_a + 1.0 / r_b);
            let default_level = r_ab / (r_ab + pull_up);
            let channel_a_active = r_b / (r_b + pull_up);
            let channel_b_active = r_a / (r_a + pull_up);
            let (active_level, secondary_active_level) = match contact_type {
                ContactType::Nc => (channel_a_active, Some(channel_b_active)),
                ContactType::No => (1.0 - channel_a_active, Some(1.0 - channel_b_active)),
            };
            WiringLevels {
                default_level,
                active_level,
                secondary_active_level,
            }
        }
        // `Basic` channels still get well-formed table levels here so
        // calibration/tests have something sane to compare against, but
        // the sensor engine never consults them for `BASIC`: that channel
        // type alerts off its own calibrated reference value instead.
        (EolCount::Double, ChannelType::Basic | ChannelType::Normal) => {
            let default_level = r_a / (r_a + pull_up);
            let active_level = (r_a + r_b) / (r_a + r_b + pull_up);
            let (default_level, active_level) = match contact_type {
                ContactType::Nc => (default_level, active_level),
                ContactType::No => (active_level, default_level),
            };
            WiringLevels {
                default_level,
                active_level,
                secondary_active_level: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_eol_nc_triggers_open_circuit() {
        let levels = levels_for(
            EolCount::Single,
            ContactType::Nc,
            ChannelType::Normal,
            EolResistors::default(),
        );
        assert!((levels.default_level - (2_200.0 / 3_200.0)).abs() < 1e-9);
        assert_eq!(levels.active_level, 1.0);
    }

    #[test]
    fn dual_sensor_nc_has_two_active_levels() {
        let levels = levels_for(
            EolCount::Double,
            ContactType::Nc,
            ChannelType::ChannelA,
            EolResistors::default(),
        );
        assert!(levels.secondary_active_level.is_some());
        assert!(levels.default_level < levels.active_level.max(levels.secondary_active_level.unwrap()) + 1.0);
    }

    #[test]
    fn double_eol_no_swaps_default_and_active() {
        let nc = levels_for(
            EolCount::Double,
            ContactType::Nc,
            ChannelType::Basic,
            EolResistors::default(),
        );
        let no = levels_for(
            EolCount::Double,
            ContactType::No,
            ChannelType::Basic,
            EolResistors::default(),
        );
        assert_eq!(nc.default_level, no.active_level);
        assert_eq!(nc.active_level, no.default_level);
    }
}
