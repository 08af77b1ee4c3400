//! Board-variant selection: a sealed set of variant tags chosen once at
//! start via a board-version config value.

/// Which physical controller board this process is driving.
///
/// `V3` reads sensors through a resistive-divider ADC wired against an
/// end-of-line resistor table and can distinguish a shortcut/open-circuit
/// from a legitimate active level; `V2` only ever compares against a
/// sensor's own calibrated reference and never reports a wiring error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardVersion {
    V2,
    V3,
}

impl BoardVersion {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            2 => Some(BoardVersion::V2),
            3 => Some(BoardVersion::V3),
            _ => None,
        }
    }

    /// Whether this board can distinguish shortcut/open-circuit from a
    /// legitimate active level: only board variants with EOL resistors
    /// can report a wiring error.
    pub fn supports_eol_error_detection(self) -> bool {
        matches!(self, BoardVersion::V3)
    }

    /// Whether non-deleted sensors must have distinct channels. V3's
    /// digital GPIO has no analog headroom for CHANNEL_A/CHANNEL_B
    /// sharing a line, so this only binds on V2.
    pub fn enforces_unique_channels(self) -> bool {
        matches!(self, BoardVersion::V2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_accepts_only_known_versions() {
        assert_eq!(BoardVersion::from_u8(2), Some(BoardVersion::V2));
        assert_eq!(BoardVersion::from_u8(3), Some(BoardVersion::V3));
        assert_eq!(BoardVersion::from_u8(4), None);
    }
}
