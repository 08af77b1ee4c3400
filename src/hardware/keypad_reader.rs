//! Uniform keypad-reader interface. Each variant (DSC, Wiegand,
//! Mock) exposes raw frames; `keypad::decode` turns them into
//! `KeypadEvent`s so the rest of the crate never branches on reader type.

use crate::error::HardwareError;

/// A raw frame read off the keypad bus, before decoding.
#[derive(Debug, Clone)]
pub enum RawFrame {
    /// One key was pressed on a DSC-style matrix keypad.
    DscKey(char),
    /// A 26 or 34-bit Wiegand frame, LSB-first as clocked off the bus.
    WiegandBits(Vec<bool>),
    /// A card number read by a mock/dev keypad, already decimal.
    MockCard(String),
    /// A key pressed on a mock/dev keypad.
    MockKey(char),
}

pub trait KeypadReader: Send {
    /// Polls for one frame; returns `Ok(None)` if nothing is pending.
    /// Never blocks longer than the reader's own debounce window.
    fn poll(&mut self) -> Result<Option<RawFrame>, HardwareError>;

    /// Drives any output feedback (beeper, LED) the reader owns.
    fn set_armed_indicator(&mut self, armed: bool) -> Result<(), HardwareError>;
}

pub struct MockKeypadReader {
    pending: std::collections::VecDeque<RawFrame>,
}

impl MockKeypadReader {
    pub fn new() -> Self {
        MockKeypadReader {
            pending: std::collections::VecDeque::new(),
        }
    }

    /// Test hook: queue a frame as if it had just arrived on the bus.
    pub fn push(&mut self, frame: RawFrame) {
        self.pending.push_back(frame);
    }
}

impl Default for MockKeypadReader {
    fn default() -> Self {
        Self::new()
    }
}

impl KeypadReader for MockKeypadReader {
    fn poll(&mut self) -> Result<Option<RawFrame>, HardwareError> {
        Ok(self.pending.pop_front())
    }

    fn set_armed_indicator(&mut self, _armed: bool) -> Result<(), HardwareError> {
        Ok(())
    }
}
