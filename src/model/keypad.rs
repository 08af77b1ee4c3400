//! Keypad entity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeypadType {
    Dsc,
    Wiegand,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypad {
    pub id: i64,
    pub enabled: bool,
    pub keypad_type: KeypadType,
    pub deleted: bool,
}
