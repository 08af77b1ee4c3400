//! Keypad handler: drives one enabled keypad (DSC, Wiegand or
//! mock) and turns raw frames into bus commands.

pub mod decode;
pub mod handler;

pub use decode::{decode, KeypadEvent};
pub use handler::KeypadHandler;
