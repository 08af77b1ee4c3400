//! Hardware abstraction. Talks to the physical board (or the
//! simulator, when `Config::use_simulator` is set) behind one trait per
//! concern so the rest of the crate never branches on board version.

pub mod board;
pub mod keypad_reader;
pub mod output_driver;
pub mod power_detect;
pub mod sensor_input;
pub mod wiring;

pub use board::BoardVersion;
pub use keypad_reader::{KeypadReader, RawFrame};
pub use output_driver::OutputDriver;
pub use power_detect::PowerDetect;
pub use sensor_input::SensorInput;
