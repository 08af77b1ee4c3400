//! Sensor engine: samples every input at the configured rate,
//! maintains a sliding boolean window per sensor, and publishes
//! alert/error flags.

pub mod calibration;
pub mod engine;
pub mod window;

pub use engine::SensorEngine;
pub use window::SlidingWindow;
