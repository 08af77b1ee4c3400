//! Monitoring core of a home-security alarm controller :
//! sensor sampling, arm/disarm state machine, alert pipeline, keypad,
//! output-sign engine, area data model, and the notification retry
//! engine. Split into a library so integration tests under `tests/`
//! can exercise subsystems directly; `main.rs` just wires them up.

pub mod alert;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hardware;
pub mod ipc;
pub mod keypad;
pub mod model;
pub mod mqtt;
pub mod notifier;
pub mod output_signs;
pub mod persistence;
pub mod secret;
pub mod sensor_engine;
pub mod siren;
pub mod state_machine;
pub mod state_store;
pub mod supervisor;
