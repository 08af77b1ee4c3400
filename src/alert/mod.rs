//! Alert controller: funnels per-sensor qualifying triggers into at
//! most one open Alert.

pub mod controller;

pub use controller::{AlertController, AlertType};
