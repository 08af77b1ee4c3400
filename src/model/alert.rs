//! Alert / AlertSensor entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    /// Null while the alert is active.
    pub end_time: Option<DateTime<Utc>>,
    /// True if every contributing sensor is silent; derived, not stored
    /// independently of its `AlertSensor` rows.
    pub silent: bool,
    pub arm_id: Option<i64>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

/// What qualified a sensor's contribution to an alert: whether it
/// exceeded its monitor period/threshold window, or fired instantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suppression {
    Period,
    Threshold,
    Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSensor {
    pub alert_id: i64,
    pub sensor_id: i64,
    pub channel: i32,
    pub name: String,
    pub type_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    /// Closes when the sensor itself clears, not when the Alert closes.
    /// Any row still open when the Alert closes
    /// is sealed with the Alert's own `end_time`.
    pub end_time: Option<DateTime<Utc>>,
    pub delay: u64,
    pub silent: bool,
    pub suppression: Suppression,
}
