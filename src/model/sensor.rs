//! Sensor entity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    Basic,
    Normal,
    ChannelA,
    ChannelB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactType {
    Nc,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EolCount {
    Single,
    Double,
}

/// Tri-state override for whether a triggered sensor raises a silent
/// alert; `None` defers to the area/system default.
pub type SilentOverride = Option<bool>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    pub id: i64,
    /// -1 means "unassigned".
    pub channel: i32,
    pub channel_type: ChannelType,
    pub contact_type: ContactType,
    pub eol_count: EolCount,
    /// Calibrated quiescent reading; unset sensors are not armable.
    pub reference_value: Option<f64>,
    pub alert: bool,
    pub error: bool,
    pub enabled: bool,
    pub silent_alert: SilentOverride,
    pub monitor_period: Option<u64>,
    pub monitor_threshold: Option<f64>,
    pub zone_id: Option<i64>,
    pub area_id: Option<i64>,
    pub type_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub deleted: bool,
}

impl Sensor {
    pub fn is_unassigned(&self) -> bool {
        self.channel < 0
    }

    /// A sensor with no reference value has never been calibrated and
    /// cannot be included when the system arms.
    pub fn is_armable(&self) -> bool {
        self.enabled && !self.deleted && self.reference_value.is_some()
    }

    /// A null `monitor_period` means the sensor fires instantly on any
    /// triggering sample.
    pub fn fires_instantly(&self) -> bool {
        self.monitor_period.is_none()
    }
}
