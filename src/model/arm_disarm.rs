//! Arm / Disarm audit rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmType {
    Away,
    Stay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arm {
    pub id: i64,
    pub arm_type: ArmType,
    pub time: DateTime<Utc>,
    pub user_id: Option<i64>,
    pub keypad_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disarm {
    pub id: i64,
    pub time: DateTime<Utc>,
    /// The Arm this Disarm closes. Exactly one open Arm exists at a time.
    pub arm_id: i64,
    pub user_id: Option<i64>,
    pub keypad_id: Option<i64>,
    /// The Alert, if any, that preceded this disarm.
    pub alert_id: Option<i64>,
}
