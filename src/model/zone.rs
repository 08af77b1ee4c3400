//! Zone entity: a delay profile referenced by sensors.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    pub name: String,
    /// A null delay means "this zone does not participate in that state."
    pub disarmed_delay: Option<u64>,
    pub away_alert_delay: Option<u64>,
    pub stay_alert_delay: Option<u64>,
    pub away_arm_delay: Option<u64>,
    pub stay_arm_delay: Option<u64>,
    pub deleted: bool,
}
