//! Output entity: a physical output channel
//! bound to one trigger source, with its own delay/duration/default
//! state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTriggerType {
    Area,
    System,
    Button,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub id: i64,
    pub channel: i32,
    pub enabled: bool,
    pub default_state: bool,
    pub delay: u64,
    /// `None` means "until cancelled" (duration = -1).
    pub duration: Option<u64>,
    pub trigger_type: OutputTriggerType,
    pub area_id: Option<i64>,
    pub deleted: bool,
}
