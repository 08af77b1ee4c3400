//! Option entity: keyed configuration blob hosting
//! dyndns, SSH, MQTT, SMTP, GSM, subscriptions, syren and sensitivity
//! settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Option {
    pub name: String,
    pub section: String,
    pub value: Value,
}

impl Option {
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.section)
    }
}
