//! MQTT publication. Publishes Home-Assistant-style `binary_sensor`/
//! `alarm_control_panel` config and state topics so any MQTT-discovery
//! front end can pick up areas and sensors without separate setup.
//! Controlled by the `mqtt/connection` option; does nothing when that
//! option is absent or `enabled` is false.

use std::thread;
use std::time::Duration;

use log::warn;
use rumqttc::{Client, MqttOptions, QoS};
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::model::ArmState;
use crate::persistence::option_repo::OptionRepo;

const AREA_TOPIC_PREFIX: &str = "arpi/alarm_control_panel/";
const SENSOR_TOPIC_PREFIX: &str = "arpi/binary_sensor/";

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub enabled: bool,
    pub hostname: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        MqttSettings {
            enabled: false,
            hostname: String::new(),
            port: 1883,
            username: None,
            password: None,
        }
    }
}

impl MqttSettings {
    pub fn from_json(value: &Value) -> Self {
        MqttSettings {
            enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            hostname: value
                .get("hostname")
                .and_then(Value::as_str)
                .unwrap_or("localhost")
                .to_string(),
            port: value.get("port").and_then(Value::as_u64).unwrap_or(1883) as u16,
            username: value.get("username").and_then(Value::as_str).map(str::to_string),
            password: value.get("password").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// Loads the `mqtt/connection` option row, defaulting to disabled
    /// when it is absent.
    pub fn load(conn: &Connection) -> Self {
        match OptionRepo::new(conn).get("mqtt", "connection") {
            Ok(Some(option)) => MqttSettings::from_json(&option.value),
            Ok(None) => MqttSettings::default(),
            Err(err) => {
                warn!("could not load mqtt/connection option: {err}");
                MqttSettings::default()
            }
        }
    }
}

/// Converts a name into `[a-z0-9_-]`, matching what Home Assistant accepts
/// in a topic segment.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Thin wrapper around `rumqttc`'s synchronous client. `client` is `None`
/// when MQTT publication is disabled, so every publish call is a no-op.
pub struct MqttPublisher {
    client: Option<Client>,
}

impl MqttPublisher {
    /// Connects (if enabled) and spawns the background thread that drives
    /// `rumqttc`'s event loop; publishing requires that loop to be pumped
    /// continuously or queued packets never leave the process.
    pub fn connect(settings: &MqttSettings) -> Self {
        if !settings.enabled {
            return MqttPublisher { client: None };
        }

        let mut options = MqttOptions::new("sentinel_monitor", settings.hostname.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(60));
        if let Some(username) = &settings.username {
            options.set_credentials(username.clone(), settings.password.clone().unwrap_or_default());
        }

        let (client, mut connection) = Client::new(options, 16);
        thread::Builder::new()
            .name("mqtt-event-loop".into())
            .spawn(move || {
                for notification in connection.iter() {
                    if let Err(err) = notification {
                        warn!("mqtt connection error: {err}");
                    }
                }
            })
            .expect("failed to spawn mqtt event loop thread");

        MqttPublisher { client: Some(client) }
    }

    fn publish(&self, topic: String, payload: String) {
        let Some(client) = &self.client else {
            return;
        };
        if let Err(err) = client.publish(topic, QoS::AtLeastOnce, true, payload) {
            warn!("mqtt publish failed: {err}");
        }
    }

    pub fn publish_area_config(&self, name: &str) {
        let topic_prefix = format!("{AREA_TOPIC_PREFIX}{}", sanitize(name));
        let config = json!({
            "name": name,
            "supported_features": ["arm_home", "arm_away"],
            "state_topic": format!("{topic_prefix}/state"),
            "command_topic": format!("{topic_prefix}/state/set"),
        });
        self.publish(format!("{topic_prefix}/config"), config.to_string());
    }

    pub fn publish_area_state(&self, name: &str, state: ArmState) {
        let payload = match state {
            ArmState::Away => "armed_away",
            ArmState::Stay => "armed_home",
            ArmState::Disarm => "disarmed",
            ArmState::Mixed => {
                warn!("area {name} has a mixed arm state with no Home Assistant equivalent, reporting disarmed");
                "disarmed"
            }
        };
        let topic = format!("{AREA_TOPIC_PREFIX}{}/state", sanitize(name));
        self.publish(topic, payload.to_string());
    }

    pub fn publish_sensor_config(&self, id: i64, name: &str) {
        let topic_prefix = format!("{SENSOR_TOPIC_PREFIX}{}", sanitize(name));
        let config = json!({
            "name": Value::Null,
            "state_topic": format!("{topic_prefix}/state"),
            "unique_id": format!("sensor{id}"),
            "device": { "identifiers": [id], "name": name },
        });
        self.publish(format!("{topic_prefix}/config"), config.to_string());
    }

    pub fn publish_sensor_state(&self, name: &str, active: bool) {
        let topic = format!("{SENSOR_TOPIC_PREFIX}{}/state", sanitize(name));
        self.publish(topic, if active { "ON" } else { "OFF" }.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_settings_default_to_no_client() {
        let publisher = MqttPublisher::connect(&MqttSettings::default());
        assert!(publisher.client.is_none());
    }

    #[test]
    fn sanitize_lowercases_and_replaces_punctuation() {
        assert_eq!(sanitize("Front Door!"), "front_door_");
        assert_eq!(sanitize("zone-1_A"), "zone-1_a");
    }

    #[test]
    fn from_json_reads_connection_fields() {
        let value = json!({
            "enabled": true,
            "hostname": "broker.local",
            "port": 8883,
            "username": "arpi",
            "password": "secret",
        });
        let settings = MqttSettings::from_json(&value);
        assert!(settings.enabled);
        assert_eq!(settings.hostname, "broker.local");
        assert_eq!(settings.port, 8883);
    }
}
