//! Wire format for the IPC endpoint. Requests carry an
//! `action` string plus loose parameters; responses are the uniform
//! `{result, message?, value?, other?}` shape every action replies with.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every request is one JSON object: `{"action": "...", ...params}`.
/// Parameters vary per action (`keypad_id`, `output_id`, `duration`, …)
/// so they are kept as a loose map rather than one struct per action.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Request {
    pub fn i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Response {
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<Value>,
}

impl Response {
    pub fn ok() -> Self {
        Response {
            result: true,
            ..Default::default()
        }
    }

    pub fn ok_value(value: Value) -> Self {
        Response {
            result: true,
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Response {
            result: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn unknown_command() -> Self {
        Response::err("Unknown command")
    }

    pub fn with_other(mut self, other: Value) -> Self {
        self.other = Some(other);
        self
    }
}

/// Actions forwarded to the bus verbatim and acknowledged with
/// `{result: true}`.
pub const MONITOR_ARM_AWAY: &str = "monitor_arm_away";
pub const MONITOR_ARM_STAY: &str = "monitor_arm_stay";
pub const MONITOR_DISARM: &str = "monitor_disarm";
pub const MONITOR_UPDATE_CONFIG: &str = "monitor_update_config";
pub const MONITOR_UPDATE_KEYPAD: &str = "monitor_update_keypad";
pub const MONITOR_REGISTER_CARD: &str = "monitor_register_card";

/// Query actions, answered from in-process state.
pub const MONITOR_GET_ARM: &str = "monitor_get_arm";
pub const MONITOR_GET_STATE: &str = "monitor_get_state";
pub const POWER_GET_STATE: &str = "power_get_state";

/// Side-effecting actions.
pub const MONITOR_SYNC_CLOCK: &str = "monitor_sync_clock";
pub const MONITOR_SET_CLOCK: &str = "monitor_set_clock";
pub const MONITOR_ACTIVATE_OUTPUT: &str = "monitor_activate_output";
pub const MONITOR_DEACTIVATE_OUTPUT: &str = "monitor_deactivate_output";
pub const MONITOR_UPDATE_SECURE_CONNECTION: &str = "monitor_update_secure_connection";
pub const UPDATE_SSH: &str = "update_ssh";
pub const SEND_TEST_EMAIL: &str = "send_test_email";
pub const SEND_TEST_SMS: &str = "send_test_sms";
pub const SEND_TEST_SYREN: &str = "send_test_syren";

pub const BROADCASTED_ACTIONS: [&str; 6] = [
    MONITOR_ARM_AWAY,
    MONITOR_ARM_STAY,
    MONITOR_DISARM,
    MONITOR_UPDATE_CONFIG,
    MONITOR_UPDATE_KEYPAD,
    MONITOR_REGISTER_CARD,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_action_and_keeps_extra_params() {
        let raw = r#"{"action": "monitor_activate_output", "output_id": 3}"#;
        let req: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(req.action, "monitor_activate_output");
        assert_eq!(req.i64("output_id"), Some(3));
    }

    #[test]
    fn unknown_command_response_matches_wire_contract() {
        let resp = Response::unknown_command();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["result"], false);
        assert_eq!(json["message"], "Unknown command");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn ok_response_omits_absent_fields() {
        let resp = Response::ok();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
    }
}
