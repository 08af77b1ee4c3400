//! Message body templates for alert and power-outage notifications.

pub fn alert_started_sms(sensors: &[String], time: &str) -> String {
    format!("Alert started at {time}: {}", sensors.join(", "))
}

pub fn alert_stopped_sms(time: &str) -> String {
    format!("Alert stopped at {time}")
}

pub fn alert_started_email(sensors: &[String], time: &str) -> (String, String) {
    (
        "Alert started".to_string(),
        format!("An alert started at {time}.\nSensors: {}", sensors.join(", ")),
    )
}

pub fn alert_stopped_email(time: &str) -> (String, String) {
    ("Alert stopped".to_string(), format!("The alert ended at {time}."))
}

pub fn power_outage_started_sms() -> String {
    "Power outage detected".to_string()
}

pub fn power_outage_stopped_sms() -> String {
    "Power restored".to_string()
}
