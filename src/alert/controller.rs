//! Alert controller. Funnels per-sensor qualifying triggers
//! into at most one open Alert; idempotent addition; notifies and
//! drives the siren once, on the first contributing sensor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{bounded, Sender};
use log::{info, warn};

use crate::bus::{Bus, Topic};
use crate::model::alert::Suppression;
use crate::model::{AlertSensor, Area, ArmState, Sensor, Zone};
use crate::notifier::queue::{Notification, NotificationType, NotifierHandle};
use crate::persistence::alert_repo::AlertRepo;
use crate::persistence::db::open_connection;
use crate::persistence::option_repo::OptionRepo;
use crate::siren::{resolve_params, SirenDriver, SirenOption};
use crate::state_machine::MonitoringState;
use crate::state_store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    Sabotage,
    Away,
    Stay,
}

/// Which zone field carries the alert type for this (zone, area state)
/// pair: sabotage dominates when the zone
/// has a `disarmed_delay`, else pick by the sensor's area arm state.
pub fn resolve_alert_type(zone: &Zone, area_state: ArmState) -> AlertType {
    if zone.disarmed_delay.is_some() {
        return AlertType::Sabotage;
    }
    match area_state {
        ArmState::Stay => AlertType::Stay,
        _ => AlertType::Away,
    }
}

/// Which delay applies for the current monitoring state:
/// `ARM_DELAY`/`ALERT_DELAY` use the `*_arm_delay` fields,
/// `ARMED`/`ALERT` use `*_alert_delay`, `READY` uses `disarmed_delay`.
/// A null result means the sensor does not alert in this state.
pub fn resolve_delay(zone: &Zone, monitoring_state: MonitoringState, alert_type: AlertType) -> Option<u64> {
    use MonitoringState::*;
    match (monitoring_state, alert_type) {
        (ArmDelay | AlertDelay, AlertType::Away) => zone.away_arm_delay,
        (ArmDelay | AlertDelay, AlertType::Stay) => zone.stay_arm_delay,
        (Armed | Alert, AlertType::Away) => zone.away_alert_delay,
        (Armed | Alert, AlertType::Stay) => zone.stay_alert_delay,
        (_, AlertType::Sabotage) => zone.disarmed_delay,
        (Ready, _) => zone.disarmed_delay,
        _ => None,
    }
}

struct AlertingHandle {
    cancel_tx: Sender<()>,
}

/// Shared state for the currently open Alert, if any.
#[derive(Default)]
struct OpenAlert {
    id: Option<i64>,
    notified: bool,
}

#[derive(Clone)]
pub struct AlertController {
    db_path: String,
    bus: Bus,
    state_store: StateStore,
    notifier: NotifierHandle,
    siren: Arc<SirenDriver>,
    alerting: Arc<Mutex<HashMap<i64, AlertingHandle>>>,
    open: Arc<Mutex<OpenAlert>>,
}

impl AlertController {
    pub fn new(
        db_path: String,
        bus: Bus,
        state_store: StateStore,
        notifier: NotifierHandle,
        siren: Arc<SirenDriver>,
    ) -> Self {
        AlertController {
            db_path,
            bus,
            state_store,
            notifier,
            siren,
            alerting: Arc::new(Mutex::new(HashMap::new())),
            open: Arc::new(Mutex::new(OpenAlert::default())),
        }
    }

    /// A sensor's per-trigger lifecycle: resolve type/delay,
    /// respect the arming grace window, and spawn the cancellable
    /// delayed start (the qualifying step runs on its own thread, see `start_after_delay`).
    pub fn on_qualifying_trigger(
        &self,
        sensor: Sensor,
        zone: Zone,
        area_state: ArmState,
        monitoring_state: MonitoringState,
        open_arm_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        arm_id: Option<i64>,
    ) {
        if self.alerting.lock().unwrap().contains_key(&sensor.id) {
            return;
        }

        let alert_type = resolve_alert_type(&zone, area_state);
        let Some(delay) = resolve_delay(&zone, monitoring_state, alert_type) else {
            return;
        };

        if monitoring_state != MonitoringState::AlertDelay {
            if let Some(start) = open_arm_time {
                let grace_ends = start + chrono::Duration::seconds(delay as i64);
                if grace_ends > now {
                    return;
                }
            }
        }

        let (cancel_tx, cancel_rx) = bounded(1);
        self.alerting
            .lock()
            .unwrap()
            .insert(sensor.id, AlertingHandle { cancel_tx });

        let controller = self.clone();
        let sensor_id = sensor.id;
        thread::Builder::new()
            .name(format!("alert-delay-{sensor_id}"))
            .spawn(move || {
                match cancel_rx.recv_timeout(Duration::from_secs(delay)) {
                    Ok(()) => {
                        // cancelled (disarm before the delay elapsed)
                    }
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                        controller.start_sensor_alert(sensor, alert_type, delay, arm_id);
                    }
                    Err(crossbeam::channel::RecvTimeoutError::Disconnected) => {}
                }
            })
            .expect("failed to spawn alert-delay thread");
    }

    fn start_sensor_alert(&self, sensor: Sensor, alert_type: AlertType, delay: u64, arm_id: Option<i64>) {
        let conn = match open_connection(&self.db_path) {
            Ok(c) => c,
            Err(err) => {
                warn!("alert controller could not open database: {err}");
                return;
            }
        };
        let repo = AlertRepo::new(&conn);
        let now = Utc::now();

        let silent = sensor.silent_alert.unwrap_or(false);
        let mut first_sensor = false;
        let alert_id = {
            let mut open = self.open.lock().unwrap();
            if open.id.is_none() {
                match repo.open(now, arm_id) {
                    Ok(id) => {
                        open.id = Some(id);
                        first_sensor = true;
                    }
                    Err(err) => {
                        warn!("failed to open alert row: {err}");
                        return;
                    }
                }
            }
            open.id.unwrap()
        };

        let suppression = if sensor.fires_instantly() {
            Suppression::Instant
        } else {
            Suppression::Period
        };

        let row = AlertSensor {
            alert_id,
            sensor_id: sensor.id,
            channel: sensor.channel,
            name: sensor.name.clone(),
            type_id: sensor.type_id,
            start_time: now,
            end_time: None,
            delay,
            silent,
            suppression,
        };
        if let Err(err) = repo.add_sensor(&row) {
            warn!("failed to record alert sensor {}: {err}", sensor.id);
        }

        let new_state = match alert_type {
            AlertType::Sabotage => MonitoringState::Sabotage,
            AlertType::Away | AlertType::Stay => MonitoringState::Alert,
        };
        self.state_store.set_monitoring(new_state);
        self.bus.publish_event(Topic::AlertStateChange, sensor.area_id);

        if first_sensor {
            self.notifier.enqueue(Notification::new(
                alert_id,
                NotificationType::AlertStarted,
                vec![sensor.name.clone()],
                now,
            ));
            let syren_option = OptionRepo::new(&conn)
                .get("syren", "timing")
                .ok()
                .flatten()
                .map(|row| SirenOption::from_json(&row.value))
                .unwrap_or_default();
            self.siren.start(resolve_params(None, None, None, syren_option, silent));
        }
    }

    /// Per-sensor clearing: windowed alert flag dropped false
    /// while the sensor was contributing to the open alert.
    pub fn clear_sensor(&self, sensor_id: i64) {
        let handle = self.alerting.lock().unwrap().remove(&sensor_id);
        if let Some(handle) = handle {
            let _ = handle.cancel_tx.send(());
        }

        let alert_id = self.open.lock().unwrap().id;
        if let Some(alert_id) = alert_id {
            if let Ok(conn) = open_connection(&self.db_path) {
                let repo = AlertRepo::new(&conn);
                if let Err(err) = repo.close_sensor(alert_id, sensor_id, Utc::now()) {
                    warn!("failed to close alert sensor {sensor_id}: {err}");
                }
            }
        }
    }

    /// Stop-all on disarm: close the open Alert and every still
    /// open `AlertSensor`, stop the siren, notify "alert stopped".
    pub fn disarm_all(&self, disarm_time: DateTime<Utc>) {
        let cancelled: Vec<_> = {
            let mut alerting = self.alerting.lock().unwrap();
            alerting.drain().collect()
        };
        for (_, handle) in cancelled {
            let _ = handle.cancel_tx.send(());
        }

        let alert_id = {
            let mut open = self.open.lock().unwrap();
            open.id.take()
        };

        self.siren.stop();

        let Some(alert_id) = alert_id else {
            return;
        };
        let conn = match open_connection(&self.db_path) {
            Ok(c) => c,
            Err(err) => {
                warn!("alert controller could not open database on disarm: {err}");
                return;
            }
        };
        let repo = AlertRepo::new(&conn);
        let sensors = repo.sensors_for(alert_id).unwrap_or_default();
        let silent = !sensors.is_empty() && sensors.iter().all(|s| s.silent);
        if let Err(err) = repo.close(alert_id, disarm_time, silent) {
            warn!("failed to close alert {alert_id}: {err}");
        }

        info!("alert {alert_id} closed at {disarm_time}");
        self.notifier.enqueue(Notification::new(
            alert_id,
            NotificationType::AlertStopped,
            Vec::new(),
            disarm_time,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(disarmed: Option<u64>, away_arm: Option<u64>, away_alert: Option<u64>) -> Zone {
        Zone {
            id: 1,
            name: "Z".into(),
            disarmed_delay: disarmed,
            away_alert_delay: away_alert,
            stay_alert_delay: None,
            away_arm_delay: away_arm,
            stay_arm_delay: None,
            deleted: false,
        }
    }

    #[test]
    fn sabotage_dominates_regardless_of_area_state() {
        let z = zone(Some(0), None, None);
        assert_eq!(resolve_alert_type(&z, ArmState::Away), AlertType::Sabotage);
        assert_eq!(resolve_alert_type(&z, ArmState::Disarm), AlertType::Sabotage);
    }

    #[test]
    fn non_sabotage_zone_follows_area_arm_state() {
        let z = zone(None, None, None);
        assert_eq!(resolve_alert_type(&z, ArmState::Away), AlertType::Away);
        assert_eq!(resolve_alert_type(&z, ArmState::Stay), AlertType::Stay);
    }

    #[test]
    fn arm_delay_state_uses_arm_delay_fields() {
        let z = zone(None, Some(10), Some(20));
        let delay = resolve_delay(&z, MonitoringState::ArmDelay, AlertType::Away);
        assert_eq!(delay, Some(10));
    }

    #[test]
    fn armed_state_uses_alert_delay_fields() {
        let z = zone(None, Some(10), Some(20));
        let delay = resolve_delay(&z, MonitoringState::Armed, AlertType::Away);
        assert_eq!(delay, Some(20));
    }

    #[test]
    fn null_delay_means_no_alert_in_that_state() {
        let z = zone(None, None, None);
        assert_eq!(resolve_delay(&z, MonitoringState::Armed, AlertType::Away), None);
    }
}
