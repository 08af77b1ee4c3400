//! Area/arm coordinator. Consumes
//! `ArmAway`/`ArmStay`/`Disarm` bus commands, writes the `Arm`/`Disarm`
//! audit trail, reconciles per-area arm state into the global state,
//! and drives the monitoring state machine's arm/disarm
//! transitions. Per-sensor alert delays still live in `alert::controller`;
//! this only owns the system-level arm delay.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{info, warn};

use crate::alert::AlertController;
use crate::bus::{Bus, BusMessage, Topic};
use crate::model::arm_disarm::ArmType;
use crate::model::output::Output;
use crate::model::ArmState;
use crate::mqtt::MqttPublisher;
use crate::output_signs::{OutputSignEngine, SignParams, TriggerKey, TriggerSource};
use crate::persistence::area_repo::AreaRepo;
use crate::persistence::arm_repo::{ArmRepo, DisarmRepo};
use crate::persistence::db::open_connection;
use crate::persistence::output_repo::OutputRepo;
use crate::persistence::zone_repo::ZoneRepo;
use crate::state_machine::{transition, ArmKind, Event, MonitoringState};
use crate::state_store::StateStore;

pub struct AreaCoordinator {
    db_path: String,
    bus: Bus,
    state_store: StateStore,
    alert: AlertController,
    signs: Arc<OutputSignEngine>,
    mqtt: Arc<MqttPublisher>,
    arm_timer: Arc<Mutex<Option<Sender<()>>>>,
}

impl AreaCoordinator {
    pub fn new(
        db_path: String,
        bus: Bus,
        state_store: StateStore,
        alert: AlertController,
        signs: Arc<OutputSignEngine>,
        mqtt: Arc<MqttPublisher>,
    ) -> Self {
        AreaCoordinator {
            db_path,
            bus,
            state_store,
            alert,
            signs,
            mqtt,
            arm_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Blocking main loop; run this on its own thread.
    pub fn run(&self, sub_rx: Receiver<BusMessage>, heartbeat: crate::supervisor::Heartbeat) {
        loop {
            heartbeat.beat();
            match sub_rx.recv_timeout(Duration::from_secs(1)) {
                Ok(BusMessage::Stop) => break,
                Ok(BusMessage::ArmAway { keypad_id, user_id }) => {
                    self.handle_arm(ArmKind::Away, keypad_id, user_id)
                }
                Ok(BusMessage::ArmStay { keypad_id, user_id }) => {
                    self.handle_arm(ArmKind::Stay, keypad_id, user_id)
                }
                Ok(BusMessage::Disarm { keypad_id, user_id }) => self.handle_disarm(keypad_id, user_id),
                Ok(BusMessage::UpdateConfig) => self.handle_update_config(),
                Ok(_) => {}
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Arming is system-wide: every non-deleted area moves to the same
    /// arm state, and the delay is the longest `*_arm_delay` among the
    /// zones actually in play (a shorter-delay zone must not open a gap
    /// an alert could slip through before the system is fully armed).
    fn handle_arm(&self, kind: ArmKind, keypad_id: Option<i64>, user_id: Option<i64>) {
        if self.state_store.monitoring() != crate::state_machine::MonitoringState::Ready {
            return;
        }

        let conn = match open_connection(&self.db_path) {
            Ok(c) => c,
            Err(err) => {
                warn!("coordinator could not open database: {err}");
                return;
            }
        };

        let arm_type = match kind {
            ArmKind::Away => ArmType::Away,
            ArmKind::Stay => ArmType::Stay,
        };
        let area_state = match kind {
            ArmKind::Away => ArmState::Away,
            ArmKind::Stay => ArmState::Stay,
        };

        let area_repo = AreaRepo::new(&conn);
        let areas = area_repo.find_all().unwrap_or_default();
        for area in &areas {
            if let Err(err) = area_repo.set_arm_state(area.id, area_state) {
                warn!("failed to set area {} arm state: {err}", area.id);
            }
            self.mqtt.publish_area_state(&area.name, area_state);
        }

        let output_repo = OutputRepo::new(&conn);
        for area in &areas {
            if let Ok(Some(output)) = output_repo.find_by_area(area.id) {
                self.trigger_sign(TriggerSource::Area(area.id), &output);
            }
        }
        if let Ok(Some(output)) = output_repo.find_system() {
            self.trigger_sign(TriggerSource::System, &output);
        }

        let zone_repo = ZoneRepo::new(&conn);
        let zones = zone_repo.find_all().unwrap_or_default();
        let delay = zones
            .iter()
            .filter_map(|z| match kind {
                ArmKind::Away => z.away_arm_delay,
                ArmKind::Stay => z.stay_arm_delay,
            })
            .max();

        let now = Utc::now();
        let arm_repo = ArmRepo::new(&conn);
        let arm_id = match arm_repo.open(arm_type, now, user_id, keypad_id) {
            Ok(id) => id,
            Err(err) => {
                warn!("failed to record arm: {err}");
                return;
            }
        };
        info!("arm {arm_id} ({arm_type:?}) recorded, delay={delay:?}");

        let next = transition(self.state_store.monitoring(), Event::Arm { kind, delay });
        self.state_store.set_monitoring(next);
        self.bus.publish_event(Topic::ArmStateChange, None);
        self.bus.publish_event(Topic::AreaStateChange, None);

        if next == crate::state_machine::MonitoringState::ArmDelay {
            self.start_arm_timer(delay.unwrap_or(0));
        }
    }

    /// Drives the `any -> UPDATING_CONFIG -> (re-validate) -> next`
    /// detour: parks in `UpdatingConfig` just long enough to confirm the
    /// area/zone tables still load, then returns to whatever state the
    /// system was in before (or `InvalidConfig` if they don't).
    fn handle_update_config(&self) {
        let previous = self.state_store.monitoring();
        let updating = transition(previous, Event::UpdateConfig);
        self.state_store.set_monitoring(updating);
        self.bus.publish_event(Topic::SystemStateChange, None);

        let revalidated = match open_connection(&self.db_path) {
            Ok(conn) => ZoneRepo::new(&conn).find_all().is_ok() && AreaRepo::new(&conn).find_all().is_ok(),
            Err(err) => {
                warn!("coordinator could not open database to revalidate config: {err}");
                false
            }
        };
        let resolved = if revalidated { previous } else { MonitoringState::InvalidConfig };

        let next = transition(updating, Event::ConfigRevalidated { next: resolved });
        self.state_store.set_monitoring(next);
        self.bus.publish_event(Topic::SystemStateChange, None);
        if !revalidated {
            warn!("config reload failed revalidation, holding at InvalidConfig");
        }
    }

    /// START the output sign bound to this area/system key.
    fn trigger_sign(&self, source: TriggerSource, output: &Output) {
        if !output.enabled {
            return;
        }
        self.signs.start(
            TriggerKey { source },
            SignParams {
                channel: output.channel,
                default_state: output.default_state,
                delay: Duration::from_secs(output.delay),
                duration: output.duration.map(Duration::from_secs),
            },
        );
    }

    fn start_arm_timer(&self, delay: u64) {
        let (cancel_tx, cancel_rx) = bounded(1);
        *self.arm_timer.lock().unwrap() = Some(cancel_tx);

        let state_store = self.state_store.clone();
        let bus = self.bus.clone();
        let arm_timer = Arc::clone(&self.arm_timer);
        thread::Builder::new()
            .name("arm-delay".to_string())
            .spawn(move || match cancel_rx.recv_timeout(Duration::from_secs(delay)) {
                Ok(()) => {}
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                    let next = transition(state_store.monitoring(), Event::ArmDelayExpired);
                    state_store.set_monitoring(next);
                    bus.publish_event(Topic::ArmStateChange, None);
                    *arm_timer.lock().unwrap() = None;
                }
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => {}
            })
            .expect("failed to spawn arm-delay thread");
    }

    /// Stops every active output sign and siren, plus the coordinator's
    /// own Disarm row and area reconciliation.
    fn handle_disarm(&self, keypad_id: Option<i64>, user_id: Option<i64>) {
        if let Some(cancel_tx) = self.arm_timer.lock().unwrap().take() {
            let _ = cancel_tx.send(());
        }

        let conn = match open_connection(&self.db_path) {
            Ok(c) => c,
            Err(err) => {
                warn!("coordinator could not open database: {err}");
                return;
            }
        };

        let arm_repo = ArmRepo::new(&conn);
        let open_arm = match arm_repo.find_open() {
            Ok(Some(arm)) => Some(arm),
            Ok(None) => None,
            Err(err) => {
                warn!("failed to look up open arm: {err}");
                None
            }
        };

        let now = Utc::now();
        let open_alert_id = crate::persistence::alert_repo::AlertRepo::new(&conn)
            .find_open()
            .ok()
            .flatten()
            .map(|a| a.id);

        self.alert.disarm_all(now);

        if let Some(arm) = &open_arm {
            if let Err(err) = arm_repo.close(arm.id, now) {
                warn!("failed to close arm {}: {err}", arm.id);
            }
            let disarm_repo = DisarmRepo::new(&conn);
            if let Err(err) = disarm_repo.create(now, arm.id, user_id, keypad_id, open_alert_id) {
                warn!("failed to record disarm for arm {}: {err}", arm.id);
            }
        }

        let area_repo = AreaRepo::new(&conn);
        for area in area_repo.find_all().unwrap_or_default() {
            if let Err(err) = area_repo.set_arm_state(area.id, ArmState::Disarm) {
                warn!("failed to disarm area {}: {err}", area.id);
            }
            self.mqtt.publish_area_state(&area.name, ArmState::Disarm);
            self.signs.stop(&TriggerKey {
                source: TriggerSource::Area(area.id),
            });
        }
        self.signs.stop(&TriggerKey {
            source: TriggerSource::System,
        });

        let next = transition(self.state_store.monitoring(), Event::Disarm);
        self.state_store.set_monitoring(next);
        self.bus.publish_event(Topic::ArmStateChange, None);
        self.bus.publish_event(Topic::AreaStateChange, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::output_driver::SimulatedOutputDriver;
    use crate::notifier::queue::test_handle;
    use crate::siren::SirenDriver;

    fn test_coordinator(db_path: &str) -> AreaCoordinator {
        let bus = Bus::new();
        let state_store = StateStore::new(format!("{db_path}.status.json"), bus.clone());
        let notifier = test_handle();
        let siren = Arc::new(SirenDriver::new(
            0,
            Arc::new(Mutex::new(SimulatedOutputDriver::new(1))),
            bus.clone(),
        ));
        let alert = AlertController::new(db_path.to_string(), bus.clone(), state_store.clone(), notifier, siren);
        let output: Arc<Mutex<dyn crate::hardware::OutputDriver>> =
            Arc::new(Mutex::new(SimulatedOutputDriver::new(8)));
        let signs = Arc::new(crate::output_signs::OutputSignEngine::new(output, bus.clone()));
        let mqtt = Arc::new(MqttPublisher::connect(&crate::mqtt::MqttSettings::default()));
        AreaCoordinator::new(db_path.to_string(), bus, state_store, alert, signs, mqtt)
    }

    #[test]
    fn arm_with_no_zone_delay_jumps_straight_to_armed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coord.sqlite3");
        let path_str = path.to_str().unwrap();
        let conn = open_connection(path_str).unwrap();
        conn.execute(
            "INSERT INTO area (id, name, arm_state) VALUES (1, 'A1', 'DISARM')",
            [],
        )
        .unwrap();
        drop(conn);

        let coordinator = test_coordinator(path_str);
        coordinator.state_store.set_monitoring(crate::state_machine::MonitoringState::Ready);
        coordinator.handle_arm(ArmKind::Away, None, None);
        assert_eq!(coordinator.state_store.monitoring(), crate::state_machine::MonitoringState::Armed);
    }
}
