//! The sensor engine's main sampling loop. One dedicated thread,
//! woken at `Config::sample_rate_hz`, running a periodic-release
//! sample/evaluate/dispatch cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Select, Sender};
use log::{debug, error, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::alert::AlertController;
use crate::bus::{Bus, BusMessage, Topic};
use crate::config::Config;
use crate::hardware::wiring::{levels_for, EolResistors, WiringLevels};
use crate::hardware::{BoardVersion, SensorInput};
use crate::model::area::global_arm_state;
use crate::model::{ChannelType, Sensor};
use crate::mqtt::MqttPublisher;
use crate::persistence::area_repo::AreaRepo;
use crate::persistence::arm_repo::ArmRepo;
use crate::persistence::db::open_connection;
use crate::persistence::sensor_repo::SensorRepo;
use crate::persistence::zone_repo::ZoneRepo;
use crate::sensor_engine::window::SlidingWindow;
use crate::state_store::StateStore;

/// `BASIC` channels have no wiring table to compare against; they alert
/// off their own calibrated reference value at this tolerance instead of
/// the board-wide `Config::tolerance` used by every other channel type.
const TOLERANCE_V2: f64 = 0.01;

/// Per-sensor derived state the engine keeps between samples.
struct Tracked {
    window: SlidingWindow,
    levels: WiringLevels,
    tolerance: f64,
    last_alert: bool,
    last_error: bool,
    fires_instantly: bool,
    threshold_percent: f64,
}

pub struct SensorEngine {
    config: Config,
    input: Arc<Mutex<dyn SensorInput>>,
    db_path: String,
    bus: Bus,
    state_store: StateStore,
    alert: AlertController,
    mqtt: Arc<MqttPublisher>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl SensorEngine {
    pub fn new(
        config: Config,
        input: Arc<Mutex<dyn SensorInput>>,
        db_path: String,
        bus: Bus,
        state_store: StateStore,
        alert: AlertController,
        mqtt: Arc<MqttPublisher>,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        SensorEngine {
            config,
            input,
            db_path,
            bus,
            state_store,
            alert,
            mqtt,
            stop_tx,
            stop_rx,
        }
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Blocking main loop; run this on its own thread. `heartbeat` is
    /// beaten once per sample so the supervisor can detect a wedged
    /// engine.
    pub fn run(&self, heartbeat: crate::supervisor::Heartbeat) {
        let conn = match open_connection(&self.db_path) {
            Ok(c) => c,
            Err(err) => {
                error!("sensor engine could not open database: {err}");
                return;
            }
        };

        self.calibrate_uncalibrated(&conn);

        let mut tracked: HashMap<i64, Tracked> = HashMap::new();
        self.reload_sensors(&conn, &mut tracked);

        let period = Duration::from_secs_f64(1.0 / self.config.sample_rate_hz.max(0.1));
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let config_sub = self.bus.subscribe();

        loop {
            heartbeat.beat();

            let mut select = Select::new();
            let stop_idx = select.recv(&self.stop_rx);
            let cfg_idx = select.recv(&config_sub.rx);
            match select.select_timeout(period) {
                Ok(op) if op.index() == stop_idx => match op.recv(&self.stop_rx) {
                    Ok(()) | Err(_) => break,
                },
                Ok(op) if op.index() == cfg_idx => match op.recv(&config_sub.rx) {
                    Ok(BusMessage::UpdateConfig) => {
                        info!("sensor engine reloading sensors after a config update");
                        self.reload_sensors(&conn, &mut tracked);
                    }
                    Ok(BusMessage::Stop) => break,
                    Ok(_) => {}
                    Err(_) => break,
                },
                Ok(_) => unreachable!("only two operations are registered"),
                Err(crossbeam::channel::SelectTimeoutError) => {}
            }
            self.sample_once(&conn, &mut tracked);
            sleeper.sleep(Duration::from_millis(0));
        }
    }

    /// A sensor with no `reference_value` is not
    /// armable until it has one. Run once at startup so a freshly wired
    /// channel becomes usable without a manual calibration step.
    fn calibrate_uncalibrated(&self, conn: &rusqlite::Connection) {
        let repo = SensorRepo::new(conn);
        let sensors = match repo.find_all() {
            Ok(s) => s,
            Err(err) => {
                warn!("sensor engine could not load sensors for calibration: {err}");
                return;
            }
        };
        for sensor in sensors.into_iter().filter(|s| s.enabled && !s.is_unassigned() && s.reference_value.is_none()) {
            let mut input = match self.input.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match crate::sensor_engine::calibration::calibrate_channel(&mut *input, sensor.channel) {
                Ok(value) => {
                    drop(input);
                    if let Err(err) = repo.set_reference_value(sensor.id, value) {
                        warn!("failed to persist calibration for sensor {}: {err}", sensor.id);
                    }
                }
                Err(err) => warn!("calibration failed for sensor {}: {err}", sensor.id),
            }
        }
    }

    fn reload_sensors(&self, conn: &rusqlite::Connection, tracked: &mut HashMap<i64, Tracked>) {
        let repo = SensorRepo::new(conn);
        let sensors = match repo.find_all() {
            Ok(s) => s,
            Err(err) => {
                error!("sensor engine failed to load sensors: {err}");
                return;
            }
        };
        tracked.clear();
        for sensor in sensors.into_iter().filter(|s| s.enabled && !s.is_unassigned()) {
            self.mqtt.publish_sensor_config(sensor.id, &sensor.name);
            tracked.insert(sensor.id, self.track_for(&sensor));
        }
    }

    fn track_for(&self, sensor: &Sensor) -> Tracked {
        let levels = levels_for(
            sensor.eol_count,
            sensor.contact_type,
            sensor.channel_type,
            EolResistors::default(),
        );
        let capacity = sensor
            .monitor_period
            .map(|secs| ((secs as f64) * self.config.sample_rate_hz).ceil().max(1.0) as usize)
            .unwrap_or(1);
        Tracked {
            window: SlidingWindow::new(capacity),
            levels,
            tolerance: self.config.tolerance,
            last_alert: false,
            last_error: false,
            fires_instantly: sensor.fires_instantly(),
            threshold_percent: sensor.monitor_threshold.unwrap_or(100.0),
        }
    }

    fn sample_once(&self, conn: &rusqlite::Connection, tracked: &mut HashMap<i64, Tracked>) {
        let repo = SensorRepo::new(conn);
        let sensors = match repo.find_all() {
            Ok(s) => s,
            Err(err) => {
                warn!("sensor engine could not refresh sensor list: {err}");
                return;
            }
        };

        let mut any_alert_changed = false;
        let mut any_error_changed = false;

        for sensor in &sensors {
            let Some(state) = tracked.get_mut(&sensor.id) else {
                continue;
            };
            let Some(reference) = sensor.reference_value else {
                continue;
            };

            let raw = {
                let mut input = match self.input.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match input.read(sensor.channel) {
                    Ok(v) => v,
                    Err(err) => {
                        debug!("sensor {} read failed: {err}", sensor.id);
                        continue;
                    }
                }
            };

            let triggered = is_active(sensor.channel_type, raw, reference, &state.levels, state.tolerance);
            state.window.push(triggered);

            let alert = if state.fires_instantly {
                triggered
            } else {
                state.window.meets_threshold(state.threshold_percent)
            };
            let error = sensor.channel_type != ChannelType::Basic
                && supports_error_detection(self.board_version())
                && is_shortcut_or_open(raw, &state.levels, state.tolerance);

            if alert != state.last_alert || error != state.last_error {
                if let Err(err) = repo.update_reading(sensor.id, alert, error) {
                    warn!("failed to persist sensor {} reading: {err}", sensor.id);
                }
                any_alert_changed |= alert != state.last_alert;
                any_error_changed |= error != state.last_error;
                if alert != state.last_alert {
                    self.mqtt.publish_sensor_state(&sensor.name, alert);
                }
                if alert && !state.last_alert {
                    self.dispatch_qualifying_trigger(conn, sensor);
                } else if !alert && state.last_alert {
                    self.alert.clear_sensor(sensor.id);
                }
                state.last_alert = alert;
                state.last_error = error;
            }
        }

        if any_alert_changed {
            self.bus.publish_event(Topic::SensorsStateChange, None);
        }
        if any_error_changed {
            self.bus.publish_event(Topic::SensorsErrorChange, None);
        }
    }

    fn board_version(&self) -> BoardVersion {
        self.config.board_version
    }

    /// A sensor just crossed into alert; resolve its zone/area context
    /// and hand off to the alert controller.
    fn dispatch_qualifying_trigger(&self, conn: &rusqlite::Connection, sensor: &Sensor) {
        let Some(zone_id) = sensor.zone_id else {
            return;
        };
        let zone = match ZoneRepo::new(conn).find_by_id(zone_id) {
            Ok(zone) => zone,
            Err(err) => {
                warn!("sensor {} has no resolvable zone {zone_id}: {err}", sensor.id);
                return;
            }
        };

        let area_repo = AreaRepo::new(conn);
        let area_state = match sensor.area_id {
            Some(area_id) => match area_repo.find_by_id(area_id) {
                Ok(area) => area.arm_state,
                Err(_) => global_arm_state(&area_repo.find_all().unwrap_or_default()),
            },
            None => global_arm_state(&area_repo.find_all().unwrap_or_default()),
        };

        let open_arm = ArmRepo::new(conn).find_open().unwrap_or(None);
        let arm_id = open_arm.as_ref().map(|a| a.id);
        let open_arm_time = open_arm.map(|a| a.time);

        self.alert.on_qualifying_trigger(
            sensor.clone(),
            zone,
            area_state,
            self.state_store.monitoring(),
            open_arm_time,
            chrono::Utc::now(),
            arm_id,
        );
    }
}

/// `BASIC` channels compare against the sensor's own calibrated
/// `reference`, not the wiring table: they alert when the reading drifts
/// away from that reference by at least `TOLERANCE_V2`. Every other
/// channel type compares against the wiring table's active level(s).
fn is_active(channel_type: ChannelType, raw: f64, reference: f64, levels: &WiringLevels, tolerance: f64) -> bool {
    if channel_type == ChannelType::Basic {
        return (raw - reference).abs() >= TOLERANCE_V2;
    }
    let close_to = |level: f64| (raw - level).abs() <= tolerance;
    close_to(levels.active_level) || levels.secondary_active_level.is_some_and(close_to)
}

fn is_shortcut_or_open(raw: f64, levels: &WiringLevels, tolerance: f64) -> bool {
    let close_to = |level: f64| (raw - level).abs() <= tolerance;
    !close_to(levels.default_level)
        && !close_to(levels.active_level)
        && !levels.secondary_active_level.is_some_and(close_to)
        && (raw <= tolerance || raw >= 1.0 - tolerance)
}

fn supports_error_detection(board: BoardVersion) -> bool {
    board.supports_eol_error_detection()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::wiring::{levels_for, EolResistors};
    use crate::model::{ChannelType, ContactType, EolCount};

    #[test]
    fn shortcut_is_flagged_when_far_from_any_legitimate_level() {
        let levels = levels_for(EolCount::Single, ContactType::Nc, ChannelType::Normal, EolResistors::default());
        assert!(is_shortcut_or_open(0.0, &levels, 0.02));
        assert!(!is_shortcut_or_open(levels.active_level, &levels, 0.02));
    }

    #[test]
    fn active_level_match_within_tolerance_counts_as_triggered() {
        let levels = levels_for(EolCount::Single, ContactType::No, ChannelType::Normal, EolResistors::default());
        assert!(is_active(ChannelType::Normal, levels.active_level + 0.001, 0.0, &levels, 0.02));
        assert!(!is_active(ChannelType::Normal, levels.default_level, 0.0, &levels, 0.02));
    }

    #[test]
    fn basic_channel_compares_against_its_own_reference_not_the_wiring_table() {
        let levels = levels_for(EolCount::Single, ContactType::Nc, ChannelType::Basic, EolResistors::default());
        // Sitting right at the wiring table's active level would normally
        // trigger, but BASIC ignores the table entirely.
        assert!(!is_active(ChannelType::Basic, levels.active_level, levels.active_level, &levels, 0.02));
        assert!(is_active(ChannelType::Basic, 0.5, 0.3, &levels, 0.02));
    }
}
