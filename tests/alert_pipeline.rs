//! Black-box coverage of the alert lifecycle: a qualifying trigger
//! opens exactly one Alert, a second sensor joins it rather than
//! opening another, and disarm closes everything.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use sentinel_monitor::alert::AlertController;
use sentinel_monitor::bus::Bus;
use sentinel_monitor::hardware::output_driver::SimulatedOutputDriver;
use sentinel_monitor::hardware::OutputDriver;
use sentinel_monitor::model::{ArmState, Sensor, Zone};
use sentinel_monitor::notifier::queue::test_handle;
use sentinel_monitor::persistence::alert_repo::AlertRepo;
use sentinel_monitor::persistence::db::open_connection;
use sentinel_monitor::siren::SirenDriver;
use sentinel_monitor::state_machine::MonitoringState;
use sentinel_monitor::state_store::StateStore;

fn zone_with_instant_away_delay() -> Zone {
    Zone {
        id: 1,
        name: "perimeter".to_string(),
        disarmed_delay: None,
        away_alert_delay: Some(0),
        stay_alert_delay: Some(0),
        away_arm_delay: Some(0),
        stay_arm_delay: Some(0),
        deleted: false,
    }
}

fn sensor(id: i64, name: &str) -> Sensor {
    Sensor {
        id,
        channel: id as i32,
        channel_type: sentinel_monitor::model::ChannelType::Normal,
        contact_type: sentinel_monitor::model::ContactType::Nc,
        eol_count: sentinel_monitor::model::EolCount::Single,
        reference_value: Some(0.0),
        alert: false,
        error: false,
        enabled: true,
        silent_alert: None,
        monitor_period: None,
        monitor_threshold: None,
        zone_id: Some(1),
        area_id: Some(1),
        type_id: None,
        name: name.to_string(),
        description: None,
        deleted: false,
    }
}

fn controller(db_path: &str) -> (AlertController, Bus) {
    let bus = Bus::new();
    let dir = tempfile::tempdir().unwrap();
    let status_file = dir.path().join("status.json");
    let state_store = StateStore::new(status_file.to_str().unwrap().to_string(), bus.clone());
    let notifier = test_handle();
    let output: Arc<Mutex<dyn OutputDriver>> = Arc::new(Mutex::new(SimulatedOutputDriver::new(1)));
    let siren = Arc::new(SirenDriver::new(0, output, bus.clone()));
    let controller = AlertController::new(db_path.to_string(), bus.clone(), state_store, notifier, siren);
    (controller, bus)
}

/// Polls `f` until it returns `Some`, up to one second; the alert
/// controller's delay-qualification step runs on its own thread.
fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        if let Some(value) = f() {
            return value;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for condition");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn first_qualifying_sensor_opens_exactly_one_alert() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("alert.sqlite3");
    let db_path = db_path.to_str().unwrap().to_string();
    open_connection(&db_path).unwrap();

    let (controller, _bus) = controller(&db_path);
    let zone = zone_with_instant_away_delay();

    controller.on_qualifying_trigger(sensor(1, "front-door"), zone.clone(), ArmState::Away, MonitoringState::Armed, None, Utc::now(), Some(7));

    let conn = open_connection(&db_path).unwrap();
    let alert_id = wait_for(|| AlertRepo::new(&conn).find_open().unwrap().map(|a| a.id));

    // A second sensor in the same open window joins the same alert
    // rather than opening a new one.
    controller.on_qualifying_trigger(sensor(2, "back-door"), zone, ArmState::Away, MonitoringState::Armed, None, Utc::now(), Some(7));
    std::thread::sleep(Duration::from_millis(100));

    let still_open = AlertRepo::new(&conn).find_open().unwrap().unwrap();
    assert_eq!(still_open.id, alert_id);

    let sensors = AlertRepo::new(&conn).sensors_for(alert_id).unwrap();
    assert_eq!(sensors.len(), 2);
}

#[test]
fn disarm_closes_every_open_alert_sensor() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("alert.sqlite3");
    let db_path = db_path.to_str().unwrap().to_string();
    open_connection(&db_path).unwrap();

    let (controller, _bus) = controller(&db_path);
    let zone = zone_with_instant_away_delay();

    controller.on_qualifying_trigger(sensor(1, "front-door"), zone, ArmState::Away, MonitoringState::Armed, None, Utc::now(), Some(7));

    let conn = open_connection(&db_path).unwrap();
    wait_for(|| AlertRepo::new(&conn).find_open().unwrap().map(|a| a.id));

    controller.disarm_all(Utc::now());
    std::thread::sleep(Duration::from_millis(50));

    assert!(AlertRepo::new(&conn).find_open().unwrap().is_none());
}

#[test]
fn a_sabotage_zone_alerts_even_while_disarmed() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("alert.sqlite3");
    let db_path = db_path.to_str().unwrap().to_string();
    open_connection(&db_path).unwrap();

    let (controller, _bus) = controller(&db_path);
    let sabotage_zone = Zone {
        disarmed_delay: Some(0),
        ..zone_with_instant_away_delay()
    };

    controller.on_qualifying_trigger(sensor(1, "tamper"), sabotage_zone, ArmState::Disarm, MonitoringState::Ready, None, Utc::now(), None);

    let conn = open_connection(&db_path).unwrap();
    wait_for(|| AlertRepo::new(&conn).find_open().unwrap().map(|a| a.id));
}
