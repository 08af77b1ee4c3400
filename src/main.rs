//! Entry point: wires the subsystems together onto their own
//! threads and blocks until asked to stop (`BusMessage::Stop`).

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use sentinel_monitor::alert::AlertController;
use sentinel_monitor::bus::Bus;
use sentinel_monitor::config::Config;
use sentinel_monitor::coordinator::AreaCoordinator;
use sentinel_monitor::hardware::keypad_reader::MockKeypadReader;
use sentinel_monitor::hardware::output_driver::SimulatedOutputDriver;
use sentinel_monitor::hardware::power_detect::SimulatedPowerDetect;
use sentinel_monitor::hardware::sensor_input::SimulatedSensorInput;
use sentinel_monitor::hardware::{KeypadReader, OutputDriver, PowerDetect, SensorInput};
use sentinel_monitor::ipc::IpcServer;
use sentinel_monitor::keypad::KeypadHandler;
use sentinel_monitor::mqtt::{MqttPublisher, MqttSettings};
use sentinel_monitor::notifier;
use sentinel_monitor::output_signs::OutputSignEngine;
use sentinel_monitor::persistence::area_repo::AreaRepo;
use sentinel_monitor::persistence::sensor_repo::SensorRepo;
use sentinel_monitor::secret;
use sentinel_monitor::sensor_engine::SensorEngine;
use sentinel_monitor::siren::SirenDriver;
use sentinel_monitor::state_store::StateStore;
use sentinel_monitor::supervisor::{HealthMonitor, Heartbeat};

const POWER_POLL_PERIOD: Duration = Duration::from_secs(5);
const WATCHDOG_MAX_AGE: Duration = Duration::from_secs(10);

fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    if !config.use_simulator {
        warn!("USE_SIMULATOR is false but this build only carries simulated hardware backends; running simulated anyway");
    }

    let secret = match secret::load_or_generate(&config.secret_file) {
        Ok(secret) => secret,
        Err(err) => {
            error!("could not load or generate secret: {err}");
            std::process::exit(1);
        }
    };
    let salt = config.salt.clone().unwrap_or_else(|| secret.clone());

    let bus = Bus::new();
    let state_store = StateStore::new(config.status_file.clone(), bus.clone());

    let mqtt = match sentinel_monitor::persistence::open_connection(&config.db_path) {
        Ok(conn) => {
            let mqtt = Arc::new(MqttPublisher::connect(&MqttSettings::load(&conn)));
            for area in AreaRepo::new(&conn).find_all().unwrap_or_default() {
                mqtt.publish_area_config(&area.name);
                mqtt.publish_area_state(&area.name, area.arm_state);
            }
            for sensor in SensorRepo::new(&conn).find_all().unwrap_or_default() {
                if sensor.enabled && !sensor.is_unassigned() {
                    mqtt.publish_sensor_config(sensor.id, &sensor.name);
                }
            }
            mqtt
        }
        Err(err) => {
            error!("could not open/initialize database {}: {err}", config.db_path);
            std::process::exit(1);
        }
    };

    let sensor_input: Arc<Mutex<dyn SensorInput>> = Arc::new(Mutex::new(SimulatedSensorInput::new(config.input_number)));
    let output_driver: Arc<Mutex<dyn OutputDriver>> = Arc::new(Mutex::new(SimulatedOutputDriver::new(config.output_number)));
    let power_detect: Arc<Mutex<dyn PowerDetect>> = Arc::new(Mutex::new(SimulatedPowerDetect::new()));
    let keypad_reader: Box<dyn KeypadReader> = Box::new(MockKeypadReader::new());

    let mut health = HealthMonitor::new();

    let notifier_heartbeat = Heartbeat::new();
    let notifier = notifier::queue::spawn(&config, bus.clone(), notifier_heartbeat.clone());
    health.supervise("notifier", notifier_heartbeat, WATCHDOG_MAX_AGE);

    let siren = Arc::new(SirenDriver::new(0, Arc::clone(&output_driver), bus.clone()));
    let signs = Arc::new(OutputSignEngine::new(Arc::clone(&output_driver), bus.clone()));

    let alert = AlertController::new(
        config.db_path.clone(),
        bus.clone(),
        state_store.clone(),
        notifier.clone(),
        Arc::clone(&siren),
    );

    let sensor_heartbeat = Heartbeat::new();
    health.supervise("sensor_engine", sensor_heartbeat.clone(), WATCHDOG_MAX_AGE);
    let sensor_engine = SensorEngine::new(
        config.clone(),
        Arc::clone(&sensor_input),
        config.db_path.clone(),
        bus.clone(),
        state_store.clone(),
        alert.clone(),
        Arc::clone(&mqtt),
    );
    thread::Builder::new()
        .name("sensor-engine".into())
        .spawn(move || sensor_engine.run(sensor_heartbeat))
        .expect("failed to spawn sensor-engine thread");

    let coordinator_heartbeat = Heartbeat::new();
    health.supervise("coordinator", coordinator_heartbeat.clone(), WATCHDOG_MAX_AGE);
    let coordinator = AreaCoordinator::new(
        config.db_path.clone(),
        bus.clone(),
        state_store.clone(),
        alert,
        Arc::clone(&signs),
        Arc::clone(&mqtt),
    );
    let coordinator_sub = bus.subscribe();
    thread::Builder::new()
        .name("coordinator".into())
        .spawn(move || {
            let sub_rx = coordinator_sub.rx.clone();
            coordinator.run(sub_rx, coordinator_heartbeat)
        })
        .expect("failed to spawn coordinator thread");

    let keypad_heartbeat = Heartbeat::new();
    health.supervise("keypad", keypad_heartbeat.clone(), WATCHDOG_MAX_AGE);
    let mut keypad = KeypadHandler::new(keypad_reader, config.db_path.clone(), salt, bus.clone());
    let keypad_sub = bus.subscribe();
    thread::Builder::new()
        .name("keypad".into())
        .spawn(move || {
            let sub_rx = keypad_sub.rx.clone();
            keypad.run(sub_rx, keypad_heartbeat)
        })
        .expect("failed to spawn keypad thread");

    let ipc_heartbeat = Heartbeat::new();
    health.supervise("ipc", ipc_heartbeat.clone(), WATCHDOG_MAX_AGE);
    let ipc = match IpcServer::new(&config, bus.clone(), state_store.clone(), Arc::clone(&signs), Arc::clone(&siren)) {
        Ok(ipc) => ipc,
        Err(err) => {
            error!("could not initialize ipc server: {err}");
            std::process::exit(1);
        }
    };
    let ipc_sub = bus.subscribe();
    thread::Builder::new()
        .name("ipc".into())
        .spawn(move || {
            let sub_rx = ipc_sub.rx.clone();
            ipc.run(sub_rx, ipc_heartbeat)
        })
        .expect("failed to spawn ipc thread");

    let power_bus = bus.clone();
    let power_state_store = state_store.clone();
    thread::Builder::new()
        .name("power-detect".into())
        .spawn(move || run_power_poll(power_detect, power_bus, power_state_store))
        .expect("failed to spawn power-detect thread");

    info!("sentinel_monitor started");
    health.run();
}

/// Polls mains power presence and fans changes onto the bus.
fn run_power_poll(power_detect: Arc<Mutex<dyn PowerDetect>>, bus: Bus, state_store: StateStore) {
    let mut last = None;
    loop {
        thread::sleep(POWER_POLL_PERIOD);
        let present = {
            let mut guard = match power_detect.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match guard.mains_present() {
                Ok(present) => present,
                Err(err) => {
                    warn!("power detect read failed: {err}");
                    continue;
                }
            }
        };
        if last != Some(present) {
            last = Some(present);
            state_store.set_power(present);
            bus.publish_event(sentinel_monitor::bus::Topic::PowerStateChange, None);
        }
    }
}
