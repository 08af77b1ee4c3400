//! Connection setup, shared by every `*_repo` module.
//!
//! Schema migrations are out of scope; this only
//! creates tables idempotently so a fresh `DB_PATH` is usable for local
//! development and the integration tests.

use rusqlite::Connection;

use crate::error::DbError;

/// Opens a fresh connection against `path` and ensures the schema
/// exists. Called once per thread; repositories are never shared
/// across threads.
pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// In-memory connection for unit/integration tests.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS zone (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    disarmed_delay INTEGER,
    away_alert_delay INTEGER,
    stay_alert_delay INTEGER,
    away_arm_delay INTEGER,
    stay_arm_delay INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS area (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    arm_state TEXT NOT NULL DEFAULT 'DISARM',
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sensor (
    id INTEGER PRIMARY KEY,
    channel INTEGER NOT NULL DEFAULT -1,
    channel_type TEXT NOT NULL,
    contact_type TEXT NOT NULL,
    eol_count TEXT NOT NULL,
    reference_value REAL,
    alert INTEGER NOT NULL DEFAULT 0,
    error INTEGER NOT NULL DEFAULT 0,
    enabled INTEGER NOT NULL DEFAULT 1,
    silent_alert INTEGER,
    monitor_period INTEGER,
    monitor_threshold REAL,
    zone_id INTEGER,
    area_id INTEGER,
    type_id INTEGER,
    name TEXT NOT NULL,
    description TEXT,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    access_code_hash TEXT NOT NULL,
    pin_hash TEXT,
    card_registration_expiry TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS card (
    id INTEGER PRIMARY KEY,
    card_number_hash TEXT NOT NULL,
    owner INTEGER NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS keypad (
    id INTEGER PRIMARY KEY,
    enabled INTEGER NOT NULL DEFAULT 1,
    keypad_type TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS arm (
    id INTEGER PRIMARY KEY,
    arm_type TEXT NOT NULL,
    time TEXT NOT NULL,
    user_id INTEGER,
    keypad_id INTEGER,
    end_time TEXT
);

CREATE TABLE IF NOT EXISTS disarm (
    id INTEGER PRIMARY KEY,
    time TEXT NOT NULL,
    arm_id INTEGER NOT NULL,
    user_id INTEGER,
    keypad_id INTEGER,
    alert_id INTEGER
);

CREATE TABLE IF NOT EXISTS alert (
    id INTEGER PRIMARY KEY,
    start_time TEXT NOT NULL,
    end_time TEXT,
    silent INTEGER NOT NULL DEFAULT 0,
    arm_id INTEGER
);

CREATE TABLE IF NOT EXISTS alert_sensor (
    alert_id INTEGER NOT NULL,
    sensor_id INTEGER NOT NULL,
    channel INTEGER NOT NULL,
    name TEXT NOT NULL,
    type_id INTEGER,
    start_time TEXT NOT NULL,
    end_time TEXT,
    delay INTEGER NOT NULL,
    silent INTEGER NOT NULL DEFAULT 0,
    suppression TEXT NOT NULL,
    PRIMARY KEY (alert_id, sensor_id)
);

CREATE TABLE IF NOT EXISTS option (
    name TEXT NOT NULL,
    section TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (name, section)
);

CREATE TABLE IF NOT EXISTS output (
    id INTEGER PRIMARY KEY,
    channel INTEGER NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    default_state INTEGER NOT NULL DEFAULT 0,
    delay INTEGER NOT NULL DEFAULT 0,
    duration INTEGER NOT NULL DEFAULT -1,
    trigger_type TEXT NOT NULL,
    area_id INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0
);
"#;
