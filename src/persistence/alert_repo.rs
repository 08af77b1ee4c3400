//! `Alert` / `AlertSensor` repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::alert::Suppression;
use crate::model::{Alert, AlertSensor};

pub struct AlertRepo<'c> {
    conn: &'c Connection,
}

impl<'c> AlertRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        AlertRepo { conn }
    }

    pub fn find_open(&self) -> Result<Option<Alert>, DbError> {
        self.conn
            .query_row(
                "SELECT id, start_time, end_time, silent, arm_id
                 FROM alert WHERE end_time IS NULL LIMIT 1",
                [],
                row_to_alert,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn open(&self, start_time: DateTime<Utc>, arm_id: Option<i64>) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO alert (start_time, end_time, silent, arm_id) VALUES (?1, NULL, 0, ?2)",
            params![start_time.to_rfc3339(), arm_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn close(&self, id: i64, end_time: DateTime<Utc>, silent: bool) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE alert SET end_time = ?2, silent = ?3 WHERE id = ?1",
            params![id, end_time.to_rfc3339(), silent],
        )?;
        // Any AlertSensor row still open when the alert closes is sealed
        // with the alert's own end_time.
        self.conn.execute(
            "UPDATE alert_sensor SET end_time = ?2 WHERE alert_id = ?1 AND end_time IS NULL",
            params![id, end_time.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn add_sensor(&self, row: &AlertSensor) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO alert_sensor
                (alert_id, sensor_id, channel, name, type_id, start_time, end_time, delay,
                 silent, suppression)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(alert_id, sensor_id) DO NOTHING",
            params![
                row.alert_id,
                row.sensor_id,
                row.channel,
                row.name,
                row.type_id,
                row.start_time.to_rfc3339(),
                row.end_time.map(|t| t.to_rfc3339()),
                row.delay as i64,
                row.silent,
                suppression_to_str(row.suppression),
            ],
        )?;
        Ok(())
    }

    pub fn close_sensor(&self, alert_id: i64, sensor_id: i64, end_time: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE alert_sensor SET end_time = ?3 WHERE alert_id = ?1 AND sensor_id = ?2",
            params![alert_id, sensor_id, end_time.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn sensors_for(&self, alert_id: i64) -> Result<Vec<AlertSensor>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT alert_id, sensor_id, channel, name, type_id, start_time, end_time, delay,
                    silent, suppression
             FROM alert_sensor WHERE alert_id = ?1",
        )?;
        let rows = stmt.query_map(params![alert_id], row_to_alert_sensor)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn row_to_alert(row: &Row) -> rusqlite::Result<Alert> {
    let start: String = row.get(1)?;
    let end: Option<String> = row.get(2)?;
    Ok(Alert {
        id: row.get(0)?,
        start_time: parse_ts(&start),
        end_time: end.map(|s| parse_ts(&s)),
        silent: row.get(3)?,
        arm_id: row.get(4)?,
    })
}

fn row_to_alert_sensor(row: &Row) -> rusqlite::Result<AlertSensor> {
    let start: String = row.get(5)?;
    let end: Option<String> = row.get(6)?;
    Ok(AlertSensor {
        alert_id: row.get(0)?,
        sensor_id: row.get(1)?,
        channel: row.get(2)?,
        name: row.get(3)?,
        type_id: row.get(4)?,
        start_time: parse_ts(&start),
        end_time: end.map(|s| parse_ts(&s)),
        delay: row.get::<_, i64>(7)? as u64,
        silent: row.get(8)?,
        suppression: parse_suppression(&row.get::<_, String>(9)?),
    })
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn suppression_to_str(s: Suppression) -> &'static str {
    match s {
        Suppression::Period => "PERIOD",
        Suppression::Threshold => "THRESHOLD",
        Suppression::Instant => "INSTANT",
    }
}

fn parse_suppression(raw: &str) -> Suppression {
    match raw {
        "THRESHOLD" => Suppression::Threshold,
        "INSTANT" => Suppression::Instant,
        _ => Suppression::Period,
    }
}
