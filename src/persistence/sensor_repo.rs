//! `Sensor` repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::{ChannelType, ContactType, EolCount, Sensor};

pub struct SensorRepo<'c> {
    conn: &'c Connection,
}

impl<'c> SensorRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SensorRepo { conn }
    }

    pub fn find_all(&self) -> Result<Vec<Sensor>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, channel, channel_type, contact_type, eol_count, reference_value,
                    alert, error, enabled, silent_alert, monitor_period, monitor_threshold,
                    zone_id, area_id, type_id, name, description, deleted
             FROM sensor WHERE deleted = 0",
        )?;
        let rows = stmt.query_map([], row_to_sensor)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Sensor, DbError> {
        self.conn
            .query_row(
                "SELECT id, channel, channel_type, contact_type, eol_count, reference_value,
                        alert, error, enabled, silent_alert, monitor_period, monitor_threshold,
                        zone_id, area_id, type_id, name, description, deleted
                 FROM sensor WHERE id = ?1",
                params![id],
                row_to_sensor,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("sensor {id}")))
    }

    pub fn find_by_channel(&self, channel: i32) -> Result<Vec<Sensor>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, channel, channel_type, contact_type, eol_count, reference_value,
                    alert, error, enabled, silent_alert, monitor_period, monitor_threshold,
                    zone_id, area_id, type_id, name, description, deleted
             FROM sensor WHERE channel = ?1 AND deleted = 0",
        )?;
        let rows = stmt.query_map(params![channel], row_to_sensor)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn update_reading(&self, id: i64, alert: bool, error: bool) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE sensor SET alert = ?2, error = ?3 WHERE id = ?1",
            params![id, alert, error],
        )?;
        Ok(())
    }

    pub fn set_reference_value(&self, id: i64, reference_value: f64) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE sensor SET reference_value = ?2 WHERE id = ?1",
            params![id, reference_value],
        )?;
        Ok(())
    }

    pub fn soft_delete(&self, id: i64) -> Result<(), DbError> {
        self.conn
            .execute("UPDATE sensor SET deleted = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn row_to_sensor(row: &Row) -> rusqlite::Result<Sensor> {
    Ok(Sensor {
        id: row.get(0)?,
        channel: row.get(1)?,
        channel_type: parse_channel_type(&row.get::<_, String>(2)?),
        contact_type: parse_contact_type(&row.get::<_, String>(3)?),
        eol_count: parse_eol_count(&row.get::<_, String>(4)?),
        reference_value: row.get(5)?,
        alert: row.get(6)?,
        error: row.get(7)?,
        enabled: row.get(8)?,
        silent_alert: row.get(9)?,
        monitor_period: row.get::<_, Option<i64>>(10)?.map(|v| v as u64),
        monitor_threshold: row.get(11)?,
        zone_id: row.get(12)?,
        area_id: row.get(13)?,
        type_id: row.get(14)?,
        name: row.get(15)?,
        description: row.get(16)?,
        deleted: row.get(17)?,
    })
}

fn parse_channel_type(raw: &str) -> ChannelType {
    match raw {
        "BASIC" => ChannelType::Basic,
        "CHANNEL_A" => ChannelType::ChannelA,
        "CHANNEL_B" => ChannelType::ChannelB,
        _ => ChannelType::Normal,
    }
}

fn parse_contact_type(raw: &str) -> ContactType {
    match raw {
        "NO" => ContactType::No,
        _ => ContactType::Nc,
    }
}

fn parse_eol_count(raw: &str) -> EolCount {
    match raw {
        "DOUBLE" => EolCount::Double,
        _ => EolCount::Single,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::db::open_in_memory;

    fn seed(conn: &Connection) {
        conn.execute(
            "INSERT INTO sensor (id, channel, channel_type, contact_type, eol_count, name)
             VALUES (1, 3, 'NORMAL', 'NC', 'SINGLE', 'Front Door')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn find_by_id_round_trips() {
        let conn = open_in_memory().unwrap();
        seed(&conn);
        let repo = SensorRepo::new(&conn);
        let sensor = repo.find_by_id(1).unwrap();
        assert_eq!(sensor.name, "Front Door");
        assert!(!sensor.is_armable());
    }

    #[test]
    fn soft_delete_hides_from_find_all() {
        let conn = open_in_memory().unwrap();
        seed(&conn);
        let repo = SensorRepo::new(&conn);
        repo.soft_delete(1).unwrap();
        assert!(repo.find_all().unwrap().is_empty());
    }
}
