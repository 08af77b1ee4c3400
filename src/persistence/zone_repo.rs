//! `Zone` repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::Zone;

pub struct ZoneRepo<'c> {
    conn: &'c Connection,
}

impl<'c> ZoneRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        ZoneRepo { conn }
    }

    pub fn find_all(&self) -> Result<Vec<Zone>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, disarmed_delay, away_alert_delay, stay_alert_delay,
                    away_arm_delay, stay_arm_delay, deleted
             FROM zone WHERE deleted = 0",
        )?;
        let rows = stmt.query_map([], row_to_zone)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Zone, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, disarmed_delay, away_alert_delay, stay_alert_delay,
                        away_arm_delay, stay_arm_delay, deleted
                 FROM zone WHERE id = ?1",
                params![id],
                row_to_zone,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("zone {id}")))
    }

    pub fn soft_delete(&self, id: i64) -> Result<(), DbError> {
        self.conn
            .execute("UPDATE zone SET deleted = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }
}

fn row_to_zone(row: &Row) -> rusqlite::Result<Zone> {
    Ok(Zone {
        id: row.get(0)?,
        name: row.get(1)?,
        disarmed_delay: row.get::<_, Option<i64>>(2)?.map(|v| v as u64),
        away_alert_delay: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
        stay_alert_delay: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        away_arm_delay: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        stay_arm_delay: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
        deleted: row.get(7)?,
    })
}
