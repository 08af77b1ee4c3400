//! `Area` repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::{Area, ArmState};

pub struct AreaRepo<'c> {
    conn: &'c Connection,
}

impl<'c> AreaRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        AreaRepo { conn }
    }

    pub fn find_all(&self) -> Result<Vec<Area>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, arm_state, deleted FROM area WHERE deleted = 0")?;
        let rows = stmt.query_map([], row_to_area)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Area, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, arm_state, deleted FROM area WHERE id = ?1",
                params![id],
                row_to_area,
            )
            .optional()?
            .ok_or_else(|| DbError::NotFound(format!("area {id}")))
    }

    pub fn set_arm_state(&self, id: i64, state: ArmState) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE area SET arm_state = ?2 WHERE id = ?1",
            params![id, arm_state_to_str(state)],
        )?;
        Ok(())
    }
}

fn row_to_area(row: &Row) -> rusqlite::Result<Area> {
    Ok(Area {
        id: row.get(0)?,
        name: row.get(1)?,
        arm_state: parse_arm_state(&row.get::<_, String>(2)?),
        deleted: row.get(3)?,
    })
}

fn arm_state_to_str(state: ArmState) -> &'static str {
    match state {
        ArmState::Away => "AWAY",
        ArmState::Stay => "STAY",
        ArmState::Mixed => "MIXED",
        ArmState::Disarm => "DISARM",
    }
}

fn parse_arm_state(raw: &str) -> ArmState {
    match raw {
        "AWAY" => ArmState::Away,
        "STAY" => ArmState::Stay,
        "MIXED" => ArmState::Mixed,
        _ => ArmState::Disarm,
    }
}
