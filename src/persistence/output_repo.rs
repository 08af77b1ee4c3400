//! `Output` repository. Only one Output may be bound to a
//! given (area, system, button) key at a time; lookups are linear over
//! the small configured set.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::output::{Output, OutputTriggerType};

pub struct OutputRepo<'c> {
    conn: &'c Connection,
}

impl<'c> OutputRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        OutputRepo { conn }
    }

    pub fn find_all(&self) -> Result<Vec<Output>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, channel, enabled, default_state, delay, duration, trigger_type, area_id, deleted
             FROM output WHERE deleted = 0",
        )?;
        let rows = stmt.query_map([], row_to_output)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_by_button(&self, output_id: i64) -> Result<Option<Output>, DbError> {
        self.conn
            .query_row(
                "SELECT id, channel, enabled, default_state, delay, duration, trigger_type, area_id, deleted
                 FROM output WHERE id = ?1 AND deleted = 0",
                params![output_id],
                row_to_output,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn find_by_area(&self, area_id: i64) -> Result<Option<Output>, DbError> {
        self.conn
            .query_row(
                "SELECT id, channel, enabled, default_state, delay, duration, trigger_type, area_id, deleted
                 FROM output WHERE area_id = ?1 AND deleted = 0",
                params![area_id],
                row_to_output,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn find_system(&self) -> Result<Option<Output>, DbError> {
        self.conn
            .query_row(
                "SELECT id, channel, enabled, default_state, delay, duration, trigger_type, area_id, deleted
                 FROM output WHERE trigger_type = 'SYSTEM' AND deleted = 0",
                [],
                row_to_output,
            )
            .optional()
            .map_err(DbError::from)
    }
}

fn row_to_output(row: &Row) -> rusqlite::Result<Output> {
    Ok(Output {
        id: row.get(0)?,
        channel: row.get(1)?,
        enabled: row.get(2)?,
        default_state: row.get(3)?,
        delay: row.get::<_, i64>(4)? as u64,
        duration: match row.get::<_, i64>(5)? {
            -1 => None,
            secs => Some(secs as u64),
        },
        trigger_type: parse_trigger_type(&row.get::<_, String>(6)?),
        area_id: row.get(7)?,
        deleted: row.get(8)?,
    })
}

fn parse_trigger_type(raw: &str) -> OutputTriggerType {
    match raw {
        "AREA" => OutputTriggerType::Area,
        "SYSTEM" => OutputTriggerType::System,
        _ => OutputTriggerType::Button,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::db::open_in_memory;

    #[test]
    fn button_output_round_trips() {
        let conn = open_in_memory().unwrap();
        conn.execute(
            "INSERT INTO output (id, channel, enabled, default_state, delay, duration, trigger_type, area_id)
             VALUES (1, 2, 1, 0, 0, -1, 'BUTTON', NULL)",
            [],
        )
        .unwrap();
        let repo = OutputRepo::new(&conn);
        let output = repo.find_by_button(1).unwrap().unwrap();
        assert_eq!(output.channel, 2);
        assert_eq!(output.duration, None);
    }
}
