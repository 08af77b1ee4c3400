//! `Arm` / `Disarm` repository. Exactly one open `Arm` row (an
//! `end_time IS NULL` row) exists at a time.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::arm_disarm::{Arm, ArmType, Disarm};

pub struct ArmRepo<'c> {
    conn: &'c Connection,
}

impl<'c> ArmRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        ArmRepo { conn }
    }

    pub fn find_open(&self) -> Result<Option<Arm>, DbError> {
        self.conn
            .query_row(
                "SELECT id, arm_type, time, user_id, keypad_id
                 FROM arm WHERE end_time IS NULL LIMIT 1",
                [],
                row_to_arm,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn open(
        &self,
        arm_type: ArmType,
        time: DateTime<Utc>,
        user_id: Option<i64>,
        keypad_id: Option<i64>,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO arm (arm_type, time, user_id, keypad_id, end_time)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![arm_type_to_str(arm_type), time.to_rfc3339(), user_id, keypad_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn close(&self, id: i64, end_time: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE arm SET end_time = ?2 WHERE id = ?1",
            params![id, end_time.to_rfc3339()],
        )?;
        Ok(())
    }
}

pub struct DisarmRepo<'c> {
    conn: &'c Connection,
}

impl<'c> DisarmRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        DisarmRepo { conn }
    }

    pub fn create(
        &self,
        time: DateTime<Utc>,
        arm_id: i64,
        user_id: Option<i64>,
        keypad_id: Option<i64>,
        alert_id: Option<i64>,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO disarm (time, arm_id, user_id, keypad_id, alert_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![time.to_rfc3339(), arm_id, user_id, keypad_id, alert_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn row_to_arm(row: &Row) -> rusqlite::Result<Arm> {
    let time: String = row.get(2)?;
    Ok(Arm {
        id: row.get(0)?,
        arm_type: parse_arm_type(&row.get::<_, String>(1)?),
        time: parse_ts(&time),
        user_id: row.get(3)?,
        keypad_id: row.get(4)?,
    })
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn arm_type_to_str(t: ArmType) -> &'static str {
    match t {
        ArmType::Away => "AWAY",
        ArmType::Stay => "STAY",
    }
}

fn parse_arm_type(raw: &str) -> ArmType {
    match raw {
        "STAY" => ArmType::Stay,
        _ => ArmType::Away,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::db::open_in_memory;

    #[test]
    fn open_arm_round_trips_and_closes() {
        let conn = open_in_memory().unwrap();
        let repo = ArmRepo::new(&conn);
        let now = Utc::now();
        let id = repo.open(ArmType::Away, now, None, None).unwrap();
        let open = repo.find_open().unwrap().unwrap();
        assert_eq!(open.id, id);
        repo.close(id, now).unwrap();
        assert!(repo.find_open().unwrap().is_none());
    }

    #[test]
    fn disarm_links_back_to_its_arm() {
        let conn = open_in_memory().unwrap();
        let arm_repo = ArmRepo::new(&conn);
        let disarm_repo = DisarmRepo::new(&conn);
        let arm_id = arm_repo.open(ArmType::Stay, Utc::now(), None, None).unwrap();
        let disarm_id = disarm_repo.create(Utc::now(), arm_id, None, None, None).unwrap();
        assert!(disarm_id > 0);
    }
}
