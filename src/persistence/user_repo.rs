//! `User` repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::User;

pub struct UserRepo<'c> {
    conn: &'c Connection,
}

impl<'c> UserRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        UserRepo { conn }
    }

    pub fn find_all(&self) -> Result<Vec<User>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, access_code_hash, pin_hash, card_registration_expiry,
                    enabled, deleted
             FROM user WHERE deleted = 0",
        )?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_by_access_code_hash(&self, hash: &str) -> Result<Option<User>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, access_code_hash, pin_hash, card_registration_expiry,
                        enabled, deleted
                 FROM user WHERE access_code_hash = ?1 AND enabled = 1 AND deleted = 0",
                params![hash],
                row_to_user,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn set_card_registration_expiry(
        &self,
        id: i64,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE user SET card_registration_expiry = ?2 WHERE id = ?1",
            params![id, expiry.map(|t| t.to_rfc3339())],
        )?;
        Ok(())
    }
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    let expiry: Option<String> = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        access_code_hash: row.get(2)?,
        pin_hash: row.get(3)?,
        card_registration_expiry: expiry.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|t| t.with_timezone(&Utc))),
        enabled: row.get(5)?,
        deleted: row.get(6)?,
    })
}
