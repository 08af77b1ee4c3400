//! `Option` repository: keyed configuration blobs (dyndns, SSH,
//! MQTT, SMTP, GSM, subscriptions, syren, sensitivity).

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::DbError;
use crate::model::option::Option as OptionRow;

pub struct OptionRepo<'c> {
    conn: &'c Connection,
}

impl<'c> OptionRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        OptionRepo { conn }
    }

    pub fn get(&self, name: &str, section: &str) -> Result<Option<OptionRow>, DbError> {
        self.conn
            .query_row(
                "SELECT name, section, value FROM option WHERE name = ?1 AND section = ?2",
                params![name, section],
                |row| {
                    let raw: String = row.get(2)?;
                    Ok(OptionRow {
                        name: row.get(0)?,
                        section: row.get(1)?,
                        value: serde_json::from_str(&raw).unwrap_or(Value::Null),
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn set(&self, name: &str, section: &str, value: &Value) -> Result<(), DbError> {
        let raw = serde_json::to_string(value).map_err(|e| DbError::MalformedOption {
            name: name.to_string(),
            section: section.to_string(),
            reason: e.to_string(),
        })?;
        self.conn.execute(
            "INSERT INTO option (name, section, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(name, section) DO UPDATE SET value = excluded.value",
            params![name, section, raw],
        )?;
        Ok(())
    }
}
