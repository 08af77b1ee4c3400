//! `Keypad` repository.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::{Keypad, KeypadType};

pub struct KeypadRepo<'c> {
    conn: &'c Connection,
}

impl<'c> KeypadRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        KeypadRepo { conn }
    }

    /// Assumes a single active keypad row ("one logical reader");
    /// returns the first non-deleted one.
    pub fn find_active(&self) -> Result<Option<Keypad>, DbError> {
        self.conn
            .query_row(
                "SELECT id, enabled, keypad_type, deleted FROM keypad WHERE deleted = 0 LIMIT 1",
                [],
                row_to_keypad,
            )
            .optional()
            .map_err(DbError::from)
    }
}

fn row_to_keypad(row: &Row) -> rusqlite::Result<Keypad> {
    Ok(Keypad {
        id: row.get(0)?,
        enabled: row.get(1)?,
        keypad_type: parse_keypad_type(&row.get::<_, String>(2)?),
        deleted: row.get(3)?,
    })
}

fn parse_keypad_type(raw: &str) -> KeypadType {
    match raw {
        "DSC" => KeypadType::Dsc,
        "WIEGAND" => KeypadType::Wiegand,
        _ => KeypadType::Mock,
    }
}
