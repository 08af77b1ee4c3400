//! `Card` repository.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;
use crate::model::Card;

pub struct CardRepo<'c> {
    conn: &'c Connection,
}

impl<'c> CardRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        CardRepo { conn }
    }

    pub fn find_by_number_hash(&self, hash: &str) -> Result<Option<Card>, DbError> {
        self.conn
            .query_row(
                "SELECT id, card_number_hash, owner, enabled, deleted
                 FROM card WHERE card_number_hash = ?1 AND enabled = 1 AND deleted = 0",
                params![hash],
                row_to_card,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn insert(&self, card_number_hash: &str, owner: i64) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO card (card_number_hash, owner) VALUES (?1, ?2)",
            params![card_number_hash, owner],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        card_number_hash: row.get(1)?,
        owner: row.get(2)?,
        enabled: row.get(3)?,
        deleted: row.get(4)?,
    })
}
