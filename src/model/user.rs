//! User entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Salted+hashed access code.
    pub access_code_hash: String,
    /// Optional four-digit PIN hash.
    pub pin_hash: Option<String>,
    /// One-shot window during which a presented card is bound to this
    /// user instead of being rejected as unknown.
    pub card_registration_expiry: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub deleted: bool,
}

impl User {
    pub fn accepting_card_registration(&self, now: DateTime<Utc>) -> bool {
        matches!(self.card_registration_expiry, Some(expiry) if expiry > now)
    }
}
