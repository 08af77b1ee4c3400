//! Card entity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub card_number_hash: String,
    pub owner: i64,
    pub enabled: bool,
    pub deleted: bool,
}
