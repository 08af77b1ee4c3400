//! Persistence layer (ambient). One
//! `rusqlite::Connection` per thread, never shared, exposed through a
//! typed `XRepo` per entity.

pub mod alert_repo;
pub mod area_repo;
pub mod arm_repo;
pub mod card_repo;
pub mod db;
pub mod keypad_repo;
pub mod option_repo;
pub mod output_repo;
pub mod sensor_repo;
pub mod user_repo;
pub mod zone_repo;

pub use db::open_connection;
