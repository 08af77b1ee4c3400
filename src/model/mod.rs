//! Domain entities. Plain structs, `serde`-tagged for IPC,
//! WebSocket and MQTT payloads; persisted by `crate::persistence`.

pub mod alert;
pub mod area;
pub mod arm_disarm;
pub mod card;
pub mod keypad;
pub mod option;
pub mod output;
pub mod sensor;
pub mod user;
pub mod zone;

pub use alert::{Alert, AlertSensor};
pub use area::{Area, ArmState};
pub use arm_disarm::{Arm, ArmType, Disarm};
pub use card::Card;
pub use keypad::{Keypad, KeypadType};
pub use option::Option as OptionRow;
pub use output::{Output, OutputTriggerType};
pub use sensor::{ChannelType, ContactType, EolCount, Sensor};
pub use user::User;
pub use zone::Zone;
