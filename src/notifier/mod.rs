//! Notifier: bounded-retry dispatch across four recipient slots.

pub mod email;
pub mod queue;
pub mod sms;
pub mod templates;
pub mod voice;

pub use queue::{Notification, NotificationType, NotifierHandle, RecipientSlot};
