//! Unbounded retry queue. One background thread owns the queue; producers
//! hand in notifications over a channel via `NotifierHandle`.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam::channel::{unbounded, Receiver, Select, Sender};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde_json::Value;

use crate::bus::{Bus, BusMessage};
use crate::config::Config;
use crate::notifier::{email, sms, templates};
use crate::persistence::db::open_connection;
use crate::persistence::option_repo::OptionRepo;

pub const MAX_RETRY: u32 = 5;
pub const RETRY_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    AlertStarted,
    AlertStopped,
    PowerOutageStarted,
    PowerOutageStopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientSlot {
    Sms1,
    Sms2,
    Email1,
    Email2,
}

const ALL_SLOTS: [RecipientSlot; 4] = [
    RecipientSlot::Sms1,
    RecipientSlot::Sms2,
    RecipientSlot::Email1,
    RecipientSlot::Email2,
];

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub notification_type: NotificationType,
    pub sensors: Vec<String>,
    pub time: DateTime<Utc>,
    pub retry: u32,
    pub last_try: Option<Instant>,
    /// `Some(true)` sent, `Some(false)` failed (owed a retry), `None`
    /// unsubscribed (no retry owed). Absent entry means "not attempted yet".
    pub status: HashMap<RecipientSlot, Option<bool>>,
}

impl Notification {
    pub fn new(id: i64, notification_type: NotificationType, sensors: Vec<String>, time: DateTime<Utc>) -> Self {
        Notification {
            id,
            notification_type,
            sensors,
            time,
            retry: 0,
            last_try: None,
            status: HashMap::new(),
        }
    }

    /// A notification is "processed" when every slot is true or null.
    pub fn is_processed(&self) -> bool {
        ALL_SLOTS
            .iter()
            .all(|slot| matches!(self.status.get(slot), Some(Some(true)) | Some(None)))
    }

    fn due_for_retry(&self, now: Instant) -> bool {
        match self.last_try {
            None => true,
            Some(last) => now.duration_since(last) >= RETRY_WAIT,
        }
    }
}

/// Per-recipient contact info and subscription table, sourced from the
/// `notifications` Option rows (`subscriptions`, `email`, `gsm` sections).
#[derive(Debug, Clone, Default)]
pub struct Recipients {
    pub sms1: Option<String>,
    pub sms2: Option<String>,
    pub email1: Option<String>,
    pub email2: Option<String>,
    pub subscribed: HashMap<(RecipientSlot, NotificationKindKey), bool>,
}

/// `NotificationType` is not `Eq`-able across the enum boundary from
/// HashMap's perspective without this; kept as a thin newtype rather
/// than deriving more on `NotificationType` than the domain needs.
pub type NotificationKindKey = NotificationType;

impl Recipients {
    pub fn is_subscribed(&self, slot: RecipientSlot, kind: NotificationType) -> bool {
        self.subscribed.get(&(slot, kind)).copied().unwrap_or(false)
    }

    fn address_for(&self, slot: RecipientSlot) -> Option<&str> {
        match slot {
            RecipientSlot::Sms1 => self.sms1.as_deref(),
            RecipientSlot::Sms2 => self.sms2.as_deref(),
            RecipientSlot::Email1 => self.email1.as_deref(),
            RecipientSlot::Email2 => self.email2.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

pub enum Command {
    Enqueue(Notification),
    UpdateRecipients(Recipients),
    Stop,
}

#[derive(Clone)]
pub struct NotifierHandle {
    tx: Sender<Command>,
}

impl NotifierHandle {
    pub fn enqueue(&self, notification: Notification) {
        let _ = self.tx.send(Command::Enqueue(notification));
    }

    pub fn update_recipients(&self, recipients: Recipients) {
        let _ = self.tx.send(Command::UpdateRecipients(recipients));
    }

    pub fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }
}

#[cfg(test)]
pub fn test_handle() -> NotifierHandle {
    let (tx, _rx) = unbounded();
    NotifierHandle { tx }
}

/// Spawns the notifier thread and returns a handle to enqueue work.
/// Subscribes to `bus` so a `BusMessage::UpdateConfig` reloads recipients
/// and SMTP settings from the database without a restart.
pub fn spawn(config: &Config, bus: Bus, heartbeat: crate::supervisor::Heartbeat) -> NotifierHandle {
    let (tx, rx) = unbounded();
    let gsm_port = config.gsm_port.clone();
    let gsm_baud = config.gsm_port_baud;
    let db_path = config.db_path.clone();
    let config_sub = bus.subscribe();
    thread::Builder::new()
        .name("notifier".into())
        .spawn(move || {
            let config_rx = config_sub.rx.clone();
            run(rx, config_rx, db_path, gsm_port, gsm_baud, heartbeat)
        })
        .expect("failed to spawn notifier thread");
    NotifierHandle { tx }
}

fn run(
    rx: Receiver<Command>,
    config_rx: Receiver<BusMessage>,
    db_path: String,
    gsm_port: Option<String>,
    gsm_baud: u32,
    heartbeat: crate::supervisor::Heartbeat,
) {
    let mut queue: Vec<Notification> = Vec::new();
    let (mut recipients, mut smtp) = load_from_db(&db_path);
    let mut modem = sms::GsmModem::new(gsm_port, gsm_baud);

    'outer: loop {
        heartbeat.beat();

        let mut select = Select::new();
        let cmd_idx = select.recv(&rx);
        let cfg_idx = select.recv(&config_rx);
        match select.select_timeout(RETRY_WAIT) {
            Ok(op) if op.index() == cmd_idx => match op.recv(&rx) {
                Ok(Command::Enqueue(notification)) => queue.push(notification),
                Ok(Command::UpdateRecipients(new)) => recipients = new,
                Ok(Command::Stop) | Err(_) => break 'outer,
            },
            Ok(op) if op.index() == cfg_idx => match op.recv(&config_rx) {
                Ok(BusMessage::UpdateConfig) => {
                    let (new_recipients, new_smtp) = load_from_db(&db_path);
                    recipients = new_recipients;
                    smtp = new_smtp;
                    info!("notifier reloaded recipients and SMTP settings after a config update");
                }
                Ok(BusMessage::Stop) => break 'outer,
                Ok(_) => {}
                Err(_) => break 'outer,
            },
            Ok(_) => unreachable!("only two operations are registered"),
            Err(_) => {}
        }

        let now = Instant::now();
        queue.retain_mut(|notification| {
            if notification.is_processed() {
                debug!("notification {} fully processed", notification.id);
                return false;
            }
            if notification.retry >= MAX_RETRY {
                warn!("dropping notification {} after {} retries", notification.id, MAX_RETRY);
                return false;
            }
            if !notification.due_for_retry(now) {
                return true;
            }

            dispatch(notification, &recipients, &smtp, &mut modem);
            notification.retry += 1;
            notification.last_try = Some(now);
            true
        });
    }
    info!("notifier stopped");
}

/// Loads recipient addresses/subscriptions and SMTP credentials from the
/// `smtp`, `gsm` and `subscriptions` Option rows. Missing rows (or a
/// database that can't be opened) fall back to all-unsubscribed defaults,
/// same as a fresh install with nothing configured yet.
fn load_from_db(db_path: &str) -> (Recipients, SmtpSettings) {
    match open_connection(db_path) {
        Ok(conn) => (load_recipients(&conn), load_smtp_settings(&conn)),
        Err(err) => {
            warn!("notifier could not open database to load recipients: {err}");
            (Recipients::default(), SmtpSettings::default())
        }
    }
}

fn load_recipients(conn: &Connection) -> Recipients {
    let repo = OptionRepo::new(conn);
    let smtp_option = repo.get("smtp", "smtp").ok().flatten();
    let gsm_option = repo.get("gsm", "gsm").ok().flatten();
    let subs_option = repo.get("subscriptions", "subscriptions").ok().flatten();

    let mut recipients = Recipients {
        sms1: gsm_option.as_ref().and_then(|o| str_field(&o.value, "phone_number_1")),
        sms2: gsm_option.as_ref().and_then(|o| str_field(&o.value, "phone_number_2")),
        email1: smtp_option.as_ref().and_then(|o| str_field(&o.value, "email_address_1")),
        email2: smtp_option.as_ref().and_then(|o| str_field(&o.value, "email_address_2")),
        subscribed: HashMap::new(),
    };

    if let Some(option) = &subs_option {
        const SLOTS: [(RecipientSlot, &str); 4] = [
            (RecipientSlot::Sms1, "sms1"),
            (RecipientSlot::Sms2, "sms2"),
            (RecipientSlot::Email1, "email1"),
            (RecipientSlot::Email2, "email2"),
        ];
        const KINDS: [(NotificationType, &str); 4] = [
            (NotificationType::AlertStarted, "alert_started"),
            (NotificationType::AlertStopped, "alert_stopped"),
            (NotificationType::PowerOutageStarted, "power_outage_started"),
            (NotificationType::PowerOutageStopped, "power_outage_stopped"),
        ];
        for (slot, slot_key) in SLOTS {
            for (kind, kind_key) in KINDS {
                let flag = option
                    .value
                    .get(slot_key)
                    .and_then(|s| s.get(kind_key))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                recipients.subscribed.insert((slot, kind), flag);
            }
        }
    }
    recipients
}

fn load_smtp_settings(conn: &Connection) -> SmtpSettings {
    match OptionRepo::new(conn).get("smtp", "smtp").ok().flatten() {
        Some(option) => SmtpSettings {
            username: str_field(&option.value, "smtp_username"),
            password: str_field(&option.value, "smtp_password"),
            from_address: str_field(&option.value, "smtp_username"),
        },
        None => SmtpSettings::default(),
    }
}

fn str_field(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn dispatch(
    notification: &mut Notification,
    recipients: &Recipients,
    smtp: &SmtpSettings,
    modem: &mut sms::GsmModem,
) {
    for &slot in &ALL_SLOTS {
        if matches!(notification.status.get(&slot), Some(Some(true)) | Some(None)) {
            continue;
        }
        if !recipients.is_subscribed(slot, notification.notification_type) {
            notification.status.insert(slot, None);
            continue;
        }
        let address = recipients.address_for(slot);
        let sent = match (slot, address) {
            (RecipientSlot::Sms1 | RecipientSlot::Sms2, Some(number)) => {
                let body = message_for_sms(notification);
                modem.send_sms(number, &body).is_ok()
            }
            (RecipientSlot::Email1 | RecipientSlot::Email2, Some(address)) => {
                let (subject, body) = message_for_email(notification);
                email::send(smtp, address, &subject, &body).is_ok()
            }
            _ => false,
        };
        notification.status.insert(slot, Some(sent));
    }
}

fn message_for_sms(notification: &Notification) -> String {
    let time = notification.time.to_rfc3339();
    match notification.notification_type {
        NotificationType::AlertStarted => templates::alert_started_sms(&notification.sensors, &time),
        NotificationType::AlertStopped => templates::alert_stopped_sms(&time),
        NotificationType::PowerOutageStarted => templates::power_outage_started_sms(),
        NotificationType::PowerOutageStopped => templates::power_outage_stopped_sms(),
    }
}

fn message_for_email(notification: &Notification) -> (String, String) {
    let time = notification.time.to_rfc3339();
    match notification.notification_type {
        NotificationType::AlertStarted => templates::alert_started_email(&notification.sensors, &time),
        NotificationType::AlertStopped => templates::alert_stopped_email(&time),
        NotificationType::PowerOutageStarted => {
            ("Power outage".to_string(), templates::power_outage_started_sms())
        }
        NotificationType::PowerOutageStopped => {
            ("Power restored".to_string(), templates::power_outage_stopped_sms())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification::new(1, NotificationType::AlertStarted, vec!["Front Door".into()], Utc::now())
    }

    #[test]
    fn unprocessed_until_every_slot_settles() {
        let n = notification();
        assert!(!n.is_processed());
    }

    #[test]
    fn null_status_counts_as_processed() {
        let mut n = notification();
        for slot in ALL_SLOTS {
            n.status.insert(slot, None);
        }
        assert!(n.is_processed());
    }

    #[test]
    fn mixed_true_and_null_is_processed() {
        let mut n = notification();
        n.status.insert(RecipientSlot::Sms1, Some(true));
        n.status.insert(RecipientSlot::Sms2, None);
        n.status.insert(RecipientSlot::Email1, Some(true));
        n.status.insert(RecipientSlot::Email2, None);
        assert!(n.is_processed());
    }

    #[test]
    fn outstanding_failure_is_not_processed() {
        let mut n = notification();
        n.status.insert(RecipientSlot::Sms1, Some(false));
        assert!(!n.is_processed());
    }

    #[test]
    fn retry_not_due_immediately_after_attempt() {
        let mut n = notification();
        n.last_try = Some(Instant::now());
        assert!(!n.due_for_retry(Instant::now()));
    }
}
