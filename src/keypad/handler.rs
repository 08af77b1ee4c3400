//! Per-keypad state machine. Polls the reader at a fixed
//! communication period, accumulates digits, manages the card
//! registration window, and emits bus commands rather than calling the
//! coordinator directly; the bus stays the single hand-off point.

use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};

use crate::bus::{Bus, BusMessage, Topic};
use crate::hardware::KeypadReader;
use crate::keypad::decode::{decode, KeypadEvent};
use crate::persistence::card_repo::CardRepo;
use crate::persistence::db::open_connection;
use crate::persistence::user_repo::UserRepo;
use crate::secret::hash_access_code;

const COMMUNICATION_PERIOD: Duration = Duration::from_millis(200);
const DIGIT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const ACCESS_CODE_LEN: usize = 4;
const CARD_REGISTRATION_EXPIRY: Duration = Duration::from_secs(120);

/// Entry/exit-delay feedback cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Normal,
    Last5Secs,
    NoDelay,
    Error,
}

pub struct KeypadHandler {
    reader: Box<dyn KeypadReader>,
    db_path: String,
    salt: String,
    bus: Bus,
    presses: String,
    last_press: Instant,
    registration_open_until: Option<Instant>,
}

impl KeypadHandler {
    pub fn new(reader: Box<dyn KeypadReader>, db_path: String, salt: String, bus: Bus) -> Self {
        KeypadHandler {
            reader,
            db_path,
            salt,
            bus,
            presses: String::new(),
            last_press: Instant::now(),
            registration_open_until: None,
        }
    }

    pub fn open_registration_window(&mut self) {
        self.registration_open_until = Some(Instant::now() + CARD_REGISTRATION_EXPIRY);
    }

    /// Blocking main loop; run this on its own thread.
    pub fn run(&mut self, sub_rx: crossbeam::channel::Receiver<BusMessage>, heartbeat: crate::supervisor::Heartbeat) {
        loop {
            heartbeat.beat();
            match sub_rx.recv_timeout(COMMUNICATION_PERIOD) {
                Ok(BusMessage::Stop) => break,
                Ok(BusMessage::RegisterCard { .. }) => self.open_registration_window(),
                Ok(_) => {}
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
            }

            self.tick();
        }
    }

    fn tick(&mut self) {
        if self.registration_open_until.is_some_and(|deadline| Instant::now() > deadline) {
            self.registration_open_until = None;
            self.bus.publish_event(Topic::CardRegistrationExpired, None);
        }

        if !self.presses.is_empty() && self.last_press.elapsed() > DIGIT_IDLE_TIMEOUT {
            debug!("cleared digit entry after idle timeout");
            self.presses.clear();
        }

        let frame = match self.reader.poll() {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(err) => {
                warn!("keypad poll failed: {err}");
                return;
            }
        };

        let Some(event) = decode(frame) else {
            return;
        };

        match event {
            KeypadEvent::Card(card_number) => self.handle_card(&card_number),
            KeypadEvent::Function('#') => self.publish_arm(true),
            KeypadEvent::Function('*') => self.publish_arm(false),
            KeypadEvent::Function(_) => {}
            KeypadEvent::Digit(d) => self.handle_digit(d),
        }
    }

    fn handle_digit(&mut self, digit: char) {
        self.presses.push(digit);
        self.last_press = Instant::now();
        if self.presses.len() < ACCESS_CODE_LEN {
            return;
        }
        let code = std::mem::take(&mut self.presses);
        self.handle_access_code(&code);
    }

    fn handle_access_code(&self, code: &str) {
        let Ok(conn) = open_connection(&self.db_path) else {
            return;
        };
        let hash = hash_access_code(code, &self.salt);
        let repo = UserRepo::new(&conn);
        match repo.find_by_access_code_hash(&hash) {
            Ok(Some(user)) => {
                info!("access code accepted for user {}", user.id);
                self.bus.publish(BusMessage::Disarm {
                    keypad_id: None,
                    user_id: Some(user.id),
                });
            }
            _ => {
                debug!("access code rejected");
            }
        }
    }

    fn handle_card(&mut self, card_number: &str) {
        let Ok(conn) = open_connection(&self.db_path) else {
            return;
        };
        let hash = hash_access_code(card_number, &self.salt);

        if self.registration_open_until.is_some() {
            let user_repo = UserRepo::new(&conn);
            let card_repo = CardRepo::new(&conn);
            if card_repo.find_by_number_hash(&hash).ok().flatten().is_none() {
                if let Ok(users) = user_repo.find_all() {
                    let now = Utc::now();
                    if let Some(owner) = users.iter().find(|u| u.accepting_card_registration(now)) {
                        if card_repo.insert(&hash, owner.id).is_ok() {
                            self.registration_open_until = None;
                            self.bus.publish_event(Topic::CardRegistered, Some(owner.id));
                            return;
                        }
                    }
                }
            }
        }

        let card_repo = CardRepo::new(&conn);
        if let Ok(Some(_card)) = card_repo.find_by_number_hash(&hash) {
            self.bus.publish(BusMessage::Disarm {
                keypad_id: None,
                user_id: None,
            });
        }
    }

    fn publish_arm(&self, away: bool) {
        let message = if away {
            BusMessage::ArmAway {
                keypad_id: None,
                user_id: None,
            }
        } else {
            BusMessage::ArmStay {
                keypad_id: None,
                user_id: None,
            }
        };
        self.bus.publish(message);
    }
}

/// Which feedback cadence applies at `elapsed` into a `total`-second
/// delay.
pub fn feedback_for(elapsed: Duration, total: Duration) -> Feedback {
    if elapsed >= total {
        Feedback::NoDelay
    } else if total - elapsed <= Duration::from_secs(5) {
        Feedback::Last5Secs
    } else {
        Feedback::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_escalates_in_the_last_five_seconds() {
        let total = Duration::from_secs(10);
        assert_eq!(feedback_for(Duration::from_secs(0), total), Feedback::Normal);
        assert_eq!(feedback_for(Duration::from_secs(6), total), Feedback::Last5Secs);
        assert_eq!(feedback_for(Duration::from_secs(10), total), Feedback::NoDelay);
    }
}
