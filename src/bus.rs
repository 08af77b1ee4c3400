//! Message bus. Subsystems register a bounded `crossbeam` channel and
//! get every published `BusMessage`; the coordinator and keypad use it
//! to hand off commands without calling into each other directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

const SUBSCRIBER_QUEUE_DEPTH: usize = 256;

/// Topics an external WebSocket façade (out of scope here) would
/// subscribe to; names these verbatim. The MQTT publisher does not use
/// this bus: it reads state changes directly where they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    AlertStateChange,
    ArmStateChange,
    AreaStateChange,
    SensorsStateChange,
    SensorsErrorChange,
    SyrenStateChange,
    SystemStateChange,
    PowerStateChange,
    OutputStateChange,
    CardRegistered,
    CardRegistrationExpired,
    PublicAccessChange,
}

/// A command routed between subsystems (keypad → coordinator → alert
/// controller, …) or an event published for observers.
#[derive(Debug, Clone)]
pub enum BusMessage {
    ArmAway { keypad_id: Option<i64>, user_id: Option<i64> },
    ArmStay { keypad_id: Option<i64>, user_id: Option<i64> },
    Disarm { keypad_id: Option<i64>, user_id: Option<i64> },
    UpdateConfig,
    UpdateKeypad,
    RegisterCard { keypad_id: Option<i64> },
    Event { topic: Topic, area_id: Option<i64> },
    Stop,
}

/// Shared publish/subscribe hub. Cloning is cheap (`Arc` inside); every
/// clone publishes to the same subscriber set.
#[derive(Clone)]
pub struct Bus {
    subscribers: Arc<DashMap<u64, Sender<BusMessage>>>,
    next_id: Arc<AtomicU64>,
}

pub struct Subscription {
    id: u64,
    bus: Bus,
    pub rx: Receiver<BusMessage>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.subscribers.remove(&self.id);
    }
}

impl Bus {
    pub fn new() -> Self {
        Bus {
            subscribers: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = bounded(SUBSCRIBER_QUEUE_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        Subscription {
            id,
            bus: self.clone(),
            rx,
        }
    }

    /// Fans a message out to every live subscriber. A subscriber whose
    /// queue is full is skipped rather than blocking the publisher;
    /// bus fan-out must never stall the sensor/alert loops.
    pub fn publish(&self, message: BusMessage) {
        self.subscribers.retain(|_, tx| match tx.try_send(message.clone()) {
            Ok(()) => true,
            Err(crossbeam::channel::TrySendError::Full(_)) => true,
            Err(crossbeam::channel::TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn publish_event(&self, topic: Topic, area_id: Option<i64>) {
        self.publish(BusMessage::Event { topic, area_id });
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn every_subscriber_gets_every_message() {
        let bus = Bus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(BusMessage::Disarm {
            keypad_id: None,
            user_id: None,
        });
        assert!(a.rx.recv_timeout(Duration::from_millis(50)).is_ok());
        assert!(b.rx.recv_timeout(Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn dropped_subscription_stops_receiving() {
        let bus = Bus::new();
        {
            let _sub = bus.subscribe();
        }
        assert_eq!(bus.subscribers.len(), 0);
    }
}
