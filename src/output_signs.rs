//! Output-sign engine. Each configured Output is driven by
//! its own thread; a second START to the same trigger key cancels the
//! previous sign before starting the new one.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Sender};
use dashmap::DashMap;

use crate::bus::{Bus, Topic};
use crate::hardware::OutputDriver;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    Area(i64),
    System,
    Button(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    pub source: TriggerSource,
}

#[derive(Debug, Clone, Copy)]
pub struct SignParams {
    pub channel: i32,
    pub default_state: bool,
    pub delay: Duration,
    /// `None` means "until cancelled" (duration = -1).
    pub duration: Option<Duration>,
}

enum Command {
    Cancel,
}

struct SignHandle {
    cancel_tx: Sender<Command>,
    join: JoinHandle<()>,
}

/// Only one Output may be bound to a given (area, system, button) key
/// at a time; configured bindings are searched linearly since
/// the set of outputs is small and rarely changes.
pub struct OutputSignEngine {
    output: Arc<Mutex<dyn OutputDriver>>,
    bus: Bus,
    running: DashMap<TriggerKey, SignHandle>,
}

impl OutputSignEngine {
    pub fn new(output: Arc<Mutex<dyn OutputDriver>>, bus: Bus) -> Self {
        OutputSignEngine {
            output,
            bus,
            running: DashMap::new(),
        }
    }

    /// START: if a sign is already running for this key, cancel it
    /// first, then start the new one.
    pub fn start(&self, key: TriggerKey, params: SignParams) {
        self.cancel_running(&key);

        let (cancel_tx, cancel_rx) = bounded(1);
        let output = Arc::clone(&self.output);
        let bus = self.bus.clone();
        let join = thread::Builder::new()
            .name("output-sign".into())
            .spawn(move || run_sign(output, bus, params, cancel_rx))
            .expect("failed to spawn output-sign thread");

        self.running.insert(key, SignHandle { cancel_tx, join });
    }

    /// STOP: cancel the sign bound to this key, if any.
    pub fn stop(&self, key: &TriggerKey) {
        self.cancel_running(key);
    }

    fn cancel_running(&self, key: &TriggerKey) {
        if let Some((_, handle)) = self.running.remove(key) {
            let _ = handle.cancel_tx.send(Command::Cancel);
            let _ = handle.join.join();
        }
    }
}

fn run_sign(
    output: Arc<Mutex<dyn OutputDriver>>,
    bus: Bus,
    params: SignParams,
    cancel_rx: crossbeam::channel::Receiver<Command>,
) {
    // default_state -> active after `delay`, polled at 1 Hz granularity.
    // Cancelled before it ever activates: the channel was never
    // touched, so leave it alone.
    if !wait_ticks(&cancel_rx, params.delay) {
        return;
    }

    set_channel(&output, params.channel, !params.default_state);
    bus.publish_event(Topic::OutputStateChange, None);

    match params.duration {
        Some(duration) => {
            wait_ticks(&cancel_rx, duration);
        }
        None => {
            let _ = cancel_rx.recv();
        }
    }

    set_channel(&output, params.channel, params.default_state);
    bus.publish_event(Topic::OutputStateChange, None);
}

/// Returns `true` if the full `total` elapsed without cancellation.
fn wait_ticks(cancel_rx: &crossbeam::channel::Receiver<Command>, total: Duration) -> bool {
    let tick = Duration::from_secs(1);
    let mut remaining = total;
    loop {
        let slice = remaining.min(tick);
        match cancel_rx.recv_timeout(slice) {
            Ok(Command::Cancel) => return false,
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                if remaining <= tick {
                    return true;
                }
                remaining -= tick;
            }
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => return false,
        }
    }
}

fn set_channel(output: &Arc<Mutex<dyn OutputDriver>>, channel: i32, on: bool) {
    if let Ok(mut driver) = output.lock() {
        let _ = driver.set(channel, on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::output_driver::SimulatedOutputDriver;
    use std::time::Duration as StdDuration;

    #[test]
    fn immediate_sign_goes_active_then_returns_to_default() {
        let output: Arc<Mutex<dyn OutputDriver>> = Arc::new(Mutex::new(SimulatedOutputDriver::new(4)));
        let bus = Bus::new();
        let engine = OutputSignEngine::new(Arc::clone(&output), bus);
        let key = TriggerKey {
            source: TriggerSource::Button("bell".into()),
        };
        engine.start(
            key.clone(),
            SignParams {
                channel: 0,
                default_state: false,
                delay: StdDuration::from_secs(0),
                duration: Some(StdDuration::from_millis(50)),
            },
        );
        std::thread::sleep(StdDuration::from_millis(20));
        assert!(output.lock().unwrap().get(0).unwrap());
        std::thread::sleep(StdDuration::from_millis(100));
        assert!(!output.lock().unwrap().get(0).unwrap());
    }

    #[test]
    fn second_start_cancels_first_and_restores_default() {
        let output: Arc<Mutex<dyn OutputDriver>> = Arc::new(Mutex::new(SimulatedOutputDriver::new(4)));
        let bus = Bus::new();
        let engine = OutputSignEngine::new(Arc::clone(&output), bus);
        let key = TriggerKey {
            source: TriggerSource::Area(1),
        };
        engine.start(
            key.clone(),
            SignParams {
                channel: 1,
                default_state: false,
                delay: StdDuration::from_secs(0),
                duration: None,
            },
        );
        std::thread::sleep(StdDuration::from_millis(20));
        engine.start(
            key.clone(),
            SignParams {
                channel: 1,
                default_state: false,
                delay: StdDuration::from_secs(5),
                duration: None,
            },
        );
        std::thread::sleep(StdDuration::from_millis(20));
        // cancelling mid-active returns the channel to default immediately.
        assert!(!output.lock().unwrap().get(1).unwrap());
        engine.stop(&key);
    }
}
