//! Siren driver. At most one active run; resolution
//! precedence is caller override < database `syren/timing` option <
//! built-in default, modeled as `Option<T>::or` chains.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Sender};
use serde_json::Value;

use crate::bus::{Bus, Topic};
use crate::hardware::OutputDriver;

/// `duration = 0` in the database means "run until stopped"; modeled as
/// its own variant so that meaning can never be confused with an actual
/// zero-length run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SirenDuration {
    UntilStopped,
    For(Duration),
}

impl SirenDuration {
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            SirenDuration::UntilStopped
        } else {
            SirenDuration::For(Duration::from_secs(secs))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SirenParams {
    pub silent: bool,
    pub delay: Duration,
    pub duration: SirenDuration,
}

impl Default for SirenParams {
    fn default() -> Self {
        SirenParams {
            silent: false,
            delay: Duration::from_secs(0),
            duration: SirenDuration::UntilStopped,
        }
    }
}

/// `syren/timing` option row as read from the database, all fields
/// optional so an absent option falls back to `SirenParams::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SirenOption {
    pub silent: Option<bool>,
    pub delay_secs: Option<u64>,
    pub duration_secs: Option<u64>,
}

impl SirenOption {
    pub fn from_json(value: &Value) -> Self {
        SirenOption {
            silent: value.get("silent").and_then(Value::as_bool),
            delay_secs: value.get("delay").and_then(Value::as_u64),
            duration_secs: value.get("duration").and_then(Value::as_u64),
        }
    }
}

/// Resolves `syren.silent` against the derived per-sensor silent flag.
pub fn resolve_silent(syren_silent: Option<bool>, sensors_silent: bool) -> bool {
    match syren_silent {
        None => sensors_silent,
        Some(true) => sensors_silent,
        Some(false) => false,
    }
}

/// Resolves the effective run parameters: caller override, then the
/// database option, then the built-in default.
pub fn resolve_params(
    caller_silent: Option<bool>,
    caller_delay: Option<Duration>,
    caller_duration: Option<SirenDuration>,
    option: SirenOption,
    sensors_silent: bool,
) -> SirenParams {
    let defaults = SirenParams::default();
    let option_silent = option.silent;
    let silent_input = caller_silent.or(option_silent);
    let silent = resolve_silent(silent_input, sensors_silent);
    let delay = caller_delay
        .or_else(|| option.delay_secs.map(Duration::from_secs))
        .unwrap_or(defaults.delay);
    let duration = caller_duration
        .or_else(|| option.duration_secs.map(SirenDuration::from_secs))
        .unwrap_or(defaults.duration);
    SirenParams {
        silent,
        delay,
        duration,
    }
}

enum Command {
    Stop,
}

/// Drives the single siren output channel. Only ever one run active;
/// starting a new one implicitly cancels any prior run.
pub struct SirenDriver {
    channel: i32,
    output: Arc<Mutex<dyn OutputDriver>>,
    bus: Bus,
    active: Mutex<Option<(Sender<Command>, JoinHandle<()>)>>,
}

impl SirenDriver {
    pub fn new(channel: i32, output: Arc<Mutex<dyn OutputDriver>>, bus: Bus) -> Self {
        SirenDriver {
            channel,
            output,
            bus,
            active: Mutex::new(None),
        }
    }

    pub fn start(&self, params: SirenParams) {
        self.stop();

        if params.silent {
            self.bus.publish_event(Topic::SyrenStateChange, None);
            return;
        }

        let (tx, rx) = bounded(1);
        let channel = self.channel;
        let output = Arc::clone(&self.output);
        let bus = self.bus.clone();
        let handle = thread::Builder::new()
            .name("siren-run".into())
            .spawn(move || run_siren(channel, output, bus, params, rx))
            .expect("failed to spawn siren thread");

        *self.active.lock().unwrap() = Some((tx, handle));
    }

    pub fn stop(&self) {
        if let Some((tx, handle)) = self.active.lock().unwrap().take() {
            let _ = tx.send(Command::Stop);
            let _ = handle.join();
        }
    }
}

fn run_siren(
    channel: i32,
    output: Arc<Mutex<dyn OutputDriver>>,
    bus: Bus,
    params: SirenParams,
    stop_rx: crossbeam::channel::Receiver<Command>,
) {
    // Wait out the delay, checking for stop at 1-second granularity.
    if !wait_or_cancel(&stop_rx, params.delay) {
        return;
    }

    if let Ok(mut driver) = output.lock() {
        let _ = driver.set(channel, true);
    }
    bus.publish_event(Topic::SyrenStateChange, None);

    if let SirenDuration::For(duration) = params.duration {
        wait_or_cancel(&stop_rx, duration);
    } else {
        // duration = 0 ("until stopped"): block until explicitly told to stop.
        let _ = stop_rx.recv();
    }

    if let Ok(mut driver) = output.lock() {
        let _ = driver.set(channel, false);
    }
    bus.publish_event(Topic::SyrenStateChange, None);
}

/// Sleeps for `total`, polling the stop channel every second. Returns
/// `true` if the full duration elapsed, `false` if cancelled early.
fn wait_or_cancel(stop_rx: &crossbeam::channel::Receiver<Command>, total: Duration) -> bool {
    let tick = Duration::from_secs(1);
    let mut remaining = total;
    loop {
        let slice = remaining.min(tick);
        match stop_rx.recv_timeout(slice) {
            Ok(Command::Stop) => return false,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_syren_silent_defers_to_sensors() {
        assert!(!resolve_silent(None, false));
        assert!(resolve_silent(None, true));
    }

    #[test]
    fn syren_true_is_overridden_by_an_audible_sensor() {
        assert!(!resolve_silent(Some(true), false));
        assert!(resolve_silent(Some(true), true));
    }

    #[test]
    fn syren_false_is_always_audible() {
        assert!(!resolve_silent(Some(false), true));
    }

    #[test]
    fn zero_duration_means_until_stopped() {
        assert_eq!(SirenDuration::from_secs(0), SirenDuration::UntilStopped);
        assert_eq!(
            SirenDuration::from_secs(5),
            SirenDuration::For(Duration::from_secs(5))
        );
    }

    #[test]
    fn precedence_prefers_caller_then_option_then_default() {
        let option = SirenOption {
            silent: Some(true),
            delay_secs: Some(10),
            duration_secs: Some(20),
        };
        let params = resolve_params(None, None, None, option, false);
        assert_eq!(params.delay, Duration::from_secs(10));
        assert_eq!(params.duration, SirenDuration::For(Duration::from_secs(20)));

        let params = resolve_params(Some(false), Some(Duration::from_secs(1)), None, option, false);
        assert!(!params.silent);
        assert_eq!(params.delay, Duration::from_secs(1));
    }
}
