//! Ambient supervision: a 1 Hz
//! watchdog thread that exits the process if any supervised thread
//! stops checking in, so the service manager restarts a wedged core.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{bounded, Receiver, Sender};
use log::{error, info};

const TICK: Duration = Duration::from_secs(1);

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// A supervised thread's liveness flag: updated from inside that
/// thread's own loop, read only by the watchdog.
#[derive(Clone)]
pub struct Heartbeat {
    last_seen: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Heartbeat {
            last_seen: Arc::new(AtomicU64::new(now_secs())),
        }
    }

    pub fn beat(&self) {
        self.last_seen.store(now_secs(), Ordering::Relaxed);
    }

    fn age_secs(&self) -> u64 {
        now_secs().saturating_sub(self.last_seen.load(Ordering::Relaxed))
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HealthMonitor {
    supervised: Vec<(&'static str, Heartbeat, Duration)>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        HealthMonitor {
            supervised: Vec::new(),
            stop_tx,
            stop_rx,
        }
    }

    /// Registers a thread's heartbeat; `max_age` is how stale its last
    /// check-in may get before the watchdog treats it as wedged.
    pub fn supervise(&mut self, name: &'static str, heartbeat: Heartbeat, max_age: Duration) {
        self.supervised.push((name, heartbeat, max_age));
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Blocking main loop; run this on its own thread. Exits the whole
    /// process on a stale thread so systemd restarts a clean core.
    pub fn run(&self) {
        loop {
            match self.stop_rx.recv_timeout(TICK) {
                Ok(()) => break,
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
            }

            for (name, heartbeat, max_age) in &self.supervised {
                let age = heartbeat.age_secs();
                if age > max_age.as_secs() {
                    error!("thread '{name}' has not checked in for {age}s, exiting");
                    std::process::exit(1);
                }
            }
        }
        info!("supervisor stopped");
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns `body` on a named thread, beating `heartbeat` after every
/// call to `body` returns control (i.e. `body` should itself loop and
/// call this once per iteration via the heartbeat it closes over).
pub fn spawn_supervised<F>(name: &'static str, f: F) -> thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .unwrap_or_else(|err| panic!("failed to spawn '{name}' thread: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_is_not_stale() {
        let hb = Heartbeat::new();
        assert!(hb.age_secs() < 2);
    }

    #[test]
    fn monitor_stops_on_request() {
        let monitor = HealthMonitor::new();
        monitor.stop();
        monitor.run();
    }
}
