//! State store. Process-wide snapshot of monitoring and power state
//! with atomic get/set and on-change fan-out onto the bus, persisted to
//! `status.json` guarded by an advisory file lock on every read/write.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use nix::fcntl::{flock, FlockArg};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::os::unix::io::AsRawFd;

use crate::bus::{Bus, Topic};
use crate::state_machine::MonitoringState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(rename = "MONITORING")]
    pub monitoring: MonitoringState,
    #[serde(rename = "POWER")]
    pub power: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        PersistedState {
            monitoring: MonitoringState::Startup,
            power: true,
        }
    }
}

/// Shared in-process snapshot; `clone()` shares the same inner lock.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<PersistedState>>,
    status_file: String,
    bus: Bus,
}

impl StateStore {
    pub fn new(status_file: String, bus: Bus) -> Self {
        let initial = read_status_file(&status_file).unwrap_or_default();
        StateStore {
            inner: Arc::new(RwLock::new(initial)),
            status_file,
            bus,
        }
    }

    pub fn monitoring(&self) -> MonitoringState {
        self.inner.read().monitoring
    }

    pub fn power(&self) -> bool {
        self.inner.read().power
    }

    pub fn set_monitoring(&self, state: MonitoringState) {
        let changed = {
            let mut guard = self.inner.write();
            let changed = guard.monitoring != state;
            guard.monitoring = state;
            changed
        };
        if changed {
            self.persist();
            self.bus.publish_event(Topic::SystemStateChange, None);
        }
    }

    pub fn set_power(&self, present: bool) {
        let changed = {
            let mut guard = self.inner.write();
            let changed = guard.power != present;
            guard.power = present;
            changed
        };
        if changed {
            self.persist();
            self.bus.publish_event(Topic::PowerStateChange, None);
        }
    }

    fn persist(&self) {
        let snapshot = self.inner.read().clone();
        if let Err(err) = write_status_file(&self.status_file, &snapshot) {
            log::error!("failed to persist status file: {err}");
        }
    }
}

fn read_status_file(path: &str) -> Option<PersistedState> {
    let mut file = OpenOptions::new().read(true).open(path).ok()?;
    flock(file.as_raw_fd(), FlockArg::LockShared).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
    serde_json::from_str(&contents).ok()
}

fn write_status_file(path: &str, state: &PersistedState) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    flock(file.as_raw_fd(), FlockArg::LockExclusive)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    let serialized = serde_json::to_string(state)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    flock(file.as_raw_fd(), FlockArg::Unlock)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_monitoring_persists_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let store = StateStore::new(path.to_str().unwrap().to_string(), Bus::new());
        store.set_monitoring(MonitoringState::Armed);
        let reloaded = read_status_file(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.monitoring, MonitoringState::Armed);
    }

    #[test]
    fn no_change_skips_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let store = StateStore::new(path.to_str().unwrap().to_string(), Bus::new());
        // file does not exist yet; setting the same default value must not create it
        store.set_monitoring(MonitoringState::Startup);
        assert!(!path.exists());
    }
}
