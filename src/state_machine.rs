//! Monitoring state machine. A pure function
//! `(MonitoringState, Event) -> MonitoringState`, unit-tested against
//! the transition table directly rather than threaded through I/O.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringState {
    Startup,
    UpdatingConfig,
    InvalidConfig,
    Ready,
    ArmDelay,
    Armed,
    AlertDelay,
    Alert,
    Sabotage,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmKind {
    Away,
    Stay,
}

/// Inputs that can move the state machine. `delay` carries the already
/// resolved per-sensor delay so this function
/// stays pure and the zone/area lookups live in the alert controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ConfigLoadOk,
    ConfigLoadFailed,
    Arm { kind: ArmKind, delay: Option<u64> },
    ArmDelayExpired,
    SabotageQualifyingAlert,
    DelayedAlertQualifyingAlert,
    ImmediateAlertQualifyingAlert,
    AlertDelayElapsedStillAlerting,
    Disarm,
    UpdateConfig,
    ConfigRevalidated { next: MonitoringState },
}

/// Applies one event to the current state. Events that have no effect
/// from the current state leave it unchanged.
pub fn transition(state: MonitoringState, event: Event) -> MonitoringState {
    use MonitoringState::*;

    match (state, event) {
        (Startup, Event::ConfigLoadOk) => Ready,
        (Startup | Ready, Event::ConfigLoadFailed) => InvalidConfig,

        (Ready, Event::Arm { delay: Some(d), .. }) if d > 0 => ArmDelay,
        (Ready, Event::Arm { delay, .. }) if delay.unwrap_or(0) == 0 => Armed,

        (ArmDelay, Event::ArmDelayExpired) => Armed,
        (ArmDelay | Armed, Event::SabotageQualifyingAlert) => Sabotage,

        (Armed, Event::DelayedAlertQualifyingAlert) => AlertDelay,
        (Armed, Event::ImmediateAlertQualifyingAlert) => Alert,
        (AlertDelay, Event::AlertDelayElapsedStillAlerting) => Alert,
        (AlertDelay, Event::Disarm) => Ready,

        (Alert | Sabotage | Armed | ArmDelay, Event::Disarm) => Ready,

        (Ready, Event::SabotageQualifyingAlert) => Sabotage,

        (_, Event::UpdateConfig) => UpdatingConfig,
        (UpdatingConfig, Event::ConfigRevalidated { next }) => next,

        (current, _) => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MonitoringState::*;

    #[test]
    fn startup_to_ready_on_config_ok() {
        assert_eq!(transition(Startup, Event::ConfigLoadOk), Ready);
    }

    #[test]
    fn arm_with_positive_delay_goes_to_arm_delay() {
        assert_eq!(
            transition(Ready, Event::Arm { kind: ArmKind::Away, delay: Some(30) }),
            ArmDelay
        );
    }

    #[test]
    fn arm_with_zero_or_null_delay_goes_straight_to_armed() {
        assert_eq!(
            transition(Ready, Event::Arm { kind: ArmKind::Stay, delay: Some(0) }),
            Armed
        );
        assert_eq!(
            transition(Ready, Event::Arm { kind: ArmKind::Stay, delay: None }),
            Armed
        );
    }

    #[test]
    fn sabotage_dominates_from_armed_or_arm_delay() {
        assert_eq!(transition(Armed, Event::SabotageQualifyingAlert), Sabotage);
        assert_eq!(transition(ArmDelay, Event::SabotageQualifyingAlert), Sabotage);
    }

    #[test]
    fn disarm_always_returns_to_ready() {
        for s in [Alert, Sabotage, Armed, ArmDelay, AlertDelay] {
            assert_eq!(transition(s, Event::Disarm), Ready);
        }
    }

    #[test]
    fn update_config_detours_through_updating_config() {
        let s = transition(Armed, Event::UpdateConfig);
        assert_eq!(s, UpdatingConfig);
        assert_eq!(
            transition(s, Event::ConfigRevalidated { next: Armed }),
            Armed
        );
    }

    #[test]
    fn unrelated_event_is_a_no_op() {
        assert_eq!(transition(Ready, Event::ArmDelayExpired), Ready);
    }

    #[test]
    fn disarmed_sabotage_qualifying_alert_from_ready() {
        assert_eq!(transition(Ready, Event::SabotageQualifyingAlert), Sabotage);
    }
}
