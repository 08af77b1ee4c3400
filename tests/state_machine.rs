//! Black-box transition-table coverage for the arm/alert/sabotage
//! scenarios, exercised through the public crate API rather than the
//! colocated unit tests that cover the table row-by-row.

use sentinel_monitor::state_machine::{transition, ArmKind, Event, MonitoringState};

#[test]
fn s1_arm_with_delay_then_delay_elapses_into_armed() {
    let state = transition(MonitoringState::Ready, Event::Arm { kind: ArmKind::Away, delay: Some(30) });
    assert_eq!(state, MonitoringState::ArmDelay);

    let state = transition(state, Event::ArmDelayExpired);
    assert_eq!(state, MonitoringState::Armed);
}

#[test]
fn s1_arm_with_no_delay_jumps_straight_to_armed() {
    let state = transition(MonitoringState::Ready, Event::Arm { kind: ArmKind::Stay, delay: None });
    assert_eq!(state, MonitoringState::Armed);
}

#[test]
fn s2_qualifying_alert_while_armed_opens_alert_delay_then_alert() {
    let state = transition(MonitoringState::Armed, Event::DelayedAlertQualifyingAlert);
    assert_eq!(state, MonitoringState::AlertDelay);

    let state = transition(state, Event::AlertDelayElapsedStillAlerting);
    assert_eq!(state, MonitoringState::Alert);
}

#[test]
fn s2_instant_alert_skips_the_delay_state() {
    let state = transition(MonitoringState::Armed, Event::ImmediateAlertQualifyingAlert);
    assert_eq!(state, MonitoringState::Alert);
}

#[test]
fn s3_sabotage_preempts_from_ready_or_armed_states() {
    for start in [MonitoringState::Ready, MonitoringState::ArmDelay, MonitoringState::Armed] {
        assert_eq!(transition(start, Event::SabotageQualifyingAlert), MonitoringState::Sabotage);
    }
}

#[test]
fn disarm_cancels_an_in_progress_arm_delay() {
    let state = transition(MonitoringState::Ready, Event::Arm { kind: ArmKind::Away, delay: Some(30) });
    assert_eq!(state, MonitoringState::ArmDelay);
    assert_eq!(transition(state, Event::Disarm), MonitoringState::Ready);
}

#[test]
fn disarm_from_alert_clears_back_to_ready() {
    assert_eq!(transition(MonitoringState::Alert, Event::Disarm), MonitoringState::Ready);
    assert_eq!(transition(MonitoringState::Sabotage, Event::Disarm), MonitoringState::Ready);
}

#[test]
fn unrecognized_event_from_a_state_is_a_no_op() {
    // Startup only reacts to config-load events; an arm attempt there
    // must not move it.
    assert_eq!(
        transition(MonitoringState::Startup, Event::Arm { kind: ArmKind::Away, delay: None }),
        MonitoringState::Startup
    );
}
