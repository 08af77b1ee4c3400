//! Area entity: a grouping of sensors with its own
//! arm state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmState {
    Away,
    Stay,
    Mixed,
    Disarm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub name: String,
    pub arm_state: ArmState,
    pub deleted: bool,
}

/// The global arm state is the common value across non-deleted areas,
/// else `MIXED`.
pub fn global_arm_state(areas: &[Area]) -> ArmState {
    let mut live = areas.iter().filter(|a| !a.deleted).map(|a| a.arm_state);
    let first = match live.next() {
        Some(state) => state,
        None => return ArmState::Disarm,
    };
    if live.all(|state| state == first) {
        first
    } else {
        ArmState::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: i64, state: ArmState, deleted: bool) -> Area {
        Area {
            id,
            name: format!("area-{id}"),
            arm_state: state,
            deleted,
        }
    }

    #[test]
    fn uniform_state_wins() {
        let areas = vec![area(1, ArmState::Away, false), area(2, ArmState::Away, false)];
        assert_eq!(global_arm_state(&areas), ArmState::Away);
    }

    #[test]
    fn divergent_state_is_mixed() {
        let areas = vec![area(1, ArmState::Away, false), area(2, ArmState::Stay, false)];
        assert_eq!(global_arm_state(&areas), ArmState::Mixed);
    }

    #[test]
    fn deleted_areas_do_not_count() {
        let areas = vec![area(1, ArmState::Away, false), area(2, ArmState::Stay, true)];
        assert_eq!(global_arm_state(&areas), ArmState::Away);
    }
}
