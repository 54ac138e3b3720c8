use serde::{Deserialize, Serialize};

/// Canonical Meeting status set.
///
/// Terminal states (`Completed`, `Failed`) have no outgoing transitions —
/// see [`Status::is_terminal`] and [`Status::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Requested,
    Joining,
    AwaitingAdmission,
    Active,
    Completed,
    Failed,
}

/// States that count against per-user concurrency and the
/// `(user, platform, native_id)` uniqueness invariant.
pub const ACTIVE_SET: [Status; 4] = [
    Status::Requested,
    Status::Joining,
    Status::AwaitingAdmission,
    Status::Active,
];

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    pub fn is_active_set(self) -> bool {
        ACTIVE_SET.contains(&self)
    }

    /// Whether `self -> target` is an admitted transition. Terminal states
    /// accept no outgoing transition.
    pub fn can_transition_to(self, target: Status) -> bool {
        use Status::*;
        match self {
            Requested => matches!(target, Joining | AwaitingAdmission | Active | Completed | Failed),
            Joining => matches!(target, AwaitingAdmission | Active | Completed | Failed),
            AwaitingAdmission => matches!(target, Active | Completed | Failed),
            Active => matches!(target, Completed | Failed),
            Completed | Failed => false,
        }
    }
}

/// Who/what drove a transition. Assigned by the caller at each call site —
/// the lifecycle controller's HTTP handlers stamp `User`, bot callback
/// handlers stamp `Bot`, and the launcher/reaper stamp `System`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    User,
    Bot,
    System,
}

/// Enumerated motivator for a clean terminal transition (never free text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Stopped,
    EveryoneLeft,
    Evicted,
    AdmissionFailed,
}

/// Enumerated phase at which a failing transition occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Joining,
    WaitingAdmission,
    Active,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for target in [
            Status::Requested,
            Status::Joining,
            Status::AwaitingAdmission,
            Status::Active,
            Status::Completed,
            Status::Failed,
        ] {
            assert!(!Status::Completed.can_transition_to(target));
            assert!(!Status::Failed.can_transition_to(target));
        }
    }

    #[test]
    fn requested_can_reach_every_later_state() {
        for target in [
            Status::Joining,
            Status::AwaitingAdmission,
            Status::Active,
            Status::Completed,
            Status::Failed,
        ] {
            assert!(Status::Requested.can_transition_to(target));
        }
    }

    #[test]
    fn joining_cannot_go_back_to_requested() {
        assert!(!Status::Joining.can_transition_to(Status::Requested));
    }

    #[test]
    fn active_only_reaches_terminal_states() {
        assert!(Status::Active.can_transition_to(Status::Completed));
        assert!(Status::Active.can_transition_to(Status::Failed));
        assert!(!Status::Active.can_transition_to(Status::Joining));
        assert!(!Status::Active.can_transition_to(Status::AwaitingAdmission));
    }

    #[test]
    fn active_set_matches_uniqueness_invariant() {
        assert!(Status::Requested.is_active_set());
        assert!(Status::Joining.is_active_set());
        assert!(Status::AwaitingAdmission.is_active_set());
        assert!(Status::Active.is_active_set());
        assert!(!Status::Completed.is_active_set());
        assert!(!Status::Failed.is_active_set());
    }

    #[test]
    fn wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&Status::AwaitingAdmission).unwrap(),
            "\"awaiting_admission\""
        );
        assert_eq!(
            serde_json::to_string(&CompletionReason::AdmissionFailed).unwrap(),
            "\"admission_failed\""
        );
    }
}
