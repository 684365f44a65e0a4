//! Ticket lifecycle state machine
//!
//! `Pending → Allocated → Verifying → {Accepted | RolledBack} → Done`, with
//! `Allocated → RolledBack` for a fixer that produced no patch. A ticket
//! never holds a resource allocation while `Pending` or `Done`.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketState {
    /// Waiting for capacity
    Pending,
    /// Holding an agent block, fix in progress
    Allocated,
    /// Patch applied and registered, verification running
    Verifying,
    /// Verification passed
    Accepted,
    /// Patch reverted (or no patch was produced)
    RolledBack,
    /// Terminal; resources freed, outcome recorded
    Done,
}

impl TicketState {
    /// Whether this state is terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Whether a ticket in this state holds an agent block
    #[inline]
    #[must_use]
    pub fn holds_allocation(&self) -> bool {
        !matches!(self, Self::Pending | Self::Done)
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Allocated => "ALLOCATED",
            Self::Verifying => "VERIFYING",
            Self::Accepted => "ACCEPTED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Done => "DONE",
        };
        write!(f, "{name}")
    }
}

/// States reachable from `from` in one transition
#[must_use]
pub fn allowed_transitions(from: TicketState) -> Vec<TicketState> {
    use TicketState::*;
    match from {
        Pending => vec![Allocated],
        Allocated => vec![Verifying, RolledBack],
        Verifying => vec![Accepted, RolledBack],
        Accepted => vec![Done],
        RolledBack => vec![Done],
        Done => vec![],
    }
}

pub(crate) fn allowed(from: TicketState, to: TicketState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketState::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(allowed(Pending, Allocated));
        assert!(allowed(Allocated, Verifying));
        assert!(allowed(Verifying, Accepted));
        assert!(allowed(Accepted, Done));
    }

    #[test]
    fn failure_paths_are_allowed() {
        assert!(allowed(Verifying, RolledBack));
        assert!(allowed(Allocated, RolledBack));
        assert!(allowed(RolledBack, Done));
    }

    #[test]
    fn shortcuts_are_rejected() {
        assert!(!allowed(Pending, Verifying));
        assert!(!allowed(Pending, Done));
        assert!(!allowed(Allocated, Accepted));
        assert!(!allowed(Done, Pending));
        assert!(!allowed(Accepted, RolledBack));
    }

    #[test]
    fn allocation_holding_matches_diagram() {
        assert!(!Pending.holds_allocation());
        assert!(!Done.holds_allocation());
        assert!(Allocated.holds_allocation());
        assert!(Verifying.holds_allocation());
    }
}
