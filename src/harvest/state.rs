/// Harvest state definitions
///
/// This module defines the phases a harvested resource moves through and the
/// stages errors are attributed to.
use crate::HarvestError;
use std::fmt;

/// Progress of one resource through the harvest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    // ===== Active States =====
    /// Only the user-supplied resource string is known
    Unresolved,

    /// The resource was mapped to a canonical channel id
    Resolved,

    /// Child identifiers were listed
    Enumerated,

    /// Child data is being collected
    Collecting,

    // ===== Terminal States =====
    /// The harvest stopped before finishing; resuming is safe
    Skipped,

    /// Every selected child was collected or recorded as skipped
    Done,
}

impl Phase {
    /// Returns true if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Done)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    ///
    /// Phases only move forward one step at a time. Any active phase may move
    /// to `Skipped`.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        match (self, next) {
            (Self::Unresolved, Self::Resolved)
            | (Self::Resolved, Self::Enumerated)
            | (Self::Enumerated, Self::Collecting)
            | (Self::Collecting, Self::Done) => true,
            (from, Self::Skipped) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unresolved => "unresolved",
            Self::Resolved => "resolved",
            Self::Enumerated => "enumerated",
            Self::Collecting => "collecting",
            Self::Skipped => "skipped",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Tracks the phase of one resource and rejects illegal transitions
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: Phase::Unresolved,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Moves to `next`, failing with `InvalidTransition` if the step is illegal
    pub fn advance(&mut self, next: Phase) -> Result<(), HarvestError> {
        if !self.current.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!("Phase {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline stage an error escaped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolve,
    Enumerate,
    Details,
    Comments,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Enumerate => "enumerate",
            Self::Details => "details",
            Self::Comments => "comments",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let mut tracker = PhaseTracker::new();
        for next in [
            Phase::Resolved,
            Phase::Enumerated,
            Phase::Collecting,
            Phase::Done,
        ] {
            tracker.advance(next).unwrap();
        }
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn test_skipping_ahead_is_invalid() {
        let mut tracker = PhaseTracker::new();
        let err = tracker.advance(Phase::Collecting).unwrap_err();
        assert!(matches!(
            err,
            HarvestError::InvalidTransition {
                from: Phase::Unresolved,
                to: Phase::Collecting
            }
        ));
        assert_eq!(tracker.current(), Phase::Unresolved);
    }

    #[test]
    fn test_terminal_phases_are_final() {
        assert!(Phase::Collecting.can_transition_to(Phase::Skipped));
        assert!(Phase::Unresolved.can_transition_to(Phase::Skipped));
        assert!(!Phase::Done.can_transition_to(Phase::Skipped));
        assert!(!Phase::Skipped.can_transition_to(Phase::Collecting));
        assert!(!Phase::Resolved.can_transition_to(Phase::Unresolved));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Comments.to_string(), "comments");
        assert_eq!(Phase::Enumerated.to_string(), "enumerated");
    }
}
