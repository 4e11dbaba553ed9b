//! Workflow stages of a modernization session.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current phase of the pipeline
///
/// Stages only move forward, with two exceptions: `reset` returns to
/// `Upload` from anywhere, and a failed analysis falls back from `Analyze`
/// to `Upload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for source files
    Upload,

    /// Analysis request in flight
    Analyze,

    /// Analysis available, plan not yet generated
    Plan,

    /// Plan available, code not yet transformed
    Transform,

    /// Output generated; chat is available
    Done,
}

impl Stage {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: Stage) -> bool {
        match (self, next) {
            (_, Stage::Upload) => true,
            (Stage::Upload, Stage::Analyze) => true,
            (Stage::Analyze, Stage::Plan) => true,
            (Stage::Plan, Stage::Transform) => true,
            (Stage::Transform, Stage::Done) => true,
            _ => false,
        }
    }

    /// Whether the pipeline has finished and only chat remains
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Upload
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upload => "upload",
            Self::Analyze => "analyze",
            Self::Plan => "plan",
            Self::Transform => "transform",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(Stage::Upload.can_transition_to(Stage::Analyze));
        assert!(Stage::Analyze.can_transition_to(Stage::Plan));
        assert!(Stage::Plan.can_transition_to(Stage::Transform));
        assert!(Stage::Transform.can_transition_to(Stage::Done));
    }

    #[test]
    fn test_no_skipping_or_backtracking() {
        assert!(!Stage::Upload.can_transition_to(Stage::Plan));
        assert!(!Stage::Plan.can_transition_to(Stage::Analyze));
        assert!(!Stage::Done.can_transition_to(Stage::Transform));
        assert!(!Stage::Analyze.can_transition_to(Stage::Done));
    }

    #[test]
    fn test_reset_always_allowed() {
        for stage in [
            Stage::Upload,
            Stage::Analyze,
            Stage::Plan,
            Stage::Transform,
            Stage::Done,
        ] {
            assert!(stage.can_transition_to(Stage::Upload));
        }
    }

    #[test]
    fn test_terminal_and_display() {
        assert!(!Stage::Transform.is_terminal());
        assert_eq!(Stage::Done.to_string(), "done");
        assert!(Stage::Done.is_terminal());
        assert_eq!(Stage::default(), Stage::Upload);
    }
}
