//! Scenario lifecycle
//!
//! ```text
//! DRAFT -> IN_PROGRESS -> SUBMITTED -> COMPLETED
//!   \           \             \
//!    +-----------+-------------+--> CANCELLED
//! ```
//!
//! Every transition is an event. COMPLETED and CANCELLED are terminal.

use serde::{Deserialize, Serialize};

use crate::events::EventPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    Draft,
    InProgress,
    Submitted,
    Completed,
    Cancelled,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Draft => "DRAFT",
            ScenarioStatus::InProgress => "IN_PROGRESS",
            ScenarioStatus::Submitted => "SUBMITTED",
            ScenarioStatus::Completed => "COMPLETED",
            ScenarioStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioStatus::Completed | ScenarioStatus::Cancelled)
    }

    /// Answers and navigation are accepted
    pub fn is_open(&self) -> bool {
        matches!(self, ScenarioStatus::Draft | ScenarioStatus::InProgress)
    }

    /// Status after applying `payload`, or `None` if the event is not
    /// allowed in this status.
    ///
    /// `SCENARIO_CREATED` is handled by the projector; it is only legal as
    /// the first event.
    pub fn next(&self, payload: &EventPayload) -> Option<ScenarioStatus> {
        use ScenarioStatus::*;
        match (self, payload) {
            (_, EventPayload::ScenarioCreated { .. }) => None,
            (Draft | InProgress, EventPayload::AnswerProvided { .. }) => Some(InProgress),
            (
                Draft | InProgress,
                EventPayload::AnswerCleared { .. }
                | EventPayload::NodeEntered { .. }
                | EventPayload::NodeExited { .. }
                | EventPayload::StageCompleted { .. },
            ) => Some(*self),
            (InProgress, EventPayload::ScenarioSubmitted) => Some(Submitted),
            (Submitted, EventPayload::ScenarioCompleted) => Some(Completed),
            (Draft | InProgress | Submitted, EventPayload::ScenarioCancelled { .. }) => {
                Some(Cancelled)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
