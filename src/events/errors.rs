//! Event log errors
//!
//! Error codes:
//! - SCN_CONCURRENT_MODIFICATION (retry against the current version)
//! - SCN_IMMUTABLE_LOG_VIOLATION (never reachable through normal use)
//! - SCN_JOURNAL_IO
//! - SCN_JOURNAL_CORRUPTION (FATAL, startup halts)

use thiserror::Error;

use crate::core::ScenarioId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventLogError {
    #[error("Scenario {scenario_id} is at version {actual}, expected {expected}")]
    ConcurrentModification {
        scenario_id: ScenarioId,
        expected: u64,
        actual: u64,
    },

    #[error("Events are immutable: {0}")]
    ImmutableLogViolation(String),

    #[error("Journal I/O failed: {0}")]
    JournalIo(String),

    #[error("Journal corrupted at {path}:{line}: {reason}")]
    JournalCorruption {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EventLogError {
    pub fn code(&self) -> &'static str {
        match self {
            EventLogError::ConcurrentModification { .. } => "SCN_CONCURRENT_MODIFICATION",
            EventLogError::ImmutableLogViolation(_) => "SCN_IMMUTABLE_LOG_VIOLATION",
            EventLogError::JournalIo(_) => "SCN_JOURNAL_IO",
            EventLogError::JournalCorruption { .. } => "SCN_JOURNAL_CORRUPTION",
            EventLogError::Internal(_) => "SCN_INTERNAL",
        }
    }

    /// Fatal errors must stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, EventLogError::JournalCorruption { .. })
    }

    pub(crate) fn poisoned() -> Self {
        EventLogError::Internal("event log lock poisoned".into())
    }
}

pub type EventLogResult<T> = Result<T, EventLogError>;
