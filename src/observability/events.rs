//! Observable engine events
//!
//! Log events are explicit and typed; every log line names one of these.

use std::fmt;

/// Observable events emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    // Lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// Server ready for requests
    Serving,

    // Event log
    /// Event appended to a scenario stream
    EventAppended,
    /// Append short-circuited by an already used idempotency key
    IdempotentReplay,
    /// Append rejected because the caller's expected version is stale
    ConcurrentModification,
    /// Journal replay begins
    JournalReplayBegin,
    /// Journal replay complete
    JournalReplayComplete,
    /// Journal record failed its checksum (FATAL)
    JournalCorruption,
    /// Bytes of a failed append cut from a journal file
    JournalRollback,

    // Projection
    /// Projector skipped an event it cannot apply
    ProjectionSkipped,

    // Conditions and navigation
    /// Malformed condition evaluated to false
    ConditionFallback,
    /// Availability cache refreshed
    CacheRefreshed,

    // Authoring
    /// Question lifecycle changed
    QuestionTransition,
    /// Tree published
    TreePublished,
    /// Tree publish rejected by structural validation
    TreePublishRejected,

    // Scenario runtime
    /// Answer rejected by validation
    AnswerRejected,
    /// Imported value failed validation and was recorded as invalid
    ImportValueInvalid,
    /// Scenario cancelled after inactivity
    ScenarioTimedOut,
}

impl LogEvent {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::ConfigLoaded => "CONFIG_LOADED",
            LogEvent::Serving => "SCENARIOTREE_SERVING",
            LogEvent::EventAppended => "EVENT_APPENDED",
            LogEvent::IdempotentReplay => "IDEMPOTENT_REPLAY",
            LogEvent::ConcurrentModification => "CONCURRENT_MODIFICATION",
            LogEvent::JournalReplayBegin => "JOURNAL_REPLAY_BEGIN",
            LogEvent::JournalReplayComplete => "JOURNAL_REPLAY_COMPLETE",
            LogEvent::JournalCorruption => "JOURNAL_CORRUPTION",
            LogEvent::JournalRollback => "JOURNAL_ROLLBACK",
            LogEvent::ProjectionSkipped => "PROJECTION_SKIPPED",
            LogEvent::ConditionFallback => "CONDITION_FALLBACK",
            LogEvent::CacheRefreshed => "CACHE_REFRESHED",
            LogEvent::QuestionTransition => "QUESTION_TRANSITION",
            LogEvent::TreePublished => "TREE_PUBLISHED",
            LogEvent::TreePublishRejected => "TREE_PUBLISH_REJECTED",
            LogEvent::AnswerRejected => "ANSWER_REJECTED",
            LogEvent::ImportValueInvalid => "IMPORT_VALUE_INVALID",
            LogEvent::ScenarioTimedOut => "SCENARIO_TIMED_OUT",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, LogEvent::JournalCorruption)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
