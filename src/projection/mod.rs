//! Scenario state projection
//!
//! Scenario state is never stored; it is a left fold over the scenario's
//! events.
//!
//! # Invariants
//!
//! - Projection is deterministic: the same events give the same state
//! - Incremental folding equals replay from sequence 1
//! - Answer history is append-only with closed validity windows
//! - Projection never fails; bad events are skipped and logged

mod answers;
mod navigation;
mod projector;
mod status;

pub use answers::{Answer, AnswerHistory, AnswerSet, HistoryEntry};
pub use navigation::NavigationState;
pub use projector::{ProjectedState, StateProjector};
pub use status::ScenarioStatus;
