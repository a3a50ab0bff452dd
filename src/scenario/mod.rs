//! Scenario runtime
//!
//! `ScenarioService` is the single entry point for commands and queries on
//! scenarios. Commands validate against the projected state and append one
//! event; queries replay and project.
//!
//! # Invariants
//!
//! - State changes only through appended events
//! - Answers to a question are checked against the question version pinned
//!   by the scenario's published tree
//! - Submission requires every visible required question to hold a valid
//!   answer
//! - Terminal scenarios accept no further commands

mod errors;
mod feed;
mod service;

pub use errors::{ScenarioError, ScenarioResult};
pub use feed::{AnswerFeed, FeedEntry, HiddenAnswerPolicy};
pub use service::{AnswerInput, ImportInput, ScenarioService};
