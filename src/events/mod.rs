//! Event log
//!
//! The scenario event log is the system of record. Everything else is a
//! projection of it.
//!
//! # Invariants
//!
//! - Per-scenario sequence numbers are contiguous from 1
//! - Each idempotency key is assigned exactly one sequence number
//! - Events are never updated or deleted
//! - A journaled event is fsynced before it is visible
//! - A corrupt journal halts startup

mod audit;
mod errors;
mod event;
mod journal;
mod log;

pub use audit::{export_json_lines, AuditRecord};
pub use errors::{EventLogError, EventLogResult};
pub use event::{Event, EventPayload, EventSource, ScenarioKey};
pub use journal::{append_committed, decode_line, encode_line, EventJournal, JournalFile};
pub use log::{AppendRequest, Appended, EventLog};
