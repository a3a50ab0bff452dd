//! Observability for the scenario engine
//!
//! - Structured JSON logging with typed event names
//! - Monotonic counters
//!
//! Observability is read-only: it never changes what the engine decides.

mod events;
mod logger;
mod metrics;

pub use events::LogEvent;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event, escalating fatal events automatically
pub fn log_event(event: LogEvent, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::emit(severity, event, fields);
}
