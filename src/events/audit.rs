//! Audit export
//!
//! Every event of a scenario as one JSON line with actor, time and
//! correlation, in sequence order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::{EventId, ScenarioId};

use super::errors::{EventLogError, EventLogResult};
use super::event::{Event, EventPayload, EventSource};

/// One exported audit line
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord<'a> {
    pub sequence: u64,
    pub event_id: EventId,
    pub scenario_id: ScenarioId,
    pub event_type: &'static str,
    pub actor_id: &'a str,
    pub source: EventSource,
    pub recorded_at: DateTime<Utc>,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    pub idempotency_key: &'a str,
    pub payload: &'a EventPayload,
}

impl<'a> From<&'a Event> for AuditRecord<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            sequence: event.sequence,
            event_id: event.id,
            scenario_id: event.scenario_id,
            event_type: event.event_type(),
            actor_id: &event.actor_id,
            source: event.source,
            recorded_at: event.recorded_at,
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
            idempotency_key: &event.idempotency_key,
            payload: &event.payload,
        }
    }
}

/// Render events as JSON lines
pub fn export_json_lines(events: &[Event]) -> EventLogResult<String> {
    let mut out = String::new();
    for event in events {
        let line = serde_json::to_string(&AuditRecord::from(event))
            .map_err(|e| EventLogError::Internal(format!("audit serialization: {}", e)))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AnswerValue;

    #[test]
    fn test_export_one_line_per_event() {
        let correlation = Uuid::new_v4();
        let events: Vec<Event> = (1..=3)
            .map(|seq| Event {
                id: Uuid::new_v4(),
                tenant_id: "acme".into(),
                scenario_id: Uuid::nil(),
                sequence: seq,
                payload: EventPayload::answer("fico", AnswerValue::number(seq)),
                idempotency_key: format!("k{}", seq),
                actor_id: "importer".into(),
                source: EventSource::Import,
                correlation_id: correlation,
                causation_id: None,
                recorded_at: Utc::now(),
            })
            .collect();

        let out = export_json_lines(&events).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["event_type"], "ANSWER_PROVIDED");
        assert_eq!(first["actor_id"], "importer");
        assert_eq!(first["source"], "IMPORT");
        assert_eq!(first["correlation_id"], correlation.to_string());
    }
}
