//! State projection
//!
//! `apply` is the only reducer. Full replay and incremental folding both go
//! through it, so replaying from sequence 1 always reproduces the
//! incrementally maintained state.
//!
//! The projection is total: an event out of sequence is skipped without
//! advancing the version, and an event that is illegal in the current status
//! advances the version but has no other effect. Both are logged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AnswerValue, ScenarioId, TenantId, TreeId};
use crate::events::{Event, EventPayload};
use crate::observability::{LogEvent, Logger};

use super::answers::{Answer, AnswerHistory, AnswerSet, HistoryEntry};
use super::navigation::NavigationState;
use super::status::ScenarioStatus;

/// Everything known about a scenario after folding its events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedState {
    pub tenant_id: TenantId,
    pub scenario_id: ScenarioId,
    pub status: ScenarioStatus,
    /// Sequence of the last folded event; 0 before any
    pub version: u64,
    pub tree_id: Option<TreeId>,
    pub tree_version: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub answers: AnswerSet,
    pub history: AnswerHistory,
    pub navigation: NavigationState,
}

impl ProjectedState {
    pub fn empty(tenant_id: impl Into<TenantId>, scenario_id: ScenarioId) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            scenario_id,
            status: ScenarioStatus::Draft,
            version: 0,
            tree_id: None,
            tree_version: None,
            created_at: None,
            updated_at: None,
            answers: AnswerSet::default(),
            history: AnswerHistory::default(),
            navigation: NavigationState::default(),
        }
    }

    /// A `SCENARIO_CREATED` event has been folded
    pub fn is_created(&self) -> bool {
        self.tree_id.is_some()
    }

    /// What the system believed the answer was at system time `at`
    pub fn value_as_of_recorded(&self, code: &str, at: DateTime<Utc>) -> Option<&AnswerValue> {
        if let Some(current) = self.answers.get(code) {
            if current.recorded_at <= at {
                return Some(&current.value);
            }
        }
        self.history
            .for_question(code)
            .filter(|e| e.recorded_from <= at && at < e.recorded_to)
            .last()
            .map(|e| &e.value)
    }

    /// What the answer was in the real world at `at`, as currently known.
    ///
    /// Among overlapping facts the most recently recorded one wins.
    pub fn value_as_of_effective(&self, code: &str, at: DateTime<Utc>) -> Option<&AnswerValue> {
        if let Some(current) = self.answers.get(code) {
            if current.effective_from <= at {
                return Some(&current.value);
            }
        }
        self.history
            .for_question(code)
            .filter(|e| e.effective_from <= at && at < e.effective_to)
            .max_by_key(|e| e.sequence)
            .map(|e| &e.value)
    }
}

/// Pure fold from events to `ProjectedState`
pub struct StateProjector;

impl StateProjector {
    /// Fold a full history from an empty state.
    pub fn project(tenant_id: &str, scenario_id: ScenarioId, events: &[Event]) -> ProjectedState {
        let mut state = ProjectedState::empty(tenant_id, scenario_id);
        Self::fold(&mut state, events);
        state
    }

    /// Fold further events into an existing state.
    pub fn fold(state: &mut ProjectedState, events: &[Event]) {
        for event in events {
            Self::apply(state, event);
        }
    }

    /// Apply one event. Returns false if the event was skipped or illegal.
    pub fn apply(state: &mut ProjectedState, event: &Event) -> bool {
        if event.tenant_id != state.tenant_id || event.scenario_id != state.scenario_id {
            skipped(state, event, "event belongs to another scenario");
            return false;
        }
        if event.sequence != state.version + 1 {
            skipped(state, event, "out of sequence");
            return false;
        }
        state.version = event.sequence;
        state.updated_at = Some(event.recorded_at);

        if let EventPayload::ScenarioCreated { tree_id, tree_version } = &event.payload {
            if state.is_created() {
                skipped(state, event, "scenario already created");
                return false;
            }
            state.tree_id = Some(*tree_id);
            state.tree_version = Some(*tree_version);
            state.created_at = Some(event.recorded_at);
            state.status = ScenarioStatus::Draft;
            return true;
        }

        if !state.is_created() {
            skipped(state, event, "scenario not created");
            return false;
        }
        let next = match state.status.next(&event.payload) {
            Some(next) => next,
            None => {
                skipped(state, event, "illegal in current status");
                return false;
            }
        };

        match &event.payload {
            EventPayload::AnswerProvided {
                question_code,
                node_id,
                value,
                effective_from,
                valid,
            } => {
                let effective_from = effective_from.unwrap_or(event.recorded_at);
                let answer = Answer {
                    question_code: question_code.clone(),
                    value: value.clone(),
                    valid: *valid,
                    node_id: node_id.clone(),
                    event_id: event.id,
                    sequence: event.sequence,
                    source: event.source,
                    recorded_at: event.recorded_at,
                    effective_from,
                };
                if let Some(prior) = state.answers.upsert(answer) {
                    state.history.push(HistoryEntry::close(
                        prior,
                        event.id,
                        event.recorded_at,
                        effective_from,
                    ));
                }
            }
            EventPayload::AnswerCleared { question_code } => {
                if let Some(prior) = state.answers.remove(question_code) {
                    state.history.push(HistoryEntry::close(
                        prior,
                        event.id,
                        event.recorded_at,
                        event.recorded_at,
                    ));
                }
            }
            EventPayload::NodeEntered { node_id } => state.navigation.enter(node_id),
            EventPayload::NodeExited { node_id } => state.navigation.exit(node_id),
            EventPayload::StageCompleted { node_id } => state.navigation.complete(node_id),
            EventPayload::ScenarioSubmitted
            | EventPayload::ScenarioCompleted
            | EventPayload::ScenarioCancelled { .. }
            | EventPayload::ScenarioCreated { .. } => {}
        }
        state.status = next;
        true
    }
}

fn skipped(state: &ProjectedState, event: &Event, reason: &str) {
    Logger::warn(
        LogEvent::ProjectionSkipped,
        &[
            ("scenario_id", event.scenario_id.to_string().as_str()),
            ("sequence", event.sequence.to_string().as_str()),
            ("version", state.version.to_string().as_str()),
            ("type", event.event_type()),
            ("status", state.status.as_str()),
            ("reason", reason),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeId;
    use crate::events::EventSource;
    use chrono::Duration;
    use uuid::Uuid;

    struct Script {
        scenario: Uuid,
        events: Vec<Event>,
        clock: DateTime<Utc>,
    }

    impl Script {
        fn new() -> Self {
            let mut script = Self {
                scenario: Uuid::new_v4(),
                events: Vec::new(),
                clock: Utc::now(),
            };
            script.push(EventPayload::ScenarioCreated {
                tree_id: Uuid::new_v4(),
                tree_version: 1,
            });
            script
        }

        fn push(&mut self, payload: EventPayload) -> &mut Self {
            self.clock = self.clock + Duration::seconds(1);
            let sequence = self.events.len() as u64 + 1;
            self.events.push(Event {
                id: Uuid::new_v4(),
                tenant_id: "acme".into(),
                scenario_id: self.scenario,
                sequence,
                payload,
                idempotency_key: format!("k{}", sequence),
                actor_id: "alice".into(),
                source: EventSource::User,
                correlation_id: Uuid::new_v4(),
                causation_id: None,
                recorded_at: self.clock,
            });
            self
        }

        fn answer(&mut self, code: &str, value: AnswerValue) -> &mut Self {
            self.push(EventPayload::answer(code, value))
        }

        fn project(&self) -> ProjectedState {
            StateProjector::project("acme", self.scenario, &self.events)
        }
    }

    #[test]
    fn test_first_answer_moves_to_in_progress() {
        let mut script = Script::new();
        assert_eq!(script.project().status, ScenarioStatus::Draft);
        script.answer("loan_purpose", AnswerValue::text("purchase"));
        let state = script.project();
        assert_eq!(state.status, ScenarioStatus::InProgress);
        assert_eq!(state.version, 2);
    }

    #[test]
    fn test_replacement_goes_to_history() {
        let mut script = Script::new();
        script
            .answer("fico", AnswerValue::number(680))
            .answer("fico", AnswerValue::number(720));
        let state = script.project();
        assert_eq!(state.answers.get("fico").unwrap().value, AnswerValue::number(720));
        assert_eq!(state.history.len(), 1);
        let entry = &state.history.entries()[0];
        assert_eq!(entry.value, AnswerValue::number(680));
        assert_eq!(entry.recorded_to, script.events[2].recorded_at);
        assert_eq!(entry.closed_by, script.events[2].id);
    }

    #[test]
    fn test_clear_keeps_history() {
        let mut script = Script::new();
        script
            .answer("fico", AnswerValue::number(680))
            .push(EventPayload::AnswerCleared {
                question_code: "fico".into(),
            });
        let state = script.project();
        assert!(state.answers.get("fico").is_none());
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_incremental_equals_full_replay() {
        let mut script = Script::new();
        let node = NodeId::from_digest("n1");
        script
            .answer("a", AnswerValue::text("x"))
            .push(EventPayload::NodeEntered { node_id: node.clone() })
            .answer("a", AnswerValue::text("y"))
            .push(EventPayload::StageCompleted { node_id: node.clone() })
            .push(EventPayload::NodeExited { node_id: node });

        let full = script.project();
        let mut incremental = ProjectedState::empty("acme", script.scenario);
        for event in &script.events {
            StateProjector::apply(&mut incremental, event);
        }
        assert_eq!(full, incremental);
    }

    #[test]
    fn test_out_of_sequence_is_skipped() {
        let mut script = Script::new();
        script.answer("a", AnswerValue::text("x"));
        let mut state = ProjectedState::empty("acme", script.scenario);
        assert!(StateProjector::apply(&mut state, &script.events[0]));
        // replaying the same event again is out of sequence
        assert!(!StateProjector::apply(&mut state, &script.events[0]));
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_illegal_transition_advances_version_only() {
        let mut script = Script::new();
        script.push(EventPayload::ScenarioSubmitted);
        let state = script.project();
        assert_eq!(state.version, 2);
        assert_eq!(state.status, ScenarioStatus::Draft);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut script = Script::new();
        script
            .answer("a", AnswerValue::text("x"))
            .push(EventPayload::ScenarioSubmitted)
            .push(EventPayload::ScenarioCompleted);
        assert_eq!(script.project().status, ScenarioStatus::Completed);
    }

    #[test]
    fn test_bitemporal_reads() {
        let mut script = Script::new();
        script.answer("income", AnswerValue::number(5000));
        let first_recorded = script.clock;

        // a later correction that holds from a date before the first answer
        let backdated = first_recorded - Duration::days(30);
        script.push(EventPayload::AnswerProvided {
            question_code: "income".into(),
            node_id: None,
            value: AnswerValue::number(5200),
            effective_from: Some(backdated),
            valid: true,
        });
        let state = script.project();

        // system time: before the correction the old value was believed
        assert_eq!(
            state.value_as_of_recorded("income", first_recorded),
            Some(&AnswerValue::number(5000))
        );
        assert_eq!(
            state.value_as_of_recorded("income", script.clock),
            Some(&AnswerValue::number(5200))
        );
        // real-world time: the correction holds from the backdated instant
        assert_eq!(
            state.value_as_of_effective("income", first_recorded),
            Some(&AnswerValue::number(5200))
        );
        assert_eq!(state.value_as_of_effective("income", backdated - Duration::days(1)), None);
        assert_eq!(state.value_as_of_recorded("income", first_recorded - Duration::seconds(1)), None);
    }

    #[test]
    fn test_as_of_value_outlives_lookup_code() {
        let mut script = Script::new();
        script
            .answer("income", AnswerValue::number(5000))
            .answer("income", AnswerValue::number(5200));
        let first_recorded = script.events[1].recorded_at;
        let state = script.project();

        let value = {
            let code = String::from("income");
            state.value_as_of_recorded(&code, first_recorded)
        };
        assert_eq!(value, Some(&AnswerValue::number(5000)));

        let history: Vec<&HistoryEntry> = {
            let code = "income".to_string();
            state.history.for_question(&code).collect()
        };
        assert_eq!(history.len(), 1);
    }
}
