//! Answers and answer history
//!
//! An answer carries two time axes:
//! - recorded: when the system learned it (the event time)
//! - effective: when it holds in the real world (from the payload)
//!
//! Replacing or clearing an answer moves the prior value into history with
//! both windows closed. History is append-only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::AnswerLookup;
use crate::core::{AnswerValue, EventId, NodeId};
use crate::events::EventSource;

/// Current value of one question in one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_code: String,
    pub value: AnswerValue,
    /// False for imported values that failed validation
    pub valid: bool,
    pub node_id: Option<NodeId>,
    /// Event that produced this value
    pub event_id: EventId,
    pub sequence: u64,
    pub source: EventSource,
    pub recorded_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
}

/// A prior value with closed windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question_code: String,
    pub value: AnswerValue,
    pub valid: bool,
    pub event_id: EventId,
    pub sequence: u64,
    pub recorded_from: DateTime<Utc>,
    pub recorded_to: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
    pub effective_to: DateTime<Utc>,
    /// Event that superseded or cleared the value
    pub closed_by: EventId,
}

impl HistoryEntry {
    pub(crate) fn close(
        answer: Answer,
        closed_by: EventId,
        recorded_to: DateTime<Utc>,
        effective_to: DateTime<Utc>,
    ) -> Self {
        Self {
            question_code: answer.question_code,
            value: answer.value,
            valid: answer.valid,
            event_id: answer.event_id,
            sequence: answer.sequence,
            recorded_from: answer.recorded_at,
            recorded_to,
            effective_from: answer.effective_from,
            // a correction may move effective time backwards
            effective_to: effective_to.max(answer.effective_from),
            closed_by,
        }
    }
}

/// Current answers of a scenario, keyed by question code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSet {
    answers: BTreeMap<String, Answer>,
}

impl AnswerSet {
    pub fn get(&self, code: &str) -> Option<&Answer> {
        self.answers.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.values()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub(crate) fn upsert(&mut self, answer: Answer) -> Option<Answer> {
        self.answers.insert(answer.question_code.clone(), answer)
    }

    pub(crate) fn remove(&mut self, code: &str) -> Option<Answer> {
        self.answers.remove(code)
    }

    /// Code -> value map
    pub fn values(&self) -> BTreeMap<String, AnswerValue> {
        self.answers
            .iter()
            .map(|(code, a)| (code.clone(), a.value.clone()))
            .collect()
    }
}

impl AnswerLookup for AnswerSet {
    fn lookup(&self, code: &str) -> Option<&AnswerValue> {
        self.answers.get(code).map(|a| &a.value)
    }
}

/// Prior answer values, in the order they were superseded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerHistory {
    entries: Vec<HistoryEntry>,
}

impl AnswerHistory {
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// History of one question, oldest first
    pub fn for_question<'a>(&'a self, code: &str) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        let code = code.to_string();
        self.entries.iter().filter(move |e| e.question_code == code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn answer(code: &str, value: AnswerValue, at: DateTime<Utc>) -> Answer {
        Answer {
            question_code: code.into(),
            value,
            valid: true,
            node_id: None,
            event_id: Uuid::new_v4(),
            sequence: 1,
            source: EventSource::User,
            recorded_at: at,
            effective_from: at,
        }
    }

    #[test]
    fn test_upsert_returns_prior() {
        let now = Utc::now();
        let mut set = AnswerSet::default();
        assert!(set.upsert(answer("a", AnswerValue::number(1), now)).is_none());
        let prior = set.upsert(answer("a", AnswerValue::number(2), now)).unwrap();
        assert_eq!(prior.value, AnswerValue::number(1));
        assert_eq!(set.lookup("a"), Some(&AnswerValue::number(2)));
    }

    #[test]
    fn test_close_never_inverts_effective_window() {
        let now = Utc::now();
        let a = answer("a", AnswerValue::number(1), now);
        let entry = HistoryEntry::close(a, Uuid::new_v4(), now, now - Duration::days(3));
        assert_eq!(entry.effective_to, entry.effective_from);
    }
}
