//! Answer feed
//!
//! Read-only (scenario, question code) -> typed value mapping for downstream
//! consumers. Answers of questions hidden by the current answers are either
//! kept or suppressed, per `HiddenAnswerPolicy`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AnswerValue, ScenarioId};
use crate::events::EventSource;
use crate::navigation::Availability;
use crate::projection::{ProjectedState, ScenarioStatus};

/// What the feed does with answers whose question is currently hidden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenAnswerPolicy {
    /// Keep them; consumers see every recorded answer
    Retain,
    /// Leave them out of the feed; they stay in the event log and history
    #[default]
    Suppress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub value: AnswerValue,
    pub valid: bool,
    pub source: EventSource,
    pub recorded_at: DateTime<Utc>,
    pub effective_from: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerFeed {
    pub scenario_id: ScenarioId,
    pub version: u64,
    pub status: ScenarioStatus,
    pub answers: BTreeMap<String, FeedEntry>,
    /// Codes left out because their question is hidden
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<String>,
}

impl AnswerFeed {
    pub fn build(state: &ProjectedState, availability: &Availability, policy: HiddenAnswerPolicy) -> Self {
        let mut answers = BTreeMap::new();
        let mut suppressed = Vec::new();
        for answer in state.answers.iter() {
            let hidden = availability.is_code_visible(&answer.question_code) == Some(false);
            if hidden && policy == HiddenAnswerPolicy::Suppress {
                suppressed.push(answer.question_code.clone());
                continue;
            }
            answers.insert(
                answer.question_code.clone(),
                FeedEntry {
                    value: answer.value.clone(),
                    valid: answer.valid,
                    source: answer.source,
                    recorded_at: answer.recorded_at,
                    effective_from: answer.effective_from,
                },
            );
        }
        Self {
            scenario_id: state.scenario_id,
            version: state.version,
            status: state.status,
            answers,
            suppressed,
        }
    }

    pub fn value(&self, code: &str) -> Option<&AnswerValue> {
        self.answers.get(code).map(|e| &e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&HiddenAnswerPolicy::Retain).unwrap(), "\"retain\"");
        let policy: HiddenAnswerPolicy = serde_json::from_str("\"suppress\"").unwrap();
        assert_eq!(policy, HiddenAnswerPolicy::Suppress);
        assert_eq!(HiddenAnswerPolicy::default(), HiddenAnswerPolicy::Suppress);
    }
}
