//! Scenario events
//!
//! Events are facts: once appended they are never updated or deleted.
//! The event type is the payload tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{AnswerValue, EventId, NodeId, ScenarioId, TenantId, TreeId};

/// Per-scenario stream key; scenarios never cross tenants
pub type ScenarioKey = (TenantId, ScenarioId);

/// Where an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    User,
    Import,
    System,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::User => "USER",
            EventSource::Import => "IMPORT",
            EventSource::System => "SYSTEM",
        }
    }
}

/// Typed event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    ScenarioCreated {
        tree_id: TreeId,
        tree_version: u32,
    },
    AnswerProvided {
        question_code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
        value: AnswerValue,
        /// Real-world time the answer holds from; defaults to event time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        effective_from: Option<DateTime<Utc>>,
        /// False only for imported values that failed validation
        #[serde(default = "default_valid")]
        valid: bool,
    },
    AnswerCleared {
        question_code: String,
    },
    NodeEntered {
        node_id: NodeId,
    },
    NodeExited {
        node_id: NodeId,
    },
    StageCompleted {
        node_id: NodeId,
    },
    ScenarioSubmitted,
    ScenarioCompleted,
    ScenarioCancelled {
        #[serde(default)]
        reason: String,
    },
}

fn default_valid() -> bool {
    true
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::ScenarioCreated { .. } => "SCENARIO_CREATED",
            EventPayload::AnswerProvided { .. } => "ANSWER_PROVIDED",
            EventPayload::AnswerCleared { .. } => "ANSWER_CLEARED",
            EventPayload::NodeEntered { .. } => "NODE_ENTERED",
            EventPayload::NodeExited { .. } => "NODE_EXITED",
            EventPayload::StageCompleted { .. } => "STAGE_COMPLETED",
            EventPayload::ScenarioSubmitted => "SCENARIO_SUBMITTED",
            EventPayload::ScenarioCompleted => "SCENARIO_COMPLETED",
            EventPayload::ScenarioCancelled { .. } => "SCENARIO_CANCELLED",
        }
    }

    pub fn answer(code: impl Into<String>, value: AnswerValue) -> Self {
        EventPayload::AnswerProvided {
            question_code: code.into(),
            node_id: None,
            value,
            effective_from: None,
            valid: true,
        }
    }
}

/// An appended event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub scenario_id: ScenarioId,
    /// 1-based, contiguous per scenario
    pub sequence: u64,
    pub payload: EventPayload,
    pub idempotency_key: String,
    pub actor_id: String,
    pub source: EventSource,
    pub correlation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    pub fn key(&self) -> ScenarioKey {
        (self.tenant_id.clone(), self.scenario_id)
    }
}
