//! Scenario service errors
//!
//! Wraps every subsystem error so callers get one stable code and one HTTP
//! status per failure.
//!
//! Error codes (in addition to the wrapped subsystems'):
//! - SCN_NOT_FOUND
//! - SCN_INVALID_STATUS
//! - SCN_REQUIRED_UNANSWERED
//! - SCN_UNKNOWN_QUESTION
//! - SCN_NODE_UNAVAILABLE
//! - SCN_VALIDATION_FAILED (VALIDATION rule rejected the answer)

use thiserror::Error;

use crate::authoring::BundleError;
use crate::catalog::CatalogError;
use crate::condition::ConditionError;
use crate::core::{ConditionId, NodeId, ScenarioId};
use crate::events::EventLogError;
use crate::projection::ScenarioStatus;
use crate::tree::TreeError;

#[derive(Debug, Clone, Error)]
pub enum ScenarioError {
    #[error("Scenario not found: {0}")]
    NotFound(ScenarioId),

    #[error("Cannot {action} scenario {scenario_id} in status {status}")]
    InvalidStatus {
        scenario_id: ScenarioId,
        status: ScenarioStatus,
        action: &'static str,
    },

    #[error("Required questions unanswered: {}", missing.join(", "))]
    RequiredUnanswered { missing: Vec<String> },

    #[error("Question '{0}' is not asked by this scenario's tree")]
    UnknownQuestion(String),

    #[error("Node {0} is not visible in this scenario")]
    NodeUnavailable(NodeId),

    #[error("Answer for '{question}' rejected by {} rule condition(s)", failing.len())]
    RuleViolation {
        question: String,
        failing: Vec<ConditionId>,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScenarioError {
    pub fn code(&self) -> &'static str {
        match self {
            ScenarioError::NotFound(_) => "SCN_NOT_FOUND",
            ScenarioError::InvalidStatus { .. } => "SCN_INVALID_STATUS",
            ScenarioError::RequiredUnanswered { .. } => "SCN_REQUIRED_UNANSWERED",
            ScenarioError::UnknownQuestion(_) => "SCN_UNKNOWN_QUESTION",
            ScenarioError::NodeUnavailable(_) => "SCN_NODE_UNAVAILABLE",
            ScenarioError::RuleViolation { .. } => "SCN_VALIDATION_FAILED",
            ScenarioError::Catalog(e) => e.code(),
            ScenarioError::Tree(e) => e.code(),
            ScenarioError::Condition(e) => e.code(),
            ScenarioError::EventLog(e) => e.code(),
            ScenarioError::Bundle(e) => e.code(),
            ScenarioError::Internal(_) => "SCN_INTERNAL",
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            ScenarioError::UnknownQuestion(_) => 400,
            ScenarioError::RuleViolation { .. } => 400,
            ScenarioError::Catalog(CatalogError::Validation(_)) => 400,
            ScenarioError::Catalog(CatalogError::InvalidDefinition(_)) => 400,
            ScenarioError::Tree(TreeError::InvalidNodeShape(_)) => 400,
            ScenarioError::Tree(TreeError::InvalidOrder) => 400,
            ScenarioError::Bundle(BundleError::Invalid(_)) => 400,
            ScenarioError::Bundle(BundleError::UnknownCondition { .. }) => 400,
            ScenarioError::Bundle(BundleError::UnknownQuestion(_)) => 400,
            ScenarioError::Bundle(BundleError::UnresolvedParents(_)) => 400,

            // 403 Forbidden
            ScenarioError::Catalog(CatalogError::ProtectedQuestion(_)) => 403,
            ScenarioError::EventLog(EventLogError::ImmutableLogViolation(_)) => 403,

            // 404 Not Found
            ScenarioError::NotFound(_) => 404,
            ScenarioError::Catalog(CatalogError::QuestionNotFound(_)) => 404,
            ScenarioError::Tree(TreeError::TreeNotFound(_)) => 404,
            ScenarioError::Tree(TreeError::NodeNotFound(_)) => 404,
            ScenarioError::Condition(ConditionError::NotFound(_)) => 404,

            // 409 Conflict
            ScenarioError::InvalidStatus { .. } => 409,
            ScenarioError::RequiredUnanswered { .. } => 409,
            ScenarioError::NodeUnavailable(_) => 409,
            ScenarioError::Catalog(CatalogError::QuestionInUse { .. }) => 409,
            ScenarioError::Catalog(CatalogError::QuestionExists { .. }) => 409,
            ScenarioError::Catalog(CatalogError::InvalidLifecycleTransition { .. }) => 409,
            ScenarioError::Tree(TreeError::TreeImmutable(_)) => 409,
            ScenarioError::Tree(TreeError::NotPublished(_)) => 409,
            ScenarioError::EventLog(EventLogError::ConcurrentModification { .. }) => 409,
            ScenarioError::Bundle(BundleError::Catalog(CatalogError::QuestionExists { .. })) => 409,

            // 422 Unprocessable Entity
            ScenarioError::Tree(TreeError::PublishValidation { .. }) => 422,
            ScenarioError::Condition(ConditionError::Cycle(_)) => 422,
            ScenarioError::Bundle(BundleError::ConditionCycle(_)) => 422,
            ScenarioError::Bundle(BundleError::Tree(TreeError::PublishValidation { .. })) => 422,

            // 500 Internal Server Error
            _ => 500,
        }
    }

    /// Retrying against the current version may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScenarioError::EventLog(EventLogError::ConcurrentModification { .. })
        )
    }
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;
