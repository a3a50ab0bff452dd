//! Condition store errors
//!
//! Evaluation never errors; these only surface while authoring and
//! publishing.

use thiserror::Error;

use crate::core::ConditionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Condition not found: {0}")]
    NotFound(ConditionId),

    #[error("Condition {0} is part of a reference cycle")]
    Cycle(ConditionId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConditionError {
    pub fn code(&self) -> &'static str {
        match self {
            ConditionError::NotFound(_) => "SCN_CONDITION_NOT_FOUND",
            ConditionError::Cycle(_) => "SCN_CONDITION_CYCLE",
            ConditionError::Internal(_) => "SCN_INTERNAL",
        }
    }
}

pub type ConditionResult<T> = Result<T, ConditionError>;
