//! Catalog error types
//!
//! Error codes:
//! - SCN_VALIDATION_FAILED (recoverable, nothing recorded)
//! - SCN_PROTECTED_QUESTION
//! - SCN_QUESTION_IN_USE
//! - SCN_INVALID_LIFECYCLE_TRANSITION
//! - SCN_QUESTION_NOT_FOUND
//! - SCN_QUESTION_EXISTS

use std::fmt;

use thiserror::Error;

use crate::core::QuestionId;

use super::question::Lifecycle;

/// Validation failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Question code the value was offered for
    pub question: String,
    /// Expected type or constraint
    pub expected: String,
    /// What was offered
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        question: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "question '{}': expected {}, got {}",
            self.question, self.expected, self.actual
        )
    }
}

/// Catalog errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Validation failed: {0}")]
    Validation(ValidationDetails),

    #[error("Question '{0}' is protected and cannot be renamed or deleted")]
    ProtectedQuestion(String),

    #[error("Question '{code}' is referenced by {scenarios} active scenario(s)")]
    QuestionInUse { code: String, scenarios: usize },

    #[error("Invalid lifecycle transition for '{code}': {from} -> {to}")]
    InvalidLifecycleTransition {
        code: String,
        from: Lifecycle,
        to: Lifecycle,
    },

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Question '{code}' version {version} already exists")]
    QuestionExists { code: String, version: u32 },

    #[error("Invalid question definition: {0}")]
    InvalidDefinition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    pub fn not_found(id: QuestionId) -> Self {
        CatalogError::QuestionNotFound(id.to_string())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "SCN_VALIDATION_FAILED",
            CatalogError::ProtectedQuestion(_) => "SCN_PROTECTED_QUESTION",
            CatalogError::QuestionInUse { .. } => "SCN_QUESTION_IN_USE",
            CatalogError::InvalidLifecycleTransition { .. } => "SCN_INVALID_LIFECYCLE_TRANSITION",
            CatalogError::QuestionNotFound(_) => "SCN_QUESTION_NOT_FOUND",
            CatalogError::QuestionExists { .. } => "SCN_QUESTION_EXISTS",
            CatalogError::InvalidDefinition(_) => "SCN_INVALID_QUESTION",
            CatalogError::Internal(_) => "SCN_INTERNAL",
        }
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
