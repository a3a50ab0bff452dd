//! Bundle errors
//!
//! Error codes:
//! - SCN_BUNDLE_INVALID (malformed document, duplicate or dangling names)
//! - SCN_BUNDLE_CONDITION_CYCLE
//! - wrapped catalog, tree and condition codes

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::condition::ConditionError;
use crate::tree::TreeError;

#[derive(Debug, Clone, Error)]
pub enum BundleError {
    #[error("Invalid bundle: {0}")]
    Invalid(String),

    #[error("Condition '{name}' referenced by '{referenced_by}' is not defined")]
    UnknownCondition { name: String, referenced_by: String },

    #[error("Condition '{0}' references itself")]
    ConditionCycle(String),

    #[error("Question '{0}' is neither in the bundle nor in the catalog")]
    UnknownQuestion(String),

    #[error("Nodes with missing or cyclic parents: {}", .0.join(", "))]
    UnresolvedParents(Vec<String>),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Condition(#[from] ConditionError),
}

impl BundleError {
    pub fn code(&self) -> &'static str {
        match self {
            BundleError::Invalid(_)
            | BundleError::UnknownCondition { .. }
            | BundleError::UnknownQuestion(_)
            | BundleError::UnresolvedParents(_) => "SCN_BUNDLE_INVALID",
            BundleError::ConditionCycle(_) => "SCN_BUNDLE_CONDITION_CYCLE",
            BundleError::Catalog(e) => e.code(),
            BundleError::Tree(e) => e.code(),
            BundleError::Condition(e) => e.code(),
        }
    }
}

pub type BundleResult<T> = Result<T, BundleError>;
