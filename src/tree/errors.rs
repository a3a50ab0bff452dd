//! Tree store errors
//!
//! Error codes:
//! - SCN_TREE_NOT_FOUND
//! - SCN_NODE_NOT_FOUND
//! - SCN_TREE_IMMUTABLE (published trees are never edited in place)
//! - SCN_INVALID_NODE_SHAPE
//! - SCN_TREE_PUBLISH_VALIDATION (tree stays unpublished)

use thiserror::Error;

use crate::core::{NodeId, TreeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Tree not found: {0}")]
    TreeNotFound(TreeId),

    #[error("Tree {0} is not published")]
    NotPublished(TreeId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Tree {0} is published and cannot be edited; create a new version")]
    TreeImmutable(TreeId),

    #[error("Invalid node: {0}")]
    InvalidNodeShape(String),

    #[error("No order key fits between the given siblings")]
    InvalidOrder,

    #[error("Tree {tree_id} failed publish validation: {}", issues.join("; "))]
    PublishValidation { tree_id: TreeId, issues: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TreeError {
    pub fn code(&self) -> &'static str {
        match self {
            TreeError::TreeNotFound(_) => "SCN_TREE_NOT_FOUND",
            TreeError::NotPublished(_) => "SCN_TREE_NOT_PUBLISHED",
            TreeError::NodeNotFound(_) => "SCN_NODE_NOT_FOUND",
            TreeError::TreeImmutable(_) => "SCN_TREE_IMMUTABLE",
            TreeError::InvalidNodeShape(_) => "SCN_INVALID_NODE_SHAPE",
            TreeError::InvalidOrder => "SCN_INVALID_ORDER",
            TreeError::PublishValidation { .. } => "SCN_TREE_PUBLISH_VALIDATION",
            TreeError::Internal(_) => "SCN_INTERNAL",
        }
    }

    pub(crate) fn poisoned() -> Self {
        TreeError::Internal("tree store lock poisoned".into())
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
