//! Identifier types
//!
//! Externally assigned identities are UUIDs. Content-addressed identities
//! (nodes, conditions) are lowercase hex SHA-256 digests.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub type TenantId = String;
pub type LenderId = String;
pub type ScenarioId = Uuid;
pub type TreeId = Uuid;
pub type QuestionId = Uuid;
pub type EventId = Uuid;

/// Hex SHA-256 over a sequence of length-prefixed parts.
///
/// Length prefixes keep `["ab", "c"]` and `["a", "bc"]` distinct.
pub fn content_hash(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}

macro_rules! content_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an already computed digest
            pub fn from_digest(digest: impl Into<String>) -> Self {
                Self(digest.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 12 hex characters, for log lines
            pub fn short(&self) -> &str {
                &self.0[..self.0.len().min(12)]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

content_id!(
    /// Content-addressed tree node identity
    NodeId
);

content_id!(
    /// Content-addressed condition identity
    ConditionId
);
