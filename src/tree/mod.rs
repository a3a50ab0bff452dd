//! Tree store
//!
//! Versioned, content-addressed question trees with fractional sibling
//! ordering.
//!
//! # Invariants
//!
//! - Identical node content within a tree always has one id
//! - GROUP and INFO nodes never reference a question; QUESTION nodes do
//! - Published trees are immutable and were validated before freezing
//! - Inserting between siblings never changes the siblings' keys

mod errors;
mod node;
mod order;
mod store;

pub use errors::{TreeError, TreeResult};
pub use node::{NodeKind, NodeSpec, PublishedTree, Tree, TreeNode, TreeStatus};
pub use order::OrderKey;
pub use store::TreeStore;
