//! Authoring bundles
//!
//! A `TreeBundle` is the file format for questions, conditions and a tree
//! authored together. Installing a bundle defines everything it names and
//! publishes the tree.
//!
//! # Invariants
//!
//! - Conditions are defined before any condition that references them
//! - Nodes are created after their parent
//! - A failed install leaves no published tree behind

mod bundle;
mod errors;

pub use bundle::{
    BundleCondition, BundleExpr, BundleNode, BundleQuestion, BundleRule, Installed, TreeBundle,
};
pub use errors::{BundleError, BundleResult};
