//! Condition engine
//!
//! Content-addressed boolean expressions over answers, the rules binding
//! them to tree nodes, and their evaluation.
//!
//! # Invariants
//!
//! - A condition never changes; a changed rule is a new condition
//! - Evaluation is pure and never panics or errors
//! - Malformed conditions evaluate false and are logged

mod engine;
mod errors;
mod operators;
mod rules;
mod store;
mod types;

pub use engine::{AnswerLookup, ConditionEngine, Evaluation, WithCandidate, MAX_DEPTH};
pub use errors::{ConditionError, ConditionResult};
pub use operators::{Fallback, OperatorEval};
pub use rules::{chain, NodeRule, RulePurpose};
pub use store::ConditionStore;
pub use types::{ComputeFn, Condition, ConditionExpr, ConditionSet, Operand, Operator};
