//! Core types shared by every subsystem
//!
//! - `TenantContext`: explicit tenant/actor/correlation threading
//! - identifiers and content hashing
//! - `AnswerValue`: the closed answer value union

pub mod context;
pub mod ids;
pub mod value;

pub use context::{TenantContext, SYSTEM_ACTOR};
pub use ids::{
    content_hash, ConditionId, EventId, LenderId, NodeId, QuestionId, ScenarioId, TenantId,
    TreeId,
};
pub use value::AnswerValue;
