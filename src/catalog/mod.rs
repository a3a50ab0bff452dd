//! Question catalog
//!
//! Question identity, data type, lifecycle and scope.
//!
//! # Invariants
//!
//! - A question's id never changes, whatever its lifecycle
//! - Lifecycle only moves forward
//! - A question referenced by an active scenario cannot be archived
//! - System questions cannot be renamed or deleted

mod errors;
mod question;
mod registry;
mod validator;

pub use errors::{CatalogError, CatalogResult, ValidationDetails};
pub use question::{
    DataType, Lifecycle, Question, QuestionScope, QuestionSpec, ValidationSchema, ValidityWindow,
};
pub use registry::{NoUsage, QuestionCatalog, QuestionUsage};
pub use validator::AnswerValidator;
