//! Question definitions
//!
//! A question's `id` is permanent. Lifecycle moves forward only:
//! draft -> active -> deprecated -> archived (draft may also be archived
//! directly when abandoned).

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{LenderId, QuestionId, TenantId};

/// Data type of a question's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Number,
    Boolean,
    Date,
    /// One of `ValidationSchema::options`, stored as text
    Enum,
    /// Subset of `ValidationSchema::options`, stored as a JSON array
    MultiSelect,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Enum => "enum",
            DataType::MultiSelect => "multi_select",
            DataType::Json => "json",
        }
    }
}

/// Constraints applied to an answer value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationSchema {
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_range(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }
}

/// Who owns a question and where it may be used
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lender_id", rename_all = "snake_case")]
pub enum QuestionScope {
    /// Platform-wide standard question; protected
    System,
    /// Defined by one tenant for all its trees
    Tenant,
    /// Defined for one lender's programs within a tenant
    Lender(LenderId),
    /// Ad-hoc question of one tenant
    Custom,
}

impl QuestionScope {
    /// Resolution rank for `find`: lower wins
    pub(crate) fn rank(&self) -> u8 {
        match self {
            QuestionScope::Lender(_) | QuestionScope::Custom => 0,
            QuestionScope::Tenant => 1,
            QuestionScope::System => 2,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, QuestionScope::System)
    }
}

/// Question lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Draft,
    Active,
    Deprecated,
    Archived,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Draft => "draft",
            Lifecycle::Active => "active",
            Lifecycle::Deprecated => "deprecated",
            Lifecycle::Archived => "archived",
        }
    }

    /// Whether moving from `self` to `to` is allowed.
    pub fn can_transition_to(self, to: Lifecycle) -> bool {
        matches!(
            (self, to),
            (Lifecycle::Draft, Lifecycle::Active)
                | (Lifecycle::Draft, Lifecycle::Archived)
                | (Lifecycle::Active, Lifecycle::Deprecated)
                | (Lifecycle::Active, Lifecycle::Archived)
                | (Lifecycle::Deprecated, Lifecycle::Archived)
        )
    }

    /// Active and deprecated questions still resolve for lookups.
    pub fn is_resolvable(self) -> bool {
        matches!(self, Lifecycle::Active | Lifecycle::Deprecated)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open real-world validity `[valid_from, valid_to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    pub fn open_from(valid_from: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_to: None,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.valid_from && self.valid_to.map_or(true, |to| at < to)
    }
}

/// Input for defining a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub code: String,
    pub prompt: String,
    pub scope: QuestionScope,
    pub data_type: DataType,
    #[serde(default)]
    pub schema: ValidationSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
}

impl QuestionSpec {
    pub fn new(
        code: impl Into<String>,
        prompt: impl Into<String>,
        scope: QuestionScope,
        data_type: DataType,
    ) -> Self {
        Self {
            code: code.into(),
            prompt: prompt.into(),
            scope,
            data_type,
            schema: ValidationSchema::default(),
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn with_schema(mut self, schema: ValidationSchema) -> Self {
        self.schema = schema;
        self
    }
}

/// A catalogued question version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub code: String,
    pub prompt: String,
    pub scope: QuestionScope,
    /// `None` only for system questions
    pub owner: Option<TenantId>,
    pub data_type: DataType,
    pub schema: ValidationSchema,
    pub lifecycle: Lifecycle,
    pub validity: ValidityWindow,
    pub version: u32,
    /// System time this version was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Question {
    pub(crate) fn from_spec(spec: QuestionSpec, owner: Option<TenantId>, version: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: spec.code,
            prompt: spec.prompt,
            scope: spec.scope,
            owner,
            data_type: spec.data_type,
            schema: spec.schema,
            lifecycle: Lifecycle::Draft,
            validity: ValidityWindow {
                valid_from: spec.valid_from.unwrap_or(now),
                valid_to: spec.valid_to,
            },
            version,
            recorded_at: now,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.scope.is_protected()
    }

    /// Resolvable and valid in the real world at `at`
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.lifecycle.is_resolvable() && self.validity.contains(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lifecycle_is_monotonic() {
        assert!(Lifecycle::Draft.can_transition_to(Lifecycle::Active));
        assert!(Lifecycle::Active.can_transition_to(Lifecycle::Deprecated));
        assert!(Lifecycle::Deprecated.can_transition_to(Lifecycle::Archived));
        assert!(!Lifecycle::Active.can_transition_to(Lifecycle::Draft));
        assert!(!Lifecycle::Archived.can_transition_to(Lifecycle::Active));
        assert!(!Lifecycle::Deprecated.can_transition_to(Lifecycle::Active));
        assert!(!Lifecycle::Active.can_transition_to(Lifecycle::Active));
    }

    #[test]
    fn test_validity_window_half_open() {
        let from = Utc::now();
        let to = from + Duration::days(1);
        let window = ValidityWindow {
            valid_from: from,
            valid_to: Some(to),
        };
        assert!(window.contains(from));
        assert!(window.contains(from + Duration::hours(3)));
        assert!(!window.contains(to));
        assert!(!window.contains(from - Duration::seconds(1)));
    }

    #[test]
    fn test_scope_rank_prefers_narrow_scopes() {
        assert!(QuestionScope::Lender("l1".into()).rank() < QuestionScope::Tenant.rank());
        assert!(QuestionScope::Tenant.rank() < QuestionScope::System.rank());
        assert!(QuestionScope::System.is_protected());
    }
}
