//! Condition expressions
//!
//! Conditions are immutable and content-addressed: the id is the SHA-256 of
//! the expression's canonical JSON. Compound conditions reference children
//! by id, so the store stays flat.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{content_hash, AnswerValue, ConditionId};

/// Comparison operator of a simple condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    NotExists,
    Between,
    /// Any name this build does not know; always evaluates false
    Unknown,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Ne => "NE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STARTS_WITH",
            Operator::EndsWith => "ENDS_WITH",
            Operator::Matches => "MATCHES",
            Operator::Exists => "EXISTS",
            Operator::NotExists => "NOT_EXISTS",
            Operator::Between => "BETWEEN",
            Operator::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(name: &str) -> Operator {
        match name.to_ascii_uppercase().as_str() {
            "EQ" => Operator::Eq,
            "NE" => Operator::Ne,
            "GT" => Operator::Gt,
            "GTE" => Operator::Gte,
            "LT" => Operator::Lt,
            "LTE" => Operator::Lte,
            "IN" => Operator::In,
            "NOT_IN" => Operator::NotIn,
            "CONTAINS" => Operator::Contains,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "MATCHES" => Operator::Matches,
            "EXISTS" => Operator::Exists,
            "NOT_EXISTS" => Operator::NotExists,
            "BETWEEN" => Operator::Between,
            _ => Operator::Unknown,
        }
    }

    /// Operators that only look at the left operand
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Operator::parse(&name)
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function of a computed operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputeFn {
    Sum,
    /// First argument minus the rest
    Difference,
    Product,
    /// First argument divided by the second
    Ratio,
    Min,
    Max,
    /// Characters of a text, or elements of an array
    Length,
}

/// One side of a simple condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    Literal { value: AnswerValue },
    /// Current answer of a question, by code
    Question { code: String },
    Computed { function: ComputeFn, args: Vec<Operand> },
}

impl Operand {
    pub fn literal(value: AnswerValue) -> Self {
        Operand::Literal { value }
    }

    pub fn question(code: impl Into<String>) -> Self {
        Operand::Question { code: code.into() }
    }

    pub fn computed(function: ComputeFn, args: Vec<Operand>) -> Self {
        Operand::Computed { function, args }
    }

    /// Question codes this operand reads
    pub fn question_codes(&self, out: &mut Vec<String>) {
        match self {
            Operand::Literal { .. } => {}
            Operand::Question { code } => out.push(code.clone()),
            Operand::Computed { args, .. } => args.iter().for_each(|a| a.question_codes(out)),
        }
    }
}

/// A boolean expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionExpr {
    Simple {
        left: Operand,
        op: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<Operand>,
    },
    And { children: Vec<ConditionId> },
    Or { children: Vec<ConditionId> },
    Not { child: ConditionId },
}

impl ConditionExpr {
    pub fn simple(left: Operand, op: Operator, right: Operand) -> Self {
        ConditionExpr::Simple {
            left,
            op,
            right: Some(right),
        }
    }

    pub fn unary(left: Operand, op: Operator) -> Self {
        ConditionExpr::Simple {
            left,
            op,
            right: None,
        }
    }

    /// `question == literal`, the most common rule shape
    pub fn answer_equals(code: impl Into<String>, value: AnswerValue) -> Self {
        Self::simple(Operand::question(code), Operator::Eq, Operand::literal(value))
    }

    /// Ids of direct children
    pub fn children(&self) -> Vec<&ConditionId> {
        match self {
            ConditionExpr::Simple { .. } => Vec::new(),
            ConditionExpr::And { children } | ConditionExpr::Or { children } => {
                children.iter().collect()
            }
            ConditionExpr::Not { child } => vec![child],
        }
    }

    /// Canonical JSON; identical expressions always render identically
    pub fn canonical_json(&self) -> String {
        // Struct fields serialize in declaration order and JSON objects in
        // literals are sorted maps, so the rendering is stable.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Content-addressed id of this expression
    pub fn id(&self) -> ConditionId {
        ConditionId::from_digest(content_hash(&[b"condition", self.canonical_json().as_bytes()]))
    }
}

/// A stored condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub expr: ConditionExpr,
}

/// Flat id-keyed set of conditions, as captured by a published tree
pub type ConditionSet = HashMap<ConditionId, ConditionExpr>;
