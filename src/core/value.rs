//! Answer values
//!
//! A closed tagged union: operator dispatch in the condition engine matches
//! on it exhaustively. No implicit coercion happens here; see
//! `catalog::coerce` for the import path.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed answer value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Number(Decimal),
    Bool(bool),
    Date(NaiveDate),
    Json(Value),
}

impl AnswerValue {
    pub fn text(s: impl Into<String>) -> Self {
        AnswerValue::Text(s.into())
    }

    pub fn number(n: impl Into<Decimal>) -> Self {
        AnswerValue::Number(n.into())
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            AnswerValue::Text(_) => "text",
            AnswerValue::Number(_) => "number",
            AnswerValue::Bool(_) => "bool",
            AnswerValue::Date(_) => "date",
            AnswerValue::Json(_) => "json",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering between two values of the same variant.
    ///
    /// Returns `None` across variants and for JSON, which has no order.
    pub fn compare(&self, other: &AnswerValue) -> Option<Ordering> {
        match (self, other) {
            (AnswerValue::Text(a), AnswerValue::Text(b)) => Some(a.cmp(b)),
            (AnswerValue::Number(a), AnswerValue::Number(b)) => Some(a.cmp(b)),
            (AnswerValue::Bool(a), AnswerValue::Bool(b)) => Some(a.cmp(b)),
            (AnswerValue::Date(a), AnswerValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Elements of a collection-shaped value (JSON array).
    pub fn elements(&self) -> Option<Vec<AnswerValue>> {
        match self {
            AnswerValue::Json(Value::Array(items)) => {
                Some(items.iter().map(AnswerValue::from_json_scalar).collect())
            }
            _ => None,
        }
    }

    /// Map a JSON scalar onto the closest variant; objects and arrays stay JSON.
    pub fn from_json_scalar(value: &Value) -> AnswerValue {
        match value {
            Value::String(s) => AnswerValue::Text(s.clone()),
            Value::Bool(b) => AnswerValue::Bool(*b),
            Value::Number(n) => match n.to_string().parse::<Decimal>() {
                Ok(d) => AnswerValue::Number(d),
                Err(_) => AnswerValue::Json(value.clone()),
            },
            other => AnswerValue::Json(other.clone()),
        }
    }

    /// Plain JSON rendering used by the answer feed.
    pub fn to_plain_json(&self) -> Value {
        match self {
            AnswerValue::Text(s) => Value::String(s.clone()),
            AnswerValue::Number(n) => {
                if n.fract().is_zero() {
                    if let Some(i) = n.to_i64() {
                        return Value::from(i);
                    }
                }
                n.to_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(n.to_string()))
            }
            AnswerValue::Bool(b) => Value::Bool(*b),
            AnswerValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            AnswerValue::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Text(s) => write!(f, "{}", s),
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Bool(b) => write!(f, "{}", b),
            AnswerValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AnswerValue::Json(v) => write!(f, "{}", v),
        }
    }
}
