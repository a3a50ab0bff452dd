//! Answer validation against a question's data type and schema
//!
//! - Types must match exactly; no coercion on the user path
//! - Enum values must be one of the declared options
//! - Multi-select values must be a JSON array of distinct declared options
//! - Ranges, lengths and patterns apply where declared
//!
//! `coerce` is the lenient entry used by the import bridge: it maps raw
//! strings and JSON onto the question's type before validation.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::core::AnswerValue;

use super::errors::{CatalogError, CatalogResult, ValidationDetails};
use super::question::{DataType, Question};

/// Validates answer values for catalogued questions.
pub struct AnswerValidator;

impl AnswerValidator {
    /// Validate `value` for `question`.
    ///
    /// # Errors
    ///
    /// `CatalogError::Validation` describing the first violated constraint.
    pub fn validate(question: &Question, value: &AnswerValue) -> CatalogResult<()> {
        let fail = |expected: String, actual: String| -> CatalogResult<()> {
            Err(CatalogError::Validation(ValidationDetails::new(
                question.code.clone(),
                expected,
                actual,
            )))
        };

        match (question.data_type, value) {
            (DataType::Text, AnswerValue::Text(s)) => Self::check_text(question, s),
            (DataType::Number, AnswerValue::Number(n)) => Self::check_number(question, *n),
            (DataType::Boolean, AnswerValue::Bool(_)) => Ok(()),
            (DataType::Date, AnswerValue::Date(_)) => Ok(()),
            (DataType::Json, AnswerValue::Json(_)) => Ok(()),
            (DataType::Enum, AnswerValue::Text(s)) => {
                if question.schema.options.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    fail(
                        format!("one of [{}]", question.schema.options.join(", ")),
                        format!("'{}'", s),
                    )
                }
            }
            (DataType::MultiSelect, AnswerValue::Json(Value::Array(items))) => {
                let mut seen = Vec::with_capacity(items.len());
                for item in items {
                    let choice = match item.as_str() {
                        Some(c) => c,
                        None => return fail("array of strings".into(), item.to_string()),
                    };
                    if !question.schema.options.iter().any(|o| o == choice) {
                        return fail(
                            format!("subset of [{}]", question.schema.options.join(", ")),
                            format!("'{}'", choice),
                        );
                    }
                    if seen.contains(&choice) {
                        return fail("distinct selections".into(), format!("duplicate '{}'", choice));
                    }
                    seen.push(choice);
                }
                Ok(())
            }
            (expected, actual) => fail(expected.as_str().to_string(), actual.type_name().to_string()),
        }
    }

    fn check_text(question: &Question, s: &str) -> CatalogResult<()> {
        let schema = &question.schema;
        let len = s.chars().count();
        if let Some(min) = schema.min_length {
            if len < min {
                return Err(CatalogError::Validation(ValidationDetails::new(
                    question.code.clone(),
                    format!("at least {} characters", min),
                    format!("{} characters", len),
                )));
            }
        }
        if let Some(max) = schema.max_length {
            if len > max {
                return Err(CatalogError::Validation(ValidationDetails::new(
                    question.code.clone(),
                    format!("at most {} characters", max),
                    format!("{} characters", len),
                )));
            }
        }
        if let Some(pattern) = &schema.pattern {
            let re = Regex::new(pattern).map_err(|e| {
                CatalogError::InvalidDefinition(format!(
                    "question '{}' has invalid pattern: {}",
                    question.code, e
                ))
            })?;
            if !re.is_match(s) {
                return Err(CatalogError::Validation(ValidationDetails::new(
                    question.code.clone(),
                    format!("match for /{}/", pattern),
                    format!("'{}'", s),
                )));
            }
        }
        Ok(())
    }

    fn check_number(question: &Question, n: Decimal) -> CatalogResult<()> {
        if let Some(min) = question.schema.min {
            if n < min {
                return Err(CatalogError::Validation(ValidationDetails::new(
                    question.code.clone(),
                    format!(">= {}", min),
                    n.to_string(),
                )));
            }
        }
        if let Some(max) = question.schema.max {
            if n > max {
                return Err(CatalogError::Validation(ValidationDetails::new(
                    question.code.clone(),
                    format!("<= {}", max),
                    n.to_string(),
                )));
            }
        }
        Ok(())
    }

    /// Map a raw imported value onto the question's type.
    ///
    /// Accepts strings for every scalar type ("250000", "true", "2024-01-31").
    pub fn coerce(question: &Question, raw: &Value) -> CatalogResult<AnswerValue> {
        let mismatch = |expected: &str| {
            CatalogError::Validation(ValidationDetails::new(
                question.code.clone(),
                expected.to_string(),
                raw.to_string(),
            ))
        };

        match question.data_type {
            DataType::Text | DataType::Enum => match raw {
                Value::String(s) => Ok(AnswerValue::Text(s.trim().to_string())),
                Value::Number(n) => Ok(AnswerValue::Text(n.to_string())),
                Value::Bool(b) => Ok(AnswerValue::Text(b.to_string())),
                _ => Err(mismatch("text")),
            },
            DataType::Number => {
                let text = match raw {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().replace(',', ""),
                    _ => return Err(mismatch("number")),
                };
                text.parse::<Decimal>()
                    .map(AnswerValue::Number)
                    .or_else(|_| Decimal::from_scientific(&text).map(AnswerValue::Number))
                    .map_err(|_| mismatch("number"))
            }
            DataType::Boolean => match raw {
                Value::Bool(b) => Ok(AnswerValue::Bool(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "y" | "1" => Ok(AnswerValue::Bool(true)),
                    "false" | "no" | "n" | "0" => Ok(AnswerValue::Bool(false)),
                    _ => Err(mismatch("boolean")),
                },
                _ => Err(mismatch("boolean")),
            },
            DataType::Date => match raw {
                Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(AnswerValue::Date)
                    .map_err(|_| mismatch("date (YYYY-MM-DD)")),
                _ => Err(mismatch("date (YYYY-MM-DD)")),
            },
            DataType::MultiSelect => match raw {
                Value::Array(_) => Ok(AnswerValue::Json(raw.clone())),
                Value::String(s) => Ok(AnswerValue::Json(Value::Array(
                    s.split(',')
                        .map(|part| part.trim())
                        .filter(|part| !part.is_empty())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ))),
                _ => Err(mismatch("list of options")),
            },
            DataType::Json => Ok(AnswerValue::Json(raw.clone())),
        }
    }
}
