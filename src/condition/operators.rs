//! Operator application over resolved operands
//!
//! No type coercion: values of different variants never compare equal and
//! never order. A missing operand makes every operator false except
//! `NOT_EXISTS`.

use std::cmp::Ordering;

use regex::Regex;

use crate::core::AnswerValue;

use super::types::Operator;

/// Why an operator could not be applied at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    UnknownOperator,
    InvalidPattern(String),
    /// BETWEEN needs a two-element `[low, high]` list
    MalformedRange,
    MissingChild,
    DepthExceeded,
}

impl Fallback {
    pub fn reason(&self) -> String {
        match self {
            Fallback::UnknownOperator => "unknown operator".to_string(),
            Fallback::InvalidPattern(e) => format!("invalid pattern: {}", e),
            Fallback::MalformedRange => "BETWEEN needs [low, high]".to_string(),
            Fallback::MissingChild => "child condition not found".to_string(),
            Fallback::DepthExceeded => "evaluation depth exceeded".to_string(),
        }
    }
}

/// Applies comparison, membership, pattern and existence operators
pub struct OperatorEval;

impl OperatorEval {
    /// Apply `op` to the resolved operands.
    ///
    /// `Err` means the rule itself is malformed; the caller treats it as
    /// false and logs a fallback.
    pub fn apply(
        op: Operator,
        left: Option<&AnswerValue>,
        right: Option<&AnswerValue>,
    ) -> Result<bool, Fallback> {
        let left = left.filter(|v| !Self::is_blank(v));

        match op {
            Operator::Exists => return Ok(left.is_some()),
            Operator::NotExists => return Ok(left.is_none()),
            Operator::Unknown => return Err(Fallback::UnknownOperator),
            _ => {}
        }

        let (left, right) = match (left, right) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(false),
        };

        match op {
            Operator::Eq => Ok(Self::eq(left, right)),
            Operator::Ne => Ok(!Self::eq(left, right)),
            Operator::Gt => Ok(Self::ordered(left, right, |o| o == Ordering::Greater)),
            Operator::Gte => Ok(Self::ordered(left, right, |o| o != Ordering::Less)),
            Operator::Lt => Ok(Self::ordered(left, right, |o| o == Ordering::Less)),
            Operator::Lte => Ok(Self::ordered(left, right, |o| o != Ordering::Greater)),
            Operator::In => Ok(right
                .elements()
                .map_or(false, |items| items.iter().any(|i| Self::eq(left, i)))),
            Operator::NotIn => Ok(right
                .elements()
                .map_or(false, |items| !items.iter().any(|i| Self::eq(left, i)))),
            Operator::Contains => Ok(Self::contains(left, right)),
            Operator::StartsWith => Ok(match (left, right) {
                (AnswerValue::Text(a), AnswerValue::Text(b)) => a.starts_with(b.as_str()),
                _ => false,
            }),
            Operator::EndsWith => Ok(match (left, right) {
                (AnswerValue::Text(a), AnswerValue::Text(b)) => a.ends_with(b.as_str()),
                _ => false,
            }),
            Operator::Matches => match (left, right) {
                (AnswerValue::Text(a), AnswerValue::Text(pattern)) => {
                    let re = Regex::new(pattern)
                        .map_err(|e| Fallback::InvalidPattern(e.to_string()))?;
                    Ok(re.is_match(a))
                }
                _ => Ok(false),
            },
            Operator::Between => {
                let bounds = right.elements().ok_or(Fallback::MalformedRange)?;
                match bounds.as_slice() {
                    [low, high] => Ok(Self::ordered(left, low, |o| o != Ordering::Less)
                        && Self::ordered(left, high, |o| o != Ordering::Greater)),
                    _ => Err(Fallback::MalformedRange),
                }
            }
            Operator::Exists | Operator::NotExists | Operator::Unknown => {
                Err(Fallback::UnknownOperator)
            }
        }
    }

    /// Cleared-to-empty answers count as missing
    fn is_blank(value: &AnswerValue) -> bool {
        match value {
            AnswerValue::Text(s) => s.is_empty(),
            AnswerValue::Json(v) => v.is_null(),
            _ => false,
        }
    }

    fn eq(left: &AnswerValue, right: &AnswerValue) -> bool {
        match left.compare(right) {
            Some(ordering) => ordering == Ordering::Equal,
            None => matches!((left, right), (AnswerValue::Json(a), AnswerValue::Json(b)) if a == b),
        }
    }

    fn ordered(left: &AnswerValue, right: &AnswerValue, pred: impl Fn(Ordering) -> bool) -> bool {
        left.compare(right).map_or(false, pred)
    }

    fn contains(left: &AnswerValue, right: &AnswerValue) -> bool {
        if let (AnswerValue::Text(a), AnswerValue::Text(b)) = (left, right) {
            return a.contains(b.as_str());
        }
        left.elements()
            .map_or(false, |items| items.iter().any(|i| Self::eq(i, right)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(op: Operator, l: &AnswerValue, r: &AnswerValue) -> bool {
        OperatorEval::apply(op, Some(l), Some(r)).unwrap()
    }

    #[test]
    fn test_equality_no_coercion() {
        assert!(apply(Operator::Eq, &AnswerValue::number(5), &AnswerValue::number(5)));
        assert!(!apply(Operator::Eq, &AnswerValue::number(5), &AnswerValue::text("5")));
        // NE across types is true: the values differ
        assert!(apply(Operator::Ne, &AnswerValue::number(5), &AnswerValue::text("5")));
    }

    #[test]
    fn test_decimal_equality_ignores_scale() {
        let a: rust_decimal::Decimal = "1.50".parse().unwrap();
        let b: rust_decimal::Decimal = "1.5".parse().unwrap();
        assert!(apply(Operator::Eq, &AnswerValue::Number(a), &AnswerValue::Number(b)));
    }

    #[test]
    fn test_ordering_operators() {
        let five = AnswerValue::number(5);
        let seven = AnswerValue::number(7);
        assert!(apply(Operator::Lt, &five, &seven));
        assert!(apply(Operator::Lte, &five, &five));
        assert!(apply(Operator::Gt, &seven, &five));
        assert!(apply(Operator::Gte, &seven, &seven));
        assert!(!apply(Operator::Gt, &five, &AnswerValue::text("a")));
    }

    #[test]
    fn test_missing_operand_is_false_except_not_exists() {
        let v = AnswerValue::number(1);
        assert!(!OperatorEval::apply(Operator::Eq, None, Some(&v)).unwrap());
        assert!(!OperatorEval::apply(Operator::Ne, None, Some(&v)).unwrap());
        assert!(!OperatorEval::apply(Operator::Exists, None, None).unwrap());
        assert!(OperatorEval::apply(Operator::NotExists, None, None).unwrap());
        assert!(OperatorEval::apply(Operator::NotExists, Some(&AnswerValue::text("")), None).unwrap());
    }

    #[test]
    fn test_membership() {
        let list = AnswerValue::Json(json!(["purchase", "refinance"]));
        assert!(apply(Operator::In, &AnswerValue::text("refinance"), &list));
        assert!(!apply(Operator::In, &AnswerValue::text("lease"), &list));
        assert!(apply(Operator::NotIn, &AnswerValue::text("lease"), &list));
        assert!(!apply(Operator::In, &AnswerValue::text("x"), &AnswerValue::text("x")));
    }

    #[test]
    fn test_text_operators() {
        let s = AnswerValue::text("cash-out refinance");
        assert!(apply(Operator::Contains, &s, &AnswerValue::text("out")));
        assert!(apply(Operator::StartsWith, &s, &AnswerValue::text("cash")));
        assert!(apply(Operator::EndsWith, &s, &AnswerValue::text("finance")));
        assert!(apply(Operator::Matches, &s, &AnswerValue::text("^cash-\\w+")));
        let tags = AnswerValue::Json(json!(["a", "b"]));
        assert!(apply(Operator::Contains, &tags, &AnswerValue::text("b")));
    }

    #[test]
    fn test_between_inclusive() {
        let range = AnswerValue::Json(json!([620, 850]));
        assert!(apply(Operator::Between, &AnswerValue::number(620), &range));
        assert!(apply(Operator::Between, &AnswerValue::number(700), &range));
        assert!(!apply(Operator::Between, &AnswerValue::number(900), &range));
        let bad = AnswerValue::Json(json!([1]));
        assert_eq!(
            OperatorEval::apply(Operator::Between, Some(&AnswerValue::number(1)), Some(&bad)),
            Err(Fallback::MalformedRange)
        );
    }

    #[test]
    fn test_malformed_rules_fall_back() {
        let s = AnswerValue::text("x");
        assert_eq!(
            OperatorEval::apply(Operator::Unknown, Some(&s), Some(&s)),
            Err(Fallback::UnknownOperator)
        );
        assert!(matches!(
            OperatorEval::apply(Operator::Matches, Some(&s), Some(&AnswerValue::text("("))),
            Err(Fallback::InvalidPattern(_))
        ));
    }
}
