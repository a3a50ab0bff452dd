//! Condition evaluation
//!
//! Pure and total: evaluation reads the condition set and the answer
//! context, never writes, and never fails. Malformed conditions evaluate
//! false and emit a `CONDITION_FALLBACK` warning.
//!
//! - `AND([]) = true`
//! - `OR([]) = false`
//! - `NOT` negates its single child
//!
//! A malformed part (dangling child, depth overflow, unknown operator,
//! invalid pattern) is undecided, at any nesting depth: `NOT` keeps it
//! undecided, `AND` is false if any child is false and otherwise undecided,
//! `OR` is true if any child is true and otherwise undecided. An undecided
//! condition evaluates false.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::core::{AnswerValue, ConditionId};
use crate::observability::{LogEvent, Logger, MetricsRegistry};

use super::operators::{Fallback, OperatorEval};
use super::rules::{chain, NodeRule, RulePurpose};
use super::types::{ComputeFn, ConditionExpr, ConditionSet, Operand};

/// Nesting limit for compound conditions
pub const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pass,
    Fail,
    Undecided,
}

impl Verdict {
    fn passed(self) -> bool {
        self == Verdict::Pass
    }

    fn negate(self) -> Verdict {
        match self {
            Verdict::Pass => Verdict::Fail,
            Verdict::Fail => Verdict::Pass,
            Verdict::Undecided => Verdict::Undecided,
        }
    }

    fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Fail, _) | (_, Verdict::Fail) => Verdict::Fail,
            (Verdict::Undecided, _) | (_, Verdict::Undecided) => Verdict::Undecided,
            _ => Verdict::Pass,
        }
    }

    fn or(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Pass, _) | (_, Verdict::Pass) => Verdict::Pass,
            (Verdict::Undecided, _) | (_, Verdict::Undecided) => Verdict::Undecided,
            _ => Verdict::Fail,
        }
    }
}

/// Read access to answers by question code
pub trait AnswerLookup {
    fn lookup(&self, code: &str) -> Option<&AnswerValue>;
}

impl AnswerLookup for HashMap<String, AnswerValue> {
    fn lookup(&self, code: &str) -> Option<&AnswerValue> {
        self.get(code)
    }
}

/// An answer context with one candidate answer laid over it
pub struct WithCandidate<'a> {
    base: &'a dyn AnswerLookup,
    code: &'a str,
    value: &'a AnswerValue,
}

impl<'a> WithCandidate<'a> {
    pub fn new(base: &'a dyn AnswerLookup, code: &'a str, value: &'a AnswerValue) -> Self {
        Self { base, code, value }
    }
}

impl AnswerLookup for WithCandidate<'_> {
    fn lookup(&self, code: &str) -> Option<&AnswerValue> {
        if code == self.code {
            Some(self.value)
        } else {
            self.base.lookup(code)
        }
    }
}

/// Result of a traced evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    /// Failing leaf conditions, sorted; empty when `passed`
    pub failing: Vec<ConditionId>,
}

/// Evaluates conditions from one condition set
pub struct ConditionEngine<'a> {
    conditions: &'a ConditionSet,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> ConditionEngine<'a> {
    pub fn new(conditions: &'a ConditionSet) -> Self {
        Self {
            conditions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Evaluate condition `id` against `ctx`.
    pub fn evaluate(&self, id: &ConditionId, ctx: &dyn AnswerLookup) -> bool {
        if let Some(m) = self.metrics {
            m.increment_conditions_evaluated();
        }
        let mut failing = Vec::new();
        self.eval(id, ctx, 0, &mut failing, false).passed()
    }

    /// Evaluate and collect the failing leaf conditions.
    pub fn evaluate_traced(&self, id: &ConditionId, ctx: &dyn AnswerLookup) -> Evaluation {
        if let Some(m) = self.metrics {
            m.increment_conditions_evaluated();
        }
        let mut failing = Vec::new();
        let passed = self.eval(id, ctx, 0, &mut failing, true).passed();
        if passed {
            failing.clear();
        }
        failing.sort();
        failing.dedup();
        Evaluation { passed, failing }
    }

    /// Evaluate the rule chain of one purpose.
    ///
    /// Returns `None` when the node has no rule of that purpose. Rules run in
    /// descending priority and combine with AND; a passing `stop_on_match`
    /// rule ends the chain as passed.
    pub fn evaluate_chain(
        &self,
        rules: &[NodeRule],
        purpose: RulePurpose,
        ctx: &dyn AnswerLookup,
    ) -> Option<Evaluation> {
        let ordered = chain(rules, purpose);
        if ordered.is_empty() {
            return None;
        }

        let mut failing = Vec::new();
        let mut passed = true;
        for rule in ordered {
            let eval = self.evaluate_traced(&rule.condition_id, ctx);
            if eval.passed {
                if rule.stop_on_match {
                    break;
                }
            } else {
                passed = false;
                failing.extend(eval.failing);
            }
        }
        failing.sort();
        failing.dedup();
        Some(Evaluation { passed, failing })
    }

    fn eval(
        &self,
        id: &ConditionId,
        ctx: &dyn AnswerLookup,
        depth: usize,
        failing: &mut Vec<ConditionId>,
        trace: bool,
    ) -> Verdict {
        if depth > MAX_DEPTH {
            self.fallback(id, Fallback::DepthExceeded);
            failing.push(id.clone());
            return Verdict::Undecided;
        }
        let expr = match self.conditions.get(id) {
            Some(expr) => expr,
            None => {
                self.fallback(id, Fallback::MissingChild);
                failing.push(id.clone());
                return Verdict::Undecided;
            }
        };

        match expr {
            ConditionExpr::Simple { left, op, right } => {
                let left = self.resolve(left, ctx);
                let right = right.as_ref().and_then(|r| self.resolve(r, ctx));
                let verdict = match OperatorEval::apply(*op, left.as_ref(), right.as_ref()) {
                    Ok(true) => Verdict::Pass,
                    Ok(false) => Verdict::Fail,
                    Err(fallback) => {
                        self.fallback(id, fallback);
                        Verdict::Undecided
                    }
                };
                if !verdict.passed() {
                    failing.push(id.clone());
                }
                verdict
            }
            ConditionExpr::And { children } => {
                let mut verdict = Verdict::Pass;
                for child in children {
                    verdict = verdict.and(self.eval(child, ctx, depth + 1, failing, trace));
                    // a false child decides AND whatever follows
                    if verdict == Verdict::Fail && !trace {
                        break;
                    }
                }
                verdict
            }
            ConditionExpr::Or { children } => {
                let mark = failing.len();
                let mut verdict = Verdict::Fail;
                for child in children {
                    verdict = verdict.or(self.eval(child, ctx, depth + 1, failing, trace));
                    if verdict == Verdict::Pass {
                        break;
                    }
                }
                if verdict.passed() {
                    failing.truncate(mark);
                }
                verdict
            }
            ConditionExpr::Not { child } => {
                // The child's own failures explain nothing about the negation.
                let mut scratch = Vec::new();
                let verdict = self.eval(child, ctx, depth + 1, &mut scratch, trace).negate();
                if !verdict.passed() {
                    failing.push(id.clone());
                }
                verdict
            }
        }
    }

    /// Resolve an operand; `None` means missing.
    fn resolve(&self, operand: &Operand, ctx: &dyn AnswerLookup) -> Option<AnswerValue> {
        match operand {
            Operand::Literal { value } => Some(value.clone()),
            Operand::Question { code } => ctx.lookup(code).cloned(),
            Operand::Computed { function, args } => {
                let values: Option<Vec<AnswerValue>> =
                    args.iter().map(|a| self.resolve(a, ctx)).collect();
                Self::compute(*function, &values?)
            }
        }
    }

    fn compute(function: ComputeFn, values: &[AnswerValue]) -> Option<AnswerValue> {
        if function == ComputeFn::Length {
            return match values {
                [AnswerValue::Text(s)] => Some(AnswerValue::number(s.chars().count() as u64)),
                [single] => single
                    .elements()
                    .map(|items| AnswerValue::number(items.len() as u64)),
                _ => None,
            };
        }

        let numbers: Vec<Decimal> = values
            .iter()
            .map(AnswerValue::as_number)
            .collect::<Option<Vec<_>>>()?;
        let (first, rest) = numbers.split_first()?;

        let result = match function {
            ComputeFn::Sum => rest.iter().try_fold(*first, |acc, n| acc.checked_add(*n))?,
            ComputeFn::Difference => rest.iter().try_fold(*first, |acc, n| acc.checked_sub(*n))?,
            ComputeFn::Product => rest.iter().try_fold(*first, |acc, n| acc.checked_mul(*n))?,
            ComputeFn::Ratio => match rest {
                [divisor] if !divisor.is_zero() => first.checked_div(*divisor)?,
                _ => return None,
            },
            ComputeFn::Min => rest.iter().fold(*first, |acc, n| acc.min(*n)),
            ComputeFn::Max => rest.iter().fold(*first, |acc, n| acc.max(*n)),
            ComputeFn::Length => return None,
        };
        Some(AnswerValue::Number(result))
    }

    fn fallback(&self, id: &ConditionId, fallback: Fallback) {
        if let Some(m) = self.metrics {
            m.increment_condition_fallbacks();
        }
        Logger::warn(
            LogEvent::ConditionFallback,
            &[("condition_id", id.short()), ("reason", fallback.reason().as_str())],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::types::Operator;
    use serde_json::json;

    struct Fixture {
        set: ConditionSet,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                set: ConditionSet::new(),
            }
        }

        fn add(&mut self, expr: ConditionExpr) -> ConditionId {
            let id = expr.id();
            self.set.insert(id.clone(), expr);
            id
        }
    }

    fn answers(pairs: &[(&str, AnswerValue)]) -> HashMap<String, AnswerValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_and_is_true_empty_or_is_false() {
        let mut f = Fixture::new();
        let and = f.add(ConditionExpr::And { children: vec![] });
        let or = f.add(ConditionExpr::Or { children: vec![] });
        let engine = ConditionEngine::new(&f.set);
        let ctx = answers(&[]);
        assert!(engine.evaluate(&and, &ctx));
        assert!(!engine.evaluate(&or, &ctx));
    }

    #[test]
    fn test_double_negation() {
        let mut f = Fixture::new();
        let leaf = f.add(ConditionExpr::answer_equals("purpose", AnswerValue::text("refinance")));
        let not = f.add(ConditionExpr::Not { child: leaf.clone() });
        let not_not = f.add(ConditionExpr::Not { child: not });
        let engine = ConditionEngine::new(&f.set);

        for value in ["refinance", "purchase"] {
            let ctx = answers(&[("purpose", AnswerValue::text(value))]);
            assert_eq!(engine.evaluate(&not_not, &ctx), engine.evaluate(&leaf, &ctx));
        }
    }

    #[test]
    fn test_missing_child_falls_back_to_false() {
        let metrics = MetricsRegistry::new();
        let mut f = Fixture::new();
        let and = f.add(ConditionExpr::And {
            children: vec![ConditionId::from_digest("ghost")],
        });
        let not = f.add(ConditionExpr::Not {
            child: ConditionId::from_digest("ghost"),
        });
        let engine = ConditionEngine::new(&f.set).with_metrics(&metrics);
        let ctx = answers(&[]);
        assert!(!engine.evaluate(&and, &ctx));
        // a dangling NOT must not turn into true
        assert!(!engine.evaluate(&not, &ctx));
        assert!(!engine.evaluate(&ConditionId::from_digest("nowhere"), &ctx));
        assert_eq!(metrics.snapshot().condition_fallbacks, 3);
    }

    #[test]
    fn test_depth_limit() {
        let mut f = Fixture::new();
        let mut id = f.add(ConditionExpr::And { children: vec![] });
        for _ in 0..(MAX_DEPTH + 5) {
            id = f.add(ConditionExpr::And {
                children: vec![id],
            });
        }
        let engine = ConditionEngine::new(&f.set);
        assert!(!engine.evaluate(&id, &answers(&[])));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        let mut f = Fixture::new();
        let id = f.add(ConditionExpr::simple(
            Operand::question("a"),
            Operator::Unknown,
            Operand::literal(AnswerValue::text("a")),
        ));
        let engine = ConditionEngine::new(&f.set);
        assert!(!engine.evaluate(&id, &answers(&[("a", AnswerValue::text("a"))])));
    }

    #[test]
    fn test_negation_keeps_malformed_false_at_any_depth() {
        let metrics = MetricsRegistry::new();
        let mut f = Fixture::new();
        let ghost = ConditionId::from_digest("ghost");
        let and = f.add(ConditionExpr::And {
            children: vec![ghost.clone()],
        });
        let not_and = f.add(ConditionExpr::Not { child: and });
        let not = f.add(ConditionExpr::Not { child: ghost });
        let not_not = f.add(ConditionExpr::Not { child: not.clone() });
        let not_not_not = f.add(ConditionExpr::Not { child: not_not.clone() });
        let bad_op = f.add(ConditionExpr::simple(
            Operand::question("a"),
            Operator::Unknown,
            Operand::literal(AnswerValue::text("a")),
        ));
        let not_bad_op = f.add(ConditionExpr::Not { child: bad_op });
        let engine = ConditionEngine::new(&f.set).with_metrics(&metrics);
        let ctx = answers(&[("a", AnswerValue::text("a"))]);

        for id in [&not_and, &not, &not_not, &not_not_not, &not_bad_op] {
            assert!(!engine.evaluate(id, &ctx));
            assert!(!engine.evaluate_traced(id, &ctx).passed);
        }
        assert_eq!(metrics.snapshot().condition_fallbacks, 10);
    }

    #[test]
    fn test_decided_branches_outweigh_malformed_ones() {
        let mut f = Fixture::new();
        let ghost = ConditionId::from_digest("ghost");
        let yes = f.add(ConditionExpr::answer_equals("purpose", AnswerValue::text("refinance")));
        let no = f.add(ConditionExpr::answer_equals("purpose", AnswerValue::text("purchase")));
        let or = f.add(ConditionExpr::Or {
            children: vec![ghost.clone(), yes],
        });
        let and = f.add(ConditionExpr::And {
            children: vec![ghost, no],
        });
        let not_and = f.add(ConditionExpr::Not { child: and });
        let engine = ConditionEngine::new(&f.set);
        let ctx = answers(&[("purpose", AnswerValue::text("refinance"))]);

        assert!(engine.evaluate(&or, &ctx));
        assert!(engine.evaluate_traced(&or, &ctx).passed);
        // AND with a false branch is false whatever the malformed one holds
        assert!(engine.evaluate(&not_and, &ctx));
    }

    #[test]
    fn test_computed_ratio() {
        let mut f = Fixture::new();
        let ltv = Operand::computed(
            ComputeFn::Ratio,
            vec![Operand::question("loan_amount"), Operand::question("property_value")],
        );
        let high_ltv = f.add(ConditionExpr::simple(
            ltv,
            Operator::Gt,
            Operand::literal(AnswerValue::Number("0.8".parse().unwrap())),
        ));
        let engine = ConditionEngine::new(&f.set);

        let ctx = answers(&[
            ("loan_amount", AnswerValue::number(450_000)),
            ("property_value", AnswerValue::number(500_000)),
        ]);
        assert!(engine.evaluate(&high_ltv, &ctx));

        let zero = answers(&[
            ("loan_amount", AnswerValue::number(450_000)),
            ("property_value", AnswerValue::number(0)),
        ]);
        assert!(!engine.evaluate(&high_ltv, &zero));
        assert!(!engine.evaluate(&high_ltv, &answers(&[("loan_amount", AnswerValue::number(1))])));
    }

    #[test]
    fn test_computed_sum_and_length() {
        assert_eq!(
            ConditionEngine::compute(
                ComputeFn::Sum,
                &[AnswerValue::number(1), AnswerValue::number(2), AnswerValue::number(3)]
            ),
            Some(AnswerValue::number(6))
        );
        assert_eq!(
            ConditionEngine::compute(ComputeFn::Length, &[AnswerValue::Json(json!([1, 2]))]),
            Some(AnswerValue::number(2))
        );
        assert_eq!(
            ConditionEngine::compute(ComputeFn::Sum, &[AnswerValue::text("x")]),
            None
        );
    }

    #[test]
    fn test_traced_reports_failing_leaves() {
        let mut f = Fixture::new();
        let refinance = f.add(ConditionExpr::answer_equals("purpose", AnswerValue::text("refinance")));
        let has_fico = f.add(ConditionExpr::unary(Operand::question("fico"), Operator::Exists));
        let both = f.add(ConditionExpr::And {
            children: vec![refinance.clone(), has_fico.clone()],
        });
        let engine = ConditionEngine::new(&f.set);

        let ctx = answers(&[("purpose", AnswerValue::text("purchase"))]);
        let eval = engine.evaluate_traced(&both, &ctx);
        assert!(!eval.passed);
        let mut expected = vec![refinance, has_fico];
        expected.sort();
        assert_eq!(eval.failing, expected);
    }

    #[test]
    fn test_traced_or_passing_has_no_failures() {
        let mut f = Fixture::new();
        let a = f.add(ConditionExpr::answer_equals("x", AnswerValue::text("a")));
        let b = f.add(ConditionExpr::answer_equals("x", AnswerValue::text("b")));
        let either = f.add(ConditionExpr::Or { children: vec![a, b] });
        let engine = ConditionEngine::new(&f.set);
        let eval = engine.evaluate_traced(&either, &answers(&[("x", AnswerValue::text("b"))]));
        assert!(eval.passed);
        assert!(eval.failing.is_empty());
    }

    #[test]
    fn test_chain_and_stop_on_match() {
        let mut f = Fixture::new();
        let vip = f.add(ConditionExpr::answer_equals("tier", AnswerValue::text("vip")));
        let big = f.add(ConditionExpr::simple(
            Operand::question("amount"),
            Operator::Gt,
            Operand::literal(AnswerValue::number(100)),
        ));
        let engine = ConditionEngine::new(&f.set);
        let ctx = answers(&[
            ("tier", AnswerValue::text("vip")),
            ("amount", AnswerValue::number(5)),
        ]);

        let plain = vec![NodeRule::visibility(vip.clone()), NodeRule::visibility(big.clone())];
        let eval = engine.evaluate_chain(&plain, RulePurpose::Visibility, &ctx).unwrap();
        assert!(!eval.passed);
        assert_eq!(eval.failing, vec![big.clone()]);

        let short = vec![
            NodeRule::visibility(vip).with_priority(10).stop_on_match(),
            NodeRule::visibility(big),
        ];
        assert!(engine.evaluate_chain(&short, RulePurpose::Visibility, &ctx).unwrap().passed);
        assert!(engine.evaluate_chain(&short, RulePurpose::Requirement, &ctx).is_none());
    }

    #[test]
    fn test_candidate_overlay() {
        let base = answers(&[("a", AnswerValue::number(1))]);
        let candidate = AnswerValue::number(2);
        let ctx = WithCandidate::new(&base, "b", &candidate);
        assert_eq!(ctx.lookup("a"), Some(&AnswerValue::number(1)));
        assert_eq!(ctx.lookup("b"), Some(&AnswerValue::number(2)));
    }
}
