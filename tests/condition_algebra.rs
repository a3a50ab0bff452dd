//! Condition Algebra Tests
//!
//! - `AND([]) = true`, `OR([]) = false`
//! - `NOT(NOT(c))` evaluates like `c`
//! - Evaluation is total: missing answers, type mismatches, dangling
//!   children and runaway nesting all evaluate false without panicking
//! - Identical expressions share one content id

use std::collections::HashMap;

use scenariotree::condition::{
    ComputeFn, ConditionEngine, ConditionExpr, ConditionSet, ConditionStore, Operand, Operator,
    MAX_DEPTH,
};
use scenariotree::core::{AnswerValue, ConditionId};

// =============================================================================
// Test Utilities
// =============================================================================

fn answers(pairs: &[(&str, AnswerValue)]) -> HashMap<String, AnswerValue> {
    pairs
        .iter()
        .map(|(code, value)| (code.to_string(), value.clone()))
        .collect()
}

fn set(store: &ConditionStore, roots: &[ConditionId]) -> ConditionSet {
    store.closure(roots).unwrap()
}

fn is_refinance(store: &ConditionStore) -> ConditionId {
    store
        .define(ConditionExpr::answer_equals("loan_purpose", AnswerValue::text("refinance")))
        .unwrap()
}

// =============================================================================
// Identities
// =============================================================================

#[test]
fn test_empty_and_is_true_empty_or_is_false() {
    let store = ConditionStore::new();
    let and = store.define(ConditionExpr::And { children: vec![] }).unwrap();
    let or = store.define(ConditionExpr::Or { children: vec![] }).unwrap();
    let conditions = set(&store, &[and.clone(), or.clone()]);
    let engine = ConditionEngine::new(&conditions);
    let ctx = answers(&[]);

    assert!(engine.evaluate(&and, &ctx));
    assert!(!engine.evaluate(&or, &ctx));
}

#[test]
fn test_double_negation() {
    let store = ConditionStore::new();
    let base = is_refinance(&store);
    let not = store.define(ConditionExpr::Not { child: base.clone() }).unwrap();
    let not_not = store.define(ConditionExpr::Not { child: not.clone() }).unwrap();
    let conditions = set(&store, &[not_not.clone()]);
    let engine = ConditionEngine::new(&conditions);

    for ctx in [
        answers(&[]),
        answers(&[("loan_purpose", AnswerValue::text("refinance"))]),
        answers(&[("loan_purpose", AnswerValue::text("purchase"))]),
        answers(&[("loan_purpose", AnswerValue::number(7))]),
    ] {
        assert_eq!(engine.evaluate(&not_not, &ctx), engine.evaluate(&base, &ctx));
        assert_eq!(engine.evaluate(&not, &ctx), !engine.evaluate(&base, &ctx));
    }
}

#[test]
fn test_and_or_over_children() {
    let store = ConditionStore::new();
    let refi = is_refinance(&store);
    let cash = store
        .define(ConditionExpr::answer_equals("cash_out", AnswerValue::Bool(true)))
        .unwrap();
    let both = store
        .define(ConditionExpr::And { children: vec![refi.clone(), cash.clone()] })
        .unwrap();
    let either = store
        .define(ConditionExpr::Or { children: vec![refi, cash] })
        .unwrap();
    let conditions = set(&store, &[both.clone(), either.clone()]);
    let engine = ConditionEngine::new(&conditions);

    let ctx = answers(&[
        ("loan_purpose", AnswerValue::text("refinance")),
        ("cash_out", AnswerValue::Bool(false)),
    ]);
    assert!(!engine.evaluate(&both, &ctx));
    assert!(engine.evaluate(&either, &ctx));
}

// =============================================================================
// Totality
// =============================================================================

#[test]
fn test_missing_and_mismatched_answers_evaluate_false() {
    let store = ConditionStore::new();
    let over = store
        .define(ConditionExpr::simple(
            Operand::question("fico"),
            Operator::Gt,
            Operand::literal(AnswerValue::number(700)),
        ))
        .unwrap();
    let conditions = set(&store, &[over.clone()]);
    let engine = ConditionEngine::new(&conditions);

    assert!(!engine.evaluate(&over, &answers(&[])));
    assert!(!engine.evaluate(&over, &answers(&[("fico", AnswerValue::text("high"))])));
    assert!(engine.evaluate(&over, &answers(&[("fico", AnswerValue::number(720))])));
}

#[test]
fn test_computed_operands_never_panic() {
    let store = ConditionStore::new();
    let ratio = store
        .define(ConditionExpr::simple(
            Operand::computed(
                ComputeFn::Ratio,
                vec![Operand::question("loan"), Operand::question("value")],
            ),
            Operator::Lte,
            Operand::literal(AnswerValue::number(1)),
        ))
        .unwrap();
    let conditions = set(&store, &[ratio.clone()]);
    let engine = ConditionEngine::new(&conditions);

    let divide_by_zero = answers(&[
        ("loan", AnswerValue::number(100)),
        ("value", AnswerValue::number(0)),
    ]);
    assert!(!engine.evaluate(&ratio, &divide_by_zero));

    let fine = answers(&[
        ("loan", AnswerValue::number(80)),
        ("value", AnswerValue::number(100)),
    ]);
    assert!(engine.evaluate(&ratio, &fine));
}

#[test]
fn test_dangling_child_evaluates_false() {
    let mut conditions = ConditionSet::new();
    let missing = ConditionId::from_digest("0".repeat(64));
    let not = ConditionExpr::Not { child: missing };
    let id = not.id();
    conditions.insert(id.clone(), not);

    let engine = ConditionEngine::new(&conditions);
    let traced = engine.evaluate_traced(&id, &answers(&[]));
    assert!(!traced.passed);
}

#[test]
fn test_nesting_beyond_limit_evaluates_false() {
    let mut conditions = ConditionSet::new();
    let leaf = ConditionExpr::And { children: vec![] };
    let mut current = leaf.id();
    conditions.insert(current.clone(), leaf);
    for _ in 0..(MAX_DEPTH + 4) {
        let wrapper = ConditionExpr::And { children: vec![current] };
        current = wrapper.id();
        conditions.insert(current.clone(), wrapper);
    }

    let engine = ConditionEngine::new(&conditions);
    assert!(!engine.evaluate(&current, &answers(&[])));
}

// =============================================================================
// Content addressing
// =============================================================================

#[test]
fn test_identical_expressions_share_an_id() {
    let store = ConditionStore::new();
    let a = is_refinance(&store);
    let b = is_refinance(&store);
    assert_eq!(a, b);
    assert_eq!(store.len(), 1);

    let other = store
        .define(ConditionExpr::answer_equals("loan_purpose", AnswerValue::text("purchase")))
        .unwrap();
    assert_ne!(a, other);
}
