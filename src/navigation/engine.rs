//! Node availability
//!
//! Availability is derived from a published tree and the current answers:
//!
//! - A node is visible when its VISIBILITY chain passes (or it has none, or
//!   it is `always_visible`) and no ancestor is invisible
//! - A node is required when it is visible, has REQUIREMENT rules and the
//!   REQUIREMENT chain passes
//! - Invisible nodes report the failing conditions of their own chain, or
//!   the ancestor that hides them

use std::collections::HashMap;

use serde::Serialize;

use crate::condition::{AnswerLookup, ConditionEngine, RulePurpose, WithCandidate};
use crate::core::{AnswerValue, ConditionId, NodeId, TreeId};
use crate::observability::MetricsRegistry;
use crate::projection::{AnswerSet, ProjectedState};
use crate::tree::{NodeKind, PublishedTree, TreeNode};

/// Availability of one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAvailability {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_code: Option<String>,
    pub visible: bool,
    pub required: bool,
    /// A valid answer exists
    pub answered: bool,
    /// Failing VISIBILITY conditions
    pub blocking: Vec<ConditionId>,
    /// Invisible ancestor that hides this node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_by: Option<NodeId>,
    /// COMPUTATION chain result, if the node has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<bool>,
}

/// Availability of every node of a scenario's tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub tree_id: TreeId,
    /// Scenario version the availability was computed at
    pub version: u64,
    /// Walk order
    pub nodes: Vec<NodeAvailability>,
    /// Answered required-visible / required-visible; 1 when nothing is required
    pub progress: f64,
    /// Codes of required visible questions without a valid answer
    pub missing_required: Vec<String>,
}

impl Availability {
    pub fn node(&self, id: &NodeId) -> Option<&NodeAvailability> {
        self.nodes.iter().find(|n| &n.node_id == id)
    }

    pub fn is_visible(&self, id: &NodeId) -> bool {
        self.node(id).map_or(false, |n| n.visible)
    }

    pub fn visible(&self) -> impl Iterator<Item = &NodeAvailability> {
        self.nodes.iter().filter(|n| n.visible)
    }

    /// Visibility of the node asking `code`
    pub fn is_code_visible(&self, code: &str) -> Option<bool> {
        self.nodes
            .iter()
            .find(|n| n.question_code.as_deref() == Some(code))
            .map(|n| n.visible)
    }

    /// Every required visible question has a valid answer
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Evaluates one published tree against scenario answers
pub struct NavigationEngine<'a> {
    tree: &'a PublishedTree,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> NavigationEngine<'a> {
    pub fn new(tree: &'a PublishedTree) -> Self {
        Self {
            tree,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn conditions(&self) -> ConditionEngine<'a> {
        let engine = ConditionEngine::new(&self.tree.conditions);
        match self.metrics {
            Some(m) => engine.with_metrics(m),
            None => engine,
        }
    }

    /// Availability of every node for the given state.
    pub fn available_nodes(&self, state: &ProjectedState) -> Availability {
        self.evaluate(&state.answers, state.version)
    }

    /// Availability of every node for an answer set.
    pub fn evaluate(&self, answers: &AnswerSet, version: u64) -> Availability {
        let conditions = self.conditions();
        let mut by_id: HashMap<&NodeId, (bool, Option<NodeId>)> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.tree.walk().len());
        let mut required_total = 0usize;
        let mut missing_required = Vec::new();

        for node in self.tree.walk() {
            let hidden_by = node
                .parent_id
                .as_ref()
                .and_then(|p| by_id.get(p))
                .and_then(|(visible, hidden_by)| {
                    if *visible {
                        None
                    } else {
                        // the parent is hidden by its own ancestor, or itself
                        hidden_by.clone().or_else(|| node.parent_id.clone())
                    }
                });

            let (visible, blocking) = if hidden_by.is_some() {
                (false, Vec::new())
            } else if node.always_visible {
                (true, Vec::new())
            } else {
                match conditions.evaluate_chain(&node.rules, RulePurpose::Visibility, answers) {
                    Some(eval) => (eval.passed, eval.failing),
                    None => (true, Vec::new()),
                }
            };

            let required = visible
                && conditions
                    .evaluate_chain(&node.rules, RulePurpose::Requirement, answers)
                    .map_or(false, |eval| eval.passed);
            let computed = conditions
                .evaluate_chain(&node.rules, RulePurpose::Computation, answers)
                .map(|eval| eval.passed);

            let question_code = self.tree.question_of(node).map(|q| q.code.clone());
            let answered = question_code
                .as_deref()
                .and_then(|code| answers.get(code))
                .map_or(false, |a| a.valid);

            if let (true, Some(code)) = (required, &question_code) {
                required_total += 1;
                if !answered {
                    missing_required.push(code.clone());
                }
            }

            by_id.insert(&node.id, (visible, hidden_by.clone()));
            nodes.push(NodeAvailability {
                node_id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                kind: node.kind,
                label: node.label.clone(),
                question_code,
                visible,
                required,
                answered,
                blocking,
                hidden_by,
                computed,
            });
        }

        let progress = if required_total == 0 {
            1.0
        } else {
            (required_total - missing_required.len()) as f64 / required_total as f64
        };

        Availability {
            tree_id: self.tree.id(),
            version,
            nodes,
            progress,
            missing_required,
        }
    }

    /// Check a candidate answer against the VALIDATION rules of the node
    /// asking `code`, with the candidate merged into the current answers.
    ///
    /// Returns the failing condition ids on rejection.
    pub fn check_answer(
        &self,
        code: &str,
        candidate: &AnswerValue,
        answers: &dyn AnswerLookup,
    ) -> Result<(), Vec<ConditionId>> {
        let node = match self.tree.node_for_code(code) {
            Some(node) => node,
            None => return Ok(()),
        };
        let ctx = WithCandidate::new(answers, code, candidate);
        match self
            .conditions()
            .evaluate_chain(&node.rules, RulePurpose::Validation, &ctx)
        {
            Some(eval) if !eval.passed => Err(eval.failing),
            _ => Ok(()),
        }
    }

    /// Fill the derived parts of `state.navigation` and return the
    /// availability used.
    pub fn refresh_navigation(&self, state: &mut ProjectedState) -> Availability {
        let availability = self.available_nodes(state);
        let nav = &mut state.navigation;
        nav.available.clear();
        nav.blocked.clear();
        for node in &availability.nodes {
            if node.visible {
                nav.available.insert(node.node_id.clone());
            } else {
                nav.blocked.insert(node.node_id.clone());
            }
        }
        nav.progress = availability.progress;
        availability
    }

    /// The tree node with this id
    pub fn node(&self, id: &NodeId) -> Option<&'a TreeNode> {
        self.tree.node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, QuestionCatalog, QuestionScope, QuestionSpec, ValidationSchema};
    use crate::condition::{ConditionExpr, ConditionStore, NodeRule, Operand, Operator};
    use crate::core::TenantContext;
    use crate::events::{Event, EventPayload, EventSource};
    use crate::projection::StateProjector;
    use crate::tree::{NodeSpec, TreeStore};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        tree: Arc<PublishedTree>,
        group: NodeId,
        cash_out: NodeId,
        amount: NodeId,
    }

    /// purpose (required) -> refi group (visible for refinance)
    ///   -> cash_out (required) -> amount (>= 1000)
    fn fixture() -> Fixture {
        let ctx = TenantContext::new("acme", "author");
        let catalog = QuestionCatalog::new();
        let conditions = ConditionStore::new();
        let trees = TreeStore::new();

        let mut ids = HashMap::new();
        for (code, data_type, schema) in [
            (
                "loan_purpose",
                DataType::Enum,
                ValidationSchema::with_options(["purchase", "refinance"]),
            ),
            ("cash_out", DataType::Boolean, ValidationSchema::default()),
            ("cash_out_amount", DataType::Number, ValidationSchema::default()),
        ] {
            let q = catalog
                .define(
                    &ctx,
                    QuestionSpec::new(code, code, QuestionScope::Tenant, data_type).with_schema(schema),
                )
                .unwrap();
            catalog.activate(&ctx, q.id).unwrap();
            ids.insert(code, q.id);
        }

        let always = conditions
            .define(ConditionExpr::unary(Operand::question("loan_purpose"), Operator::Exists))
            .unwrap();
        let is_refi = conditions
            .define(ConditionExpr::answer_equals("loan_purpose", AnswerValue::text("refinance")))
            .unwrap();
        let min_amount = conditions
            .define(ConditionExpr::simple(
                Operand::question("cash_out_amount"),
                Operator::Gte,
                Operand::literal(AnswerValue::number(1000)),
            ))
            .unwrap();

        let tree = trees.create_tree(&ctx, "mortgage").unwrap();
        trees
            .add_node(
                &ctx,
                tree.id,
                NodeSpec::question(ids["loan_purpose"], "Purpose")
                    .always_visible()
                    .with_rule(NodeRule::requirement(always.clone())),
            )
            .unwrap();
        let group = trees
            .add_node(
                &ctx,
                tree.id,
                NodeSpec::group("Refinance").with_rule(NodeRule::visibility(is_refi)),
            )
            .unwrap();
        let cash_out = trees
            .add_node(
                &ctx,
                tree.id,
                NodeSpec::question(ids["cash_out"], "Cash out?")
                    .under(&group.id)
                    .with_rule(NodeRule::requirement(always)),
            )
            .unwrap();
        let amount = trees
            .add_node(
                &ctx,
                tree.id,
                NodeSpec::question(ids["cash_out_amount"], "Amount")
                    .under(&group.id)
                    .with_rule(NodeRule::new(min_amount, RulePurpose::Validation)),
            )
            .unwrap();
        let published = trees.publish(&ctx, tree.id, &catalog, &conditions).unwrap();
        Fixture {
            tree: published,
            group: group.id,
            cash_out: cash_out.id,
            amount: amount.id,
        }
    }

    fn state(tree: &PublishedTree, answers: &[(&str, AnswerValue)]) -> ProjectedState {
        let scenario = Uuid::new_v4();
        let mut payloads = vec![EventPayload::ScenarioCreated {
            tree_id: tree.id(),
            tree_version: tree.tree.version,
        }];
        payloads.extend(
            answers
                .iter()
                .map(|(code, value)| EventPayload::answer(*code, value.clone())),
        );
        let events: Vec<Event> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Event {
                id: Uuid::new_v4(),
                tenant_id: "acme".into(),
                scenario_id: scenario,
                sequence: i as u64 + 1,
                payload,
                idempotency_key: format!("k{}", i),
                actor_id: "alice".into(),
                source: EventSource::User,
                correlation_id: Uuid::new_v4(),
                causation_id: None,
                recorded_at: Utc::now(),
            })
            .collect();
        StateProjector::project("acme", scenario, &events)
    }

    #[test]
    fn test_group_hidden_until_refinance() {
        let f = fixture();
        let engine = NavigationEngine::new(&f.tree);

        let purchase = engine.available_nodes(&state(&f.tree, &[("loan_purpose", AnswerValue::text("purchase"))]));
        let group = purchase.node(&f.group).unwrap();
        assert!(!group.visible);
        assert_eq!(group.blocking.len(), 1);
        let child = purchase.node(&f.cash_out).unwrap();
        assert!(!child.visible);
        assert!(!child.required);
        assert_eq!(child.hidden_by.as_ref(), Some(&f.group));
        assert!(purchase.is_complete());

        let refi = engine.available_nodes(&state(&f.tree, &[("loan_purpose", AnswerValue::text("refinance"))]));
        assert!(refi.is_visible(&f.group));
        assert!(refi.node(&f.cash_out).unwrap().required);
        assert_eq!(refi.missing_required, vec!["cash_out".to_string()]);
        assert!((refi.progress - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation_rule_sees_candidate() {
        let f = fixture();
        let engine = NavigationEngine::new(&f.tree);
        let current = state(&f.tree, &[]);
        assert!(engine
            .check_answer("cash_out_amount", &AnswerValue::number(Decimal::new(500, 0)), &current.answers)
            .is_err());
        assert!(engine
            .check_answer("cash_out_amount", &AnswerValue::number(2500), &current.answers)
            .is_ok());
        // questions without validation rules always pass
        assert!(engine
            .check_answer("loan_purpose", &AnswerValue::text("refinance"), &current.answers)
            .is_ok());
        assert!(f.tree.node(&f.amount).is_some());
    }

    #[test]
    fn test_refresh_fills_navigation_state() {
        let f = fixture();
        let engine = NavigationEngine::new(&f.tree);
        let mut s = state(
            &f.tree,
            &[
                ("loan_purpose", AnswerValue::text("refinance")),
                ("cash_out", AnswerValue::Bool(true)),
            ],
        );
        let availability = engine.refresh_navigation(&mut s);
        assert!(availability.is_complete());
        assert!((s.navigation.progress - 1.0).abs() < f64::EPSILON);
        assert!(s.navigation.available.contains(&f.cash_out));
        assert!(s.navigation.blocked.is_empty());
    }
}
