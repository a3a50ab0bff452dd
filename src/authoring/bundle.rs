//! Tree bundles
//!
//! A bundle describes questions, conditions and one tree in a single JSON
//! document, with names in place of ids:
//!
//! ```json
//! {
//!   "tree": "mortgage",
//!   "questions": [
//!     {"code": "loan_purpose", "prompt": "Purpose?", "scope": {"kind": "tenant"},
//!      "data_type": "enum", "schema": {"options": ["purchase", "refinance"]}}
//!   ],
//!   "conditions": [
//!     {"name": "is_refi", "type": "SIMPLE",
//!      "left": {"kind": "question", "code": "loan_purpose"}, "op": "EQ",
//!      "right": {"kind": "literal", "value": {"type": "text", "value": "refinance"}}}
//!   ],
//!   "nodes": [
//!     {"key": "purpose", "kind": "QUESTION", "question": "loan_purpose"},
//!     {"key": "cash_out", "kind": "QUESTION", "question": "cash_out",
//!      "rules": [{"condition": "is_refi", "purpose": "VISIBILITY"}]}
//!   ]
//! }
//! ```
//!
//! Installing resolves conditions children-first (ids are content hashes of
//! their children), creates nodes parents-first, then publishes.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{QuestionCatalog, QuestionSpec};
use crate::condition::{ConditionExpr, ConditionStore, NodeRule, Operand, Operator, RulePurpose};
use crate::core::{ConditionId, NodeId, QuestionId, TenantContext};
use crate::tree::{NodeKind, NodeSpec, PublishedTree, TreeStore};

use super::errors::{BundleError, BundleResult};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleQuestion {
    #[serde(flatten)]
    pub spec: QuestionSpec,
    /// Activate right after defining (default: true)
    #[serde(default = "default_true")]
    pub activate: bool,
}

/// Condition expression with children referenced by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleExpr {
    Simple {
        left: Operand,
        op: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<Operand>,
    },
    And { children: Vec<String> },
    Or { children: Vec<String> },
    Not { child: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleCondition {
    pub name: String,
    #[serde(flatten)]
    pub expr: BundleExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRule {
    pub condition: String,
    pub purpose: RulePurpose,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stop_on_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleNode {
    pub key: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub kind: NodeKind,
    /// Question code
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub always_visible: bool,
    #[serde(default)]
    pub rules: Vec<BundleRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeBundle {
    pub tree: String,
    #[serde(default)]
    pub questions: Vec<BundleQuestion>,
    #[serde(default)]
    pub conditions: Vec<BundleCondition>,
    pub nodes: Vec<BundleNode>,
}

/// Result of installing a bundle
#[derive(Debug, Clone)]
pub struct Installed {
    pub tree: Arc<PublishedTree>,
    pub conditions: HashMap<String, ConditionId>,
    pub nodes: HashMap<String, NodeId>,
    pub questions: HashMap<String, QuestionId>,
}

impl Installed {
    pub fn node(&self, key: &str) -> Option<&NodeId> {
        self.nodes.get(key)
    }
}

impl TreeBundle {
    pub fn from_json(content: &str) -> BundleResult<Self> {
        serde_json::from_str(content).map_err(|e| BundleError::Invalid(e.to_string()))
    }

    pub fn load(path: &Path) -> BundleResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BundleError::Invalid(format!("read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Install into the given stores and publish the tree.
    pub fn install(
        &self,
        ctx: &TenantContext,
        catalog: &QuestionCatalog,
        conditions: &ConditionStore,
        trees: &TreeStore,
    ) -> BundleResult<Installed> {
        let questions = self.install_questions(ctx, catalog)?;
        let condition_ids = self.resolve_conditions(conditions)?;

        let tree = trees.create_tree(ctx, self.tree.clone())?;
        let mut nodes: HashMap<String, NodeId> = HashMap::new();
        for node in self.nodes_parent_first()? {
            let mut spec = match node.kind {
                NodeKind::Group => NodeSpec::group(node.label.clone().unwrap_or_default()),
                NodeKind::Info => NodeSpec::info(node.label.clone().unwrap_or_default()),
                NodeKind::Question => {
                    let code = node.question.as_deref().ok_or_else(|| {
                        BundleError::Invalid(format!("question node '{}' names no question", node.key))
                    })?;
                    let question_id = match questions.get(code) {
                        Some(id) => *id,
                        None => catalog
                            .find(code, &ctx.tenant_id)
                            .map(|q| q.id)
                            .ok_or_else(|| BundleError::UnknownQuestion(code.to_string()))?,
                    };
                    NodeSpec::question(question_id, node.label.clone().unwrap_or_else(|| code.to_string()))
                }
            };
            if let Some(parent) = &node.parent {
                // parents-first order guarantees presence
                if let Some(parent_id) = nodes.get(parent) {
                    spec = spec.under(parent_id);
                }
            }
            if node.always_visible {
                spec = spec.always_visible();
            }
            for rule in &node.rules {
                let condition_id = condition_ids.get(&rule.condition).ok_or_else(|| {
                    BundleError::UnknownCondition {
                        name: rule.condition.clone(),
                        referenced_by: node.key.clone(),
                    }
                })?;
                let mut bound = NodeRule::new(condition_id.clone(), rule.purpose).with_priority(rule.priority);
                if rule.stop_on_match {
                    bound = bound.stop_on_match();
                }
                spec = spec.with_rule(bound);
            }
            let added = trees.add_node(ctx, tree.id, spec)?;
            nodes.insert(node.key.clone(), added.id);
        }

        let published = trees.publish(ctx, tree.id, catalog, conditions)?;
        Ok(Installed {
            tree: published,
            conditions: condition_ids,
            nodes,
            questions,
        })
    }

    /// Install into empty stores to check the bundle on its own.
    pub fn check(&self, ctx: &TenantContext) -> BundleResult<Installed> {
        self.install(ctx, &QuestionCatalog::new(), &ConditionStore::new(), &TreeStore::new())
    }

    fn install_questions(
        &self,
        ctx: &TenantContext,
        catalog: &QuestionCatalog,
    ) -> BundleResult<HashMap<String, QuestionId>> {
        let mut ids = HashMap::new();
        for question in &self.questions {
            if ids.contains_key(&question.spec.code) {
                return Err(BundleError::Invalid(format!(
                    "question '{}' defined twice",
                    question.spec.code
                )));
            }
            let defined = catalog.define(ctx, question.spec.clone())?;
            if question.activate {
                catalog.activate(ctx, defined.id)?;
            }
            ids.insert(defined.code, defined.id);
        }
        Ok(ids)
    }

    /// Define every named condition, children before parents.
    fn resolve_conditions(&self, store: &ConditionStore) -> BundleResult<HashMap<String, ConditionId>> {
        let mut by_name: HashMap<&str, &BundleExpr> = HashMap::new();
        for condition in &self.conditions {
            if by_name.insert(&condition.name, &condition.expr).is_some() {
                return Err(BundleError::Invalid(format!(
                    "condition '{}' defined twice",
                    condition.name
                )));
            }
        }

        let mut resolved = HashMap::new();
        let mut visiting = HashSet::new();
        for condition in &self.conditions {
            resolve(&condition.name, "bundle", &by_name, store, &mut resolved, &mut visiting)?;
        }
        Ok(resolved)
    }

    fn nodes_parent_first(&self) -> BundleResult<Vec<&BundleNode>> {
        let mut seen: HashSet<&str> = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.key) {
                return Err(BundleError::Invalid(format!("node '{}' defined twice", node.key)));
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut pending: Vec<&BundleNode> = self.nodes.iter().collect();
        while !pending.is_empty() {
            let (ready, waiting): (Vec<&BundleNode>, Vec<&BundleNode>) = pending
                .into_iter()
                .partition(|n| n.parent.as_deref().map_or(true, |p| placed.contains(p)));
            if ready.is_empty() {
                return Err(BundleError::UnresolvedParents(
                    waiting.iter().map(|n| n.key.clone()).collect(),
                ));
            }
            for node in ready {
                placed.insert(node.key.as_str());
                ordered.push(node);
            }
            pending = waiting;
        }
        Ok(ordered)
    }
}

fn resolve(
    name: &str,
    referenced_by: &str,
    by_name: &HashMap<&str, &BundleExpr>,
    store: &ConditionStore,
    resolved: &mut HashMap<String, ConditionId>,
    visiting: &mut HashSet<String>,
) -> BundleResult<ConditionId> {
    if let Some(id) = resolved.get(name) {
        return Ok(id.clone());
    }
    let expr = by_name.get(name).ok_or_else(|| BundleError::UnknownCondition {
        name: name.to_string(),
        referenced_by: referenced_by.to_string(),
    })?;
    if !visiting.insert(name.to_string()) {
        return Err(BundleError::ConditionCycle(name.to_string()));
    }

    let built = match expr {
        BundleExpr::Simple { left, op, right } => ConditionExpr::Simple {
            left: left.clone(),
            op: *op,
            right: right.clone(),
        },
        BundleExpr::And { children } => ConditionExpr::And {
            children: resolve_all(children, name, by_name, store, resolved, visiting)?,
        },
        BundleExpr::Or { children } => ConditionExpr::Or {
            children: resolve_all(children, name, by_name, store, resolved, visiting)?,
        },
        BundleExpr::Not { child } => ConditionExpr::Not {
            child: resolve(child, name, by_name, store, resolved, visiting)?,
        },
    };

    visiting.remove(name);
    let id = store.define(built)?;
    resolved.insert(name.to_string(), id.clone());
    Ok(id)
}

fn resolve_all(
    names: &[String],
    parent: &str,
    by_name: &HashMap<&str, &BundleExpr>,
    store: &ConditionStore,
    resolved: &mut HashMap<String, ConditionId>,
    visiting: &mut HashSet<String>,
) -> BundleResult<Vec<ConditionId>> {
    names
        .iter()
        .map(|child| resolve(child, parent, by_name, store, resolved, visiting))
        .collect()
}
