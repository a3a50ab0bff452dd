//! Trees and nodes
//!
//! Node identity is the hash of its content, so structurally identical nodes
//! of one tree collapse to one id. The order key is positional and stays out
//! of the hash.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Question;
use crate::condition::{ConditionSet, NodeRule};
use crate::core::{content_hash, NodeId, QuestionId, TenantId, TreeId};

use super::errors::{TreeError, TreeResult};
use super::order::OrderKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// Container for other nodes; never references a question
    Group,
    /// Asks exactly one question
    Question,
    /// Static text; never references a question
    Info,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Group => "GROUP",
            NodeKind::Question => "QUESTION",
            NodeKind::Info => "INFO",
        }
    }
}

/// Input for adding a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub always_visible: bool,
    #[serde(default)]
    pub rules: Vec<NodeRule>,
    /// Explicit position; appended after the last sibling when absent
    #[serde(default)]
    pub order_key: Option<OrderKey>,
}

impl NodeSpec {
    pub fn group(label: impl Into<String>) -> Self {
        Self::new(NodeKind::Group, None, label)
    }

    pub fn question(question_id: QuestionId, label: impl Into<String>) -> Self {
        Self::new(NodeKind::Question, Some(question_id), label)
    }

    pub fn info(label: impl Into<String>) -> Self {
        Self::new(NodeKind::Info, None, label)
    }

    fn new(kind: NodeKind, question_id: Option<QuestionId>, label: impl Into<String>) -> Self {
        Self {
            parent_id: None,
            kind,
            question_id,
            label: label.into(),
            always_visible: false,
            rules: Vec::new(),
            order_key: None,
        }
    }

    pub fn under(mut self, parent: &NodeId) -> Self {
        self.parent_id = Some(parent.clone());
        self
    }

    pub fn with_rule(mut self, rule: NodeRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn always_visible(mut self) -> Self {
        self.always_visible = true;
        self
    }

    pub fn at(mut self, order_key: OrderKey) -> Self {
        self.order_key = Some(order_key);
        self
    }

    /// GROUP and INFO nodes never carry a question; QUESTION nodes always do.
    pub fn check_shape(&self) -> TreeResult<()> {
        match (self.kind, self.question_id) {
            (NodeKind::Question, None) => Err(TreeError::InvalidNodeShape(format!(
                "QUESTION node '{}' must reference a question",
                self.label
            ))),
            (NodeKind::Group | NodeKind::Info, Some(_)) => Err(TreeError::InvalidNodeShape(format!(
                "{} node '{}' cannot reference a question",
                self.kind.as_str(),
                self.label
            ))),
            _ => Ok(()),
        }
    }

    /// Content id of this node within `tree_id`
    pub fn content_id(&self, tree_id: TreeId) -> NodeId {
        let mut rules: Vec<String> = self.rules.iter().map(NodeRule::content_key).collect();
        rules.sort();
        let rules = rules.join("\n");
        let parent = self.parent_id.as_ref().map(NodeId::as_str).unwrap_or("");
        let question = self.question_id.map(|q| q.to_string()).unwrap_or_default();

        NodeId::from_digest(content_hash(&[
            b"node",
            tree_id.as_bytes(),
            parent.as_bytes(),
            self.kind.as_str().as_bytes(),
            question.as_bytes(),
            self.label.as_bytes(),
            &[self.always_visible as u8],
            rules.as_bytes(),
        ]))
    }
}

/// A node of a tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub tree_id: TreeId,
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub question_id: Option<QuestionId>,
    pub label: String,
    pub order_key: OrderKey,
    pub always_visible: bool,
    pub rules: Vec<NodeRule>,
}

impl TreeNode {
    pub(crate) fn from_spec(tree_id: TreeId, spec: NodeSpec, order_key: OrderKey) -> Self {
        let id = spec.content_id(tree_id);
        Self {
            id,
            tree_id,
            parent_id: spec.parent_id,
            kind: spec.kind,
            question_id: spec.question_id,
            label: spec.label,
            order_key,
            always_visible: spec.always_visible,
            rules: spec.rules,
        }
    }

    /// The spec this node was built from, re-parented for copying
    pub(crate) fn to_spec(&self, parent_id: Option<NodeId>) -> NodeSpec {
        NodeSpec {
            parent_id,
            kind: self.kind,
            question_id: self.question_id,
            label: self.label.clone(),
            always_visible: self.always_visible,
            rules: self.rules.clone(),
            order_key: Some(self.order_key.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeStatus {
    Draft,
    Published,
}

/// Tree header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub version: u32,
    /// Id of version 1; shared by every version of this tree
    pub lineage_id: TreeId,
    pub status: TreeStatus,
    /// Hash over node ids in walk order, set on publish
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Immutable snapshot of a published tree.
///
/// Everything navigation needs is captured at publish time: nodes in walk
/// order, the conditions reachable from their rules, and the question
/// versions they reference.
#[derive(Debug, Clone)]
pub struct PublishedTree {
    pub tree: Tree,
    nodes: Vec<TreeNode>,
    index: HashMap<NodeId, usize>,
    pub conditions: ConditionSet,
    pub questions: HashMap<QuestionId, Question>,
}

impl PublishedTree {
    pub(crate) fn new(
        tree: Tree,
        nodes: Vec<TreeNode>,
        conditions: ConditionSet,
        questions: HashMap<QuestionId, Question>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self {
            tree,
            nodes,
            index,
            conditions,
            questions,
        }
    }

    pub fn id(&self) -> TreeId {
        self.tree.id
    }

    /// All nodes, pre-order, siblings by order key
    pub fn walk(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&TreeNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Children of `parent` (roots when `None`) by order key
    pub fn children(&self, parent: Option<&NodeId>) -> Vec<&TreeNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id.as_ref() == parent)
            .collect()
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: &NodeId) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut current = self.node(id).and_then(|n| n.parent_id.as_ref());
        while let Some(parent_id) = current {
            match self.node(parent_id) {
                Some(parent) if out.len() < self.nodes.len() => {
                    out.push(parent);
                    current = parent.parent_id.as_ref();
                }
                _ => break,
            }
        }
        out
    }

    pub fn question_of(&self, node: &TreeNode) -> Option<&Question> {
        node.question_id.and_then(|q| self.questions.get(&q))
    }

    /// The question node asking `code`
    pub fn node_for_code(&self, code: &str) -> Option<&TreeNode> {
        self.nodes
            .iter()
            .find(|n| self.question_of(n).map_or(false, |q| q.code == code))
    }

    /// The question version this tree pinned for `code`
    pub fn question_by_code(&self, code: &str) -> Option<&Question> {
        self.questions.values().find(|q| q.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConditionId;
    use uuid::Uuid;

    #[test]
    fn test_shape_rules() {
        assert!(NodeSpec::group("Borrower").check_shape().is_ok());
        assert!(NodeSpec::question(Uuid::new_v4(), "Income").check_shape().is_ok());

        let mut bad = NodeSpec::group("Borrower");
        bad.question_id = Some(Uuid::new_v4());
        assert_eq!(bad.check_shape().unwrap_err().code(), "SCN_INVALID_NODE_SHAPE");

        let mut bad = NodeSpec::info("Note");
        bad.question_id = Some(Uuid::new_v4());
        assert!(bad.check_shape().is_err());

        let mut bad = NodeSpec::group("Q");
        bad.kind = NodeKind::Question;
        assert!(bad.check_shape().is_err());
    }

    #[test]
    fn test_content_id_ignores_order_key() {
        let tree = Uuid::new_v4();
        let a = NodeSpec::group("Borrower").at(OrderKey::first());
        let b = NodeSpec::group("Borrower").at(OrderKey::first().after());
        assert_eq!(a.content_id(tree), b.content_id(tree));
    }

    #[test]
    fn test_content_id_changes_with_any_field() {
        let tree = Uuid::new_v4();
        let q = Uuid::new_v4();
        let base = NodeSpec::question(q, "Income");
        let id = base.content_id(tree);

        assert_ne!(id, base.content_id(Uuid::new_v4()));
        assert_ne!(id, NodeSpec::question(q, "Income2").content_id(tree));
        assert_ne!(id, NodeSpec::question(Uuid::new_v4(), "Income").content_id(tree));
        assert_ne!(id, base.clone().always_visible().content_id(tree));
        assert_ne!(
            id,
            base.clone()
                .with_rule(NodeRule::visibility(ConditionId::from_digest("c")))
                .content_id(tree)
        );
        let parent = NodeSpec::group("G").content_id(tree);
        assert_ne!(id, base.clone().under(&parent).content_id(tree));
    }

    #[test]
    fn test_rule_order_does_not_change_id() {
        let tree = Uuid::new_v4();
        let a = NodeRule::visibility(ConditionId::from_digest("a"));
        let b = NodeRule::requirement(ConditionId::from_digest("b"));
        let one = NodeSpec::group("G").with_rule(a.clone()).with_rule(b.clone());
        let two = NodeSpec::group("G").with_rule(b).with_rule(a);
        assert_eq!(one.content_id(tree), two.content_id(tree));
    }
}
