//! Versioned tree store
//!
//! Draft trees are edited through `add_node`/`insert_between`; `publish`
//! validates the whole tree and freezes it into a `PublishedTree` snapshot.
//! A published tree is never edited again: structural change means a new
//! version, and scenarios keep the version they started on.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::catalog::{Lifecycle, Question, QuestionCatalog};
use crate::condition::ConditionStore;
use crate::core::{content_hash, ConditionId, NodeId, TenantContext, TreeId};
use crate::observability::{LogEvent, Logger};

use super::errors::{TreeError, TreeResult};
use super::node::{NodeKind, NodeSpec, PublishedTree, Tree, TreeNode, TreeStatus};
use super::order::OrderKey;

#[derive(Debug)]
struct TreeEntry {
    tree: Tree,
    nodes: HashMap<NodeId, TreeNode>,
    published: Option<Arc<PublishedTree>>,
}

impl TreeEntry {
    fn siblings(&self, parent: Option<&NodeId>) -> Vec<&TreeNode> {
        let mut siblings: Vec<&TreeNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.as_ref() == parent)
            .collect();
        siblings.sort_by(|a, b| a.order_key.cmp(&b.order_key).then(a.id.cmp(&b.id)));
        siblings
    }

    /// Pre-order walk from the roots, siblings by order key
    fn walk(&self) -> Vec<TreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&TreeNode> = self.siblings(None).into_iter().rev().collect();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(&node.id) {
                continue;
            }
            out.push(node.clone());
            stack.extend(self.siblings(Some(&node.id)).into_iter().rev());
        }
        out
    }
}

/// Store of every tree version
#[derive(Debug, Default)]
pub struct TreeStore {
    trees: RwLock<HashMap<TreeId, TreeEntry>>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create version 1 of a new, empty draft tree.
    pub fn create_tree(&self, ctx: &TenantContext, name: impl Into<String>) -> TreeResult<Tree> {
        let id = Uuid::new_v4();
        let tree = Tree {
            id,
            tenant_id: ctx.tenant_id.clone(),
            name: name.into(),
            version: 1,
            lineage_id: id,
            status: TreeStatus::Draft,
            content_hash: None,
            created_at: Utc::now(),
            published_at: None,
        };
        let mut trees = self.trees.write().map_err(|_| TreeError::poisoned())?;
        trees.insert(
            id,
            TreeEntry {
                tree: tree.clone(),
                nodes: HashMap::new(),
                published: None,
            },
        );
        Ok(tree)
    }

    pub fn get(&self, ctx: &TenantContext, tree_id: TreeId) -> TreeResult<Tree> {
        let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
        Self::entry(&trees, ctx, tree_id).map(|e| e.tree.clone())
    }

    /// Add a node to a draft tree.
    ///
    /// Identical content returns the existing node instead of a duplicate.
    pub fn add_node(&self, ctx: &TenantContext, tree_id: TreeId, spec: NodeSpec) -> TreeResult<TreeNode> {
        spec.check_shape()?;
        let mut trees = self.trees.write().map_err(|_| TreeError::poisoned())?;
        let entry = Self::draft_entry(&mut trees, ctx, tree_id)?;

        let id = spec.content_id(tree_id);
        if let Some(existing) = entry.nodes.get(&id) {
            return Ok(existing.clone());
        }
        if let Some(parent) = &spec.parent_id {
            if !entry.nodes.contains_key(parent) {
                return Err(TreeError::NodeNotFound(parent.clone()));
            }
        }

        let order_key = match &spec.order_key {
            Some(key) => key.clone(),
            None => entry
                .siblings(spec.parent_id.as_ref())
                .last()
                .map_or_else(OrderKey::first, |last| last.order_key.after()),
        };
        let node = TreeNode::from_spec(tree_id, spec, order_key);
        entry.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Add a node positioned strictly between two siblings.
    ///
    /// `left`/`right` are sibling ids under the node's parent; `None` means
    /// the start or end of the sibling list.
    pub fn insert_between(
        &self,
        ctx: &TenantContext,
        tree_id: TreeId,
        mut spec: NodeSpec,
        left: Option<&NodeId>,
        right: Option<&NodeId>,
    ) -> TreeResult<TreeNode> {
        let key = {
            let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
            let entry = Self::entry(&trees, ctx, tree_id)?;
            let sibling_key = |id: Option<&NodeId>| -> TreeResult<Option<OrderKey>> {
                match id {
                    None => Ok(None),
                    Some(id) => entry
                        .nodes
                        .get(id)
                        .filter(|n| n.parent_id == spec.parent_id)
                        .map(|n| Some(n.order_key.clone()))
                        .ok_or_else(|| TreeError::NodeNotFound(id.clone())),
                }
            };
            let low = sibling_key(left)?;
            let high = match (&low, right) {
                (_, Some(_)) => sibling_key(right)?,
                // no right bound: stay below the next sibling after `left`
                (Some(low), None) => entry
                    .siblings(spec.parent_id.as_ref())
                    .into_iter()
                    .map(|n| n.order_key.clone())
                    .find(|k| k > low),
                (None, None) => entry
                    .siblings(spec.parent_id.as_ref())
                    .first()
                    .map(|n| n.order_key.clone()),
            };
            OrderKey::between(low.as_ref(), high.as_ref()).ok_or(TreeError::InvalidOrder)?
        };
        spec.order_key = Some(key);
        self.add_node(ctx, tree_id, spec)
    }

    /// Draft view: children of `parent` by order key
    pub fn children(
        &self,
        ctx: &TenantContext,
        tree_id: TreeId,
        parent: Option<&NodeId>,
    ) -> TreeResult<Vec<TreeNode>> {
        let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
        let entry = Self::entry(&trees, ctx, tree_id)?;
        Ok(entry.siblings(parent).into_iter().cloned().collect())
    }

    /// Deterministic pre-order walk of all nodes
    pub fn walk(&self, ctx: &TenantContext, tree_id: TreeId) -> TreeResult<Vec<TreeNode>> {
        let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
        Ok(Self::entry(&trees, ctx, tree_id)?.walk())
    }

    /// Validate and freeze a draft tree.
    ///
    /// Every problem found is reported in one `PublishValidation` error and
    /// the tree stays a draft.
    pub fn publish(
        &self,
        ctx: &TenantContext,
        tree_id: TreeId,
        catalog: &QuestionCatalog,
        conditions: &ConditionStore,
    ) -> TreeResult<Arc<PublishedTree>> {
        // The catalog is read before the write lock is taken: the catalog in
        // turn consults published trees when archiving.
        let mut lookups: HashMap<Uuid, Option<Question>> = HashMap::new();
        let (mut trees, mut issues, questions) = loop {
            let wanted = self.referenced_questions(ctx, tree_id)?;
            for qid in wanted {
                lookups
                    .entry(qid)
                    .or_insert_with(|| catalog.get(qid).ok());
            }

            let trees = self.trees.write().map_err(|_| TreeError::poisoned())?;
            let entry = Self::entry(&trees, ctx, tree_id)?;
            let complete = entry
                .nodes
                .values()
                .filter_map(|n| n.question_id)
                .all(|qid| lookups.contains_key(&qid));
            if complete {
                let mut issues = Vec::new();
                let mut questions: HashMap<Uuid, Question> = HashMap::new();
                for node in entry.nodes.values() {
                    if let Some(qid) = node.question_id {
                        match lookups.get(&qid).cloned().flatten() {
                            Some(q) if q.owner.as_deref().map_or(true, |o| o == ctx.tenant_id) => {
                                if q.lifecycle == Lifecycle::Archived {
                                    issues.push(format!(
                                        "node '{}' references archived question '{}'",
                                        node.label, q.code
                                    ));
                                } else {
                                    questions.insert(qid, q);
                                }
                            }
                            _ => issues.push(format!(
                                "node '{}' references missing question {}",
                                node.label, qid
                            )),
                        }
                    }
                }
                break (trees, issues, questions);
            }
            // a node was added between the snapshot and the lock
        };
        let entry = Self::draft_entry(&mut trees, ctx, tree_id)?;
        for node in entry.nodes.values() {
            if node.kind == NodeKind::Question && node.question_id.is_none() {
                issues.push(format!("QUESTION node '{}' has no question", node.label));
            }
        }

        // parent links: dangling parents and cycles
        for node in entry.nodes.values() {
            let mut seen: HashSet<&NodeId> = HashSet::new();
            let mut current = node.parent_id.as_ref();
            while let Some(parent_id) = current {
                if !seen.insert(parent_id) {
                    issues.push(format!("node '{}' is part of a parent cycle", node.label));
                    break;
                }
                match entry.nodes.get(parent_id) {
                    Some(parent) => current = parent.parent_id.as_ref(),
                    None => {
                        issues.push(format!("node '{}' has missing parent {}", node.label, parent_id.short()));
                        break;
                    }
                }
            }
        }

        // duplicate sibling order keys
        let mut positions: HashMap<(Option<&NodeId>, &OrderKey), &str> = HashMap::new();
        let mut sorted: Vec<&TreeNode> = entry.nodes.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        for node in sorted {
            if let Some(other) = positions.insert((node.parent_id.as_ref(), &node.order_key), &node.label) {
                issues.push(format!(
                    "nodes '{}' and '{}' share order key {}",
                    other, node.label, node.order_key
                ));
            }
        }

        // rule conditions: existence and acyclicity
        let mut roots: Vec<ConditionId> = entry
            .nodes
            .values()
            .flat_map(|n| n.rules.iter().map(|r| r.condition_id.clone()))
            .collect();
        roots.sort();
        roots.dedup();
        let condition_set = match conditions.closure(&roots) {
            Ok(set) => set,
            Err(problems) => {
                issues.extend(problems.iter().map(|p| p.to_string()));
                Default::default()
            }
        };

        if !issues.is_empty() {
            issues.sort();
            Logger::warn(
                LogEvent::TreePublishRejected,
                &[
                    ("tree_id", tree_id.to_string().as_str()),
                    ("issues", issues.len().to_string().as_str()),
                ],
            );
            return Err(TreeError::PublishValidation { tree_id, issues });
        }

        let nodes = entry.walk();
        let ids: Vec<&[u8]> = nodes.iter().map(|n| n.id.as_str().as_bytes()).collect();
        let hash = content_hash(&ids);

        entry.tree.status = TreeStatus::Published;
        entry.tree.content_hash = Some(hash.clone());
        entry.tree.published_at = Some(Utc::now());

        let published = Arc::new(PublishedTree::new(
            entry.tree.clone(),
            nodes,
            condition_set,
            questions,
        ));
        entry.published = Some(Arc::clone(&published));

        Logger::info(
            LogEvent::TreePublished,
            &[
                ("tree_id", tree_id.to_string().as_str()),
                ("version", entry.tree.version.to_string().as_str()),
                ("content_hash", &hash[..12]),
            ],
        );
        Ok(published)
    }

    /// Question ids referenced by a tree's nodes, read under the read lock
    fn referenced_questions(&self, ctx: &TenantContext, tree_id: TreeId) -> TreeResult<Vec<Uuid>> {
        let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
        let mut ids: Vec<Uuid> = Self::entry(&trees, ctx, tree_id)?
            .nodes
            .values()
            .filter_map(|n| n.question_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// The frozen snapshot of a published tree
    pub fn published(&self, ctx: &TenantContext, tree_id: TreeId) -> TreeResult<Arc<PublishedTree>> {
        let trees = self.trees.read().map_err(|_| TreeError::poisoned())?;
        Self::entry(&trees, ctx, tree_id)?
            .published
            .clone()
            .ok_or(TreeError::NotPublished(tree_id))
    }

    /// Latest published version of the tree named `name`
    pub fn latest_published(&self, ctx: &TenantContext, name: &str) -> Option<Arc<PublishedTree>> {
        let trees = self.trees.read().ok()?;
        trees
            .values()
            .filter(|e| e.tree.tenant_id == ctx.tenant_id && e.tree.name == name)
            .filter_map(|e| e.published.clone())
            .max_by_key(|p| p.tree.version)
    }

    /// Start the next draft version of a tree.
    ///
    /// Nodes and rules are copied; node ids are re-derived for the new tree.
    pub fn new_version(&self, ctx: &TenantContext, tree_id: TreeId) -> TreeResult<Tree> {
        let mut trees = self.trees.write().map_err(|_| TreeError::poisoned())?;
        let source = Self::entry(&trees, ctx, tree_id)?;
        let lineage_id = source.tree.lineage_id;
        let version = trees
            .values()
            .filter(|e| e.tree.lineage_id == lineage_id)
            .map(|e| e.tree.version)
            .max()
            .unwrap_or(1)
            + 1;

        let source = Self::entry(&trees, ctx, tree_id)?;
        let new_id = Uuid::new_v4();
        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut nodes = HashMap::new();
        for node in source.walk() {
            let parent = node.parent_id.as_ref().and_then(|p| remap.get(p).cloned());
            let copy = TreeNode::from_spec(new_id, node.to_spec(parent), node.order_key.clone());
            remap.insert(node.id.clone(), copy.id.clone());
            nodes.insert(copy.id.clone(), copy);
        }

        let tree = Tree {
            id: new_id,
            tenant_id: source.tree.tenant_id.clone(),
            name: source.tree.name.clone(),
            version,
            lineage_id,
            status: TreeStatus::Draft,
            content_hash: None,
            created_at: Utc::now(),
            published_at: None,
        };
        trees.insert(
            new_id,
            TreeEntry {
                tree: tree.clone(),
                nodes,
                published: None,
            },
        );
        Ok(tree)
    }

    fn entry<'a>(
        trees: &'a HashMap<TreeId, TreeEntry>,
        ctx: &TenantContext,
        tree_id: TreeId,
    ) -> TreeResult<&'a TreeEntry> {
        trees
            .get(&tree_id)
            .filter(|e| e.tree.tenant_id == ctx.tenant_id)
            .ok_or(TreeError::TreeNotFound(tree_id))
    }

    fn draft_entry<'a>(
        trees: &'a mut HashMap<TreeId, TreeEntry>,
        ctx: &TenantContext,
        tree_id: TreeId,
    ) -> TreeResult<&'a mut TreeEntry> {
        let entry = trees
            .get_mut(&tree_id)
            .filter(|e| e.tree.tenant_id == ctx.tenant_id)
            .ok_or(TreeError::TreeNotFound(tree_id))?;
        if entry.tree.status == TreeStatus::Published {
            return Err(TreeError::TreeImmutable(tree_id));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, QuestionScope, QuestionSpec, ValidationSchema};
    use crate::condition::{ConditionExpr, NodeRule};
    use crate::core::AnswerValue;

    struct Fixture {
        ctx: TenantContext,
        catalog: QuestionCatalog,
        conditions: ConditionStore,
        trees: TreeStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ctx: TenantContext::new("acme", "author"),
                catalog: QuestionCatalog::new(),
                conditions: ConditionStore::new(),
                trees: TreeStore::new(),
            }
        }

        fn question(&self, code: &str) -> Question {
            let spec = QuestionSpec::new(code, code, QuestionScope::Tenant, DataType::Enum)
                .with_schema(ValidationSchema::with_options(["purchase", "refinance"]));
            let q = self.catalog.define(&self.ctx, spec).unwrap();
            self.catalog.activate(&self.ctx, q.id).unwrap()
        }
    }

    #[test]
    fn test_add_node_dedups_identical_content() {
        let f = Fixture::new();
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        let a = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("Borrower")).unwrap();
        let b = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("Borrower")).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(f.trees.walk(&f.ctx, tree.id).unwrap().len(), 1);
    }

    #[test]
    fn test_append_and_insert_between() {
        let f = Fixture::new();
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        let first = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("A")).unwrap();
        let last = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("C")).unwrap();
        assert!(first.order_key < last.order_key);

        let mid = f
            .trees
            .insert_between(&f.ctx, tree.id, NodeSpec::group("B"), Some(&first.id), Some(&last.id))
            .unwrap();
        let head = f
            .trees
            .insert_between(&f.ctx, tree.id, NodeSpec::group("Start"), None, Some(&first.id))
            .unwrap();

        let labels: Vec<String> = f
            .trees
            .children(&f.ctx, tree.id, None)
            .unwrap()
            .into_iter()
            .map(|n| n.label)
            .collect();
        assert_eq!(labels, vec!["Start", "A", "B", "C"]);
        // neighbours keep their keys
        let after = f.trees.children(&f.ctx, tree.id, None).unwrap();
        assert_eq!(after[1].order_key, first.order_key);
        assert!(head.order_key < first.order_key && mid.order_key < last.order_key);
    }

    #[test]
    fn test_parent_must_be_in_tree() {
        let f = Fixture::new();
        let one = f.trees.create_tree(&f.ctx, "one").unwrap();
        let two = f.trees.create_tree(&f.ctx, "two").unwrap();
        let group = f.trees.add_node(&f.ctx, one.id, NodeSpec::group("G")).unwrap();
        let err = f
            .trees
            .add_node(&f.ctx, two.id, NodeSpec::info("x").under(&group.id))
            .unwrap_err();
        assert_eq!(err.code(), "SCN_NODE_NOT_FOUND");
    }

    #[test]
    fn test_publish_freezes_tree() {
        let f = Fixture::new();
        let q = f.question("loan_purpose");
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        let group = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("Loan")).unwrap();
        f.trees
            .add_node(&f.ctx, tree.id, NodeSpec::question(q.id, "Purpose").under(&group.id))
            .unwrap();

        let published = f.trees.publish(&f.ctx, tree.id, &f.catalog, &f.conditions).unwrap();
        assert_eq!(published.walk().len(), 2);
        assert!(published.tree.content_hash.is_some());
        assert!(published.question_by_code("loan_purpose").is_some());

        let err = f.trees.add_node(&f.ctx, tree.id, NodeSpec::info("late")).unwrap_err();
        assert_eq!(err.code(), "SCN_TREE_IMMUTABLE");
    }

    #[test]
    fn test_publish_collects_every_issue() {
        let f = Fixture::new();
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        f.trees
            .add_node(&f.ctx, tree.id, NodeSpec::group("A").at(OrderKey::first()))
            .unwrap();
        f.trees
            .add_node(&f.ctx, tree.id, NodeSpec::group("B").at(OrderKey::first()))
            .unwrap();
        f.trees
            .add_node(&f.ctx, tree.id, NodeSpec::question(Uuid::new_v4(), "Ghost"))
            .unwrap();
        let dangling = f
            .conditions
            .define(ConditionExpr::Not {
                child: ConditionId::from_digest("nothing"),
            })
            .unwrap();
        f.trees
            .add_node(&f.ctx, tree.id, NodeSpec::info("Note").with_rule(NodeRule::visibility(dangling)))
            .unwrap();

        let err = f.trees.publish(&f.ctx, tree.id, &f.catalog, &f.conditions).unwrap_err();
        match err {
            TreeError::PublishValidation { issues, .. } => assert_eq!(issues.len(), 3, "{:?}", issues),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.trees.get(&f.ctx, tree.id).unwrap().status, TreeStatus::Draft);
    }

    #[test]
    fn test_new_version_copies_structure() {
        let f = Fixture::new();
        let q = f.question("loan_purpose");
        let cond = f
            .conditions
            .define(ConditionExpr::answer_equals("loan_purpose", AnswerValue::text("refinance")))
            .unwrap();
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        let group = f.trees.add_node(&f.ctx, tree.id, NodeSpec::group("Loan")).unwrap();
        f.trees
            .add_node(
                &f.ctx,
                tree.id,
                NodeSpec::question(q.id, "Purpose")
                    .under(&group.id)
                    .with_rule(NodeRule::visibility(cond)),
            )
            .unwrap();
        let v1 = f.trees.publish(&f.ctx, tree.id, &f.catalog, &f.conditions).unwrap();

        let next = f.trees.new_version(&f.ctx, tree.id).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.lineage_id, tree.id);
        assert_eq!(next.status, TreeStatus::Draft);

        let copied = f.trees.walk(&f.ctx, next.id).unwrap();
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[1].parent_id.as_ref(), Some(&copied[0].id));
        assert_ne!(copied[0].id, v1.walk()[0].id);
        // the published version is untouched
        assert_eq!(f.trees.published(&f.ctx, tree.id).unwrap().walk().len(), 2);

        f.trees.publish(&f.ctx, next.id, &f.catalog, &f.conditions).unwrap();
        assert_eq!(f.trees.latest_published(&f.ctx, "loan").unwrap().tree.version, 2);
    }

    #[test]
    fn test_trees_are_tenant_scoped() {
        let f = Fixture::new();
        let tree = f.trees.create_tree(&f.ctx, "loan").unwrap();
        let other = TenantContext::new("globex", "author");
        assert_eq!(f.trees.get(&other, tree.id).unwrap_err().code(), "SCN_TREE_NOT_FOUND");
    }
}
