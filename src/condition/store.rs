//! Content-addressed condition store
//!
//! Defining the same expression twice yields the same id and stores it once.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::core::ConditionId;

use super::errors::{ConditionError, ConditionResult};
use super::types::{Condition, ConditionExpr, ConditionSet};

/// Flat id-keyed store of every condition of a deployment
#[derive(Debug, Default)]
pub struct ConditionStore {
    conditions: RwLock<ConditionSet>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `expr` and return its content id.
    ///
    /// Children need not exist yet; dangling references are reported when a
    /// tree using them is published.
    pub fn define(&self, expr: ConditionExpr) -> ConditionResult<ConditionId> {
        let id = expr.id();
        let mut conditions = self
            .conditions
            .write()
            .map_err(|_| ConditionError::Internal("condition store lock poisoned".into()))?;
        conditions.entry(id.clone()).or_insert(expr);
        Ok(id)
    }

    /// Store a condition under a caller-supplied id.
    ///
    /// Used when restoring exported condition sets; ids are trusted.
    pub fn insert(&self, condition: Condition) -> ConditionResult<()> {
        let mut conditions = self
            .conditions
            .write()
            .map_err(|_| ConditionError::Internal("condition store lock poisoned".into()))?;
        conditions.entry(condition.id).or_insert(condition.expr);
        Ok(())
    }

    pub fn get(&self, id: &ConditionId) -> ConditionResult<ConditionExpr> {
        let conditions = self
            .conditions
            .read()
            .map_err(|_| ConditionError::Internal("condition store lock poisoned".into()))?;
        conditions
            .get(id)
            .cloned()
            .ok_or_else(|| ConditionError::NotFound(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.conditions.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every condition reachable from `roots`.
    ///
    /// Walks the reference graph with a visited set; all dangling ids and
    /// cycles are reported together.
    pub fn closure(&self, roots: &[ConditionId]) -> Result<ConditionSet, Vec<ConditionError>> {
        let conditions = self
            .conditions
            .read()
            .map_err(|_| vec![ConditionError::Internal("condition store lock poisoned".into())])?;

        let mut marks: HashMap<ConditionId, Mark> = HashMap::new();
        let mut set = ConditionSet::new();
        let mut problems = Vec::new();
        let mut reported: HashSet<ConditionId> = HashSet::new();

        for root in roots {
            Self::visit(root, &conditions, &mut marks, &mut set, &mut problems, &mut reported);
        }

        if problems.is_empty() {
            Ok(set)
        } else {
            Err(problems)
        }
    }

    fn visit(
        id: &ConditionId,
        conditions: &ConditionSet,
        marks: &mut HashMap<ConditionId, Mark>,
        set: &mut ConditionSet,
        problems: &mut Vec<ConditionError>,
        reported: &mut HashSet<ConditionId>,
    ) {
        match marks.get(id) {
            Some(Mark::Done) => return,
            Some(Mark::Visiting) => {
                if reported.insert(id.clone()) {
                    problems.push(ConditionError::Cycle(id.clone()));
                }
                return;
            }
            None => {}
        }

        let expr = match conditions.get(id) {
            Some(expr) => expr,
            None => {
                if reported.insert(id.clone()) {
                    problems.push(ConditionError::NotFound(id.clone()));
                }
                return;
            }
        };

        marks.insert(id.clone(), Mark::Visiting);
        for child in expr.children() {
            Self::visit(child, conditions, marks, set, problems, reported);
        }
        marks.insert(id.clone(), Mark::Done);
        set.insert(id.clone(), expr.clone());
    }
}
