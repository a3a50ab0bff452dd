//! Navigation state of a scenario
//!
//! `current`, `visited` and `completed` come from events. `available`,
//! `blocked` and `progress` are derived against a published tree by the
//! navigation engine and are empty until refreshed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub current: Option<NodeId>,
    pub visited: BTreeSet<NodeId>,
    pub completed: BTreeSet<NodeId>,
    pub available: BTreeSet<NodeId>,
    pub blocked: BTreeSet<NodeId>,
    /// Answered required-visible / required-visible, in [0, 1]
    pub progress: f64,
}

impl NavigationState {
    pub(crate) fn enter(&mut self, node: &NodeId) {
        self.current = Some(node.clone());
        self.visited.insert(node.clone());
    }

    pub(crate) fn exit(&mut self, node: &NodeId) {
        if self.current.as_ref() == Some(node) {
            self.current = None;
        }
    }

    pub(crate) fn complete(&mut self, node: &NodeId) {
        self.visited.insert(node.clone());
        self.completed.insert(node.clone());
    }

    pub fn is_completed(&self, node: &NodeId) -> bool {
        self.completed.contains(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_only_clears_matching_node() {
        let a = NodeId::from_digest("a");
        let b = NodeId::from_digest("b");
        let mut nav = NavigationState::default();
        nav.enter(&a);
        nav.exit(&b);
        assert_eq!(nav.current.as_ref(), Some(&a));
        nav.exit(&a);
        assert!(nav.current.is_none());
        assert!(nav.visited.contains(&a));
    }
}
