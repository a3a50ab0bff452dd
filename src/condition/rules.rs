//! Node rules
//!
//! A rule binds a condition to a node for one purpose. Rules of the same
//! purpose form a chain evaluated in descending priority and combined with
//! AND; a passing rule flagged `stop_on_match` ends the chain as passed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::ConditionId;

/// What a rule decides for its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePurpose {
    Visibility,
    Requirement,
    Validation,
    Computation,
}

impl RulePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            RulePurpose::Visibility => "VISIBILITY",
            RulePurpose::Requirement => "REQUIREMENT",
            RulePurpose::Validation => "VALIDATION",
            RulePurpose::Computation => "COMPUTATION",
        }
    }
}

impl fmt::Display for RulePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding of a condition to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRule {
    pub condition_id: ConditionId,
    pub purpose: RulePurpose,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stop_on_match: bool,
}

impl NodeRule {
    pub fn new(condition_id: ConditionId, purpose: RulePurpose) -> Self {
        Self {
            condition_id,
            purpose,
            priority: 0,
            stop_on_match: false,
        }
    }

    pub fn visibility(condition_id: ConditionId) -> Self {
        Self::new(condition_id, RulePurpose::Visibility)
    }

    pub fn requirement(condition_id: ConditionId) -> Self {
        Self::new(condition_id, RulePurpose::Requirement)
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn stop_on_match(mut self) -> Self {
        self.stop_on_match = true;
        self
    }

    /// Stable text used in the owning node's content hash
    pub(crate) fn content_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.purpose.as_str(),
            self.condition_id,
            self.priority,
            self.stop_on_match
        )
    }
}

/// Rules of one purpose in evaluation order
pub fn chain(rules: &[NodeRule], purpose: RulePurpose) -> Vec<&NodeRule> {
    let mut chain: Vec<&NodeRule> = rules.iter().filter(|r| r.purpose == purpose).collect();
    chain.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.condition_id.cmp(&b.condition_id))
    });
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConditionId {
        ConditionId::from_digest(s)
    }

    #[test]
    fn test_chain_orders_by_priority_then_id() {
        let rules = vec![
            NodeRule::visibility(id("b")).with_priority(1),
            NodeRule::visibility(id("c")).with_priority(5),
            NodeRule::requirement(id("z")).with_priority(9),
            NodeRule::visibility(id("a")).with_priority(1),
        ];
        let ordered = chain(&rules, RulePurpose::Visibility);
        let order: Vec<&str> = ordered.iter().map(|r| r.condition_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_content_key_covers_every_field() {
        let base = NodeRule::visibility(id("a"));
        assert_ne!(base.content_key(), base.clone().with_priority(2).content_key());
        assert_ne!(base.content_key(), base.clone().stop_on_match().content_key());
        assert_ne!(base.content_key(), NodeRule::requirement(id("a")).content_key());
    }
}
