/// Core tree type definitions
///
/// Result statuses, scheduling priorities, node kinds, per-node metadata and the
/// target filter used by Resume/Fail/Cancel.

use crate::error::{Result, TreeError};
use crate::process::Process;
use crate::tree::condition::{Condition, ConditionChain};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of executing a node
///
/// UNKNOWN is the only valid initial status. SUCCESS, FAILURE and CANCELLED are
/// terminal and never transition further. WAITING suspends the node until an
/// external Resume, Fail or Cancel call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    #[default]
    Unknown,
    Success,
    Failure,
    Waiting,
    Cancelled,
}

impl ResultStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResultStatus::Success | ResultStatus::Failure | ResultStatus::Cancelled
        )
    }

    /// SUCCESS and FAILURE swap; every other status passes through
    pub fn inverted(self) -> Self {
        match self {
            ResultStatus::Success => ResultStatus::Failure,
            ResultStatus::Failure => ResultStatus::Success,
            other => other,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultStatus::Unknown => "UNKNOWN",
            ResultStatus::Success => "SUCCESS",
            ResultStatus::Failure => "FAILURE",
            ResultStatus::Waiting => "WAITING",
            ResultStatus::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// Scheduling priority among siblings; higher priorities run first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Background = 0,
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// The closed set of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Handler,
    Sequence,
    Selector,
    Parallel,
    Inverter,
}

impl NodeKind {
    /// Layer kinds own children; handlers are leaves
    pub fn is_layer(self) -> bool {
        !matches!(self, NodeKind::Handler)
    }
}

/// Identity and scheduling configuration shared by every node kind
///
/// Once `read_only` is set, priority, order and conditions can no longer change.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    id: String,
    priority: Priority,
    order: i32,
    conditions: ConditionChain,
    read_only: bool,
}

impl NodeMeta {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: Priority::default(),
            order: 0,
            conditions: ConditionChain::default(),
            read_only: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn conditions(&self) -> &ConditionChain {
        &self.conditions
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_priority(&mut self, priority: Priority) -> Result<()> {
        self.ensure_writable()?;
        self.priority = priority;
        Ok(())
    }

    pub fn set_order(&mut self, order: i32) -> Result<()> {
        self.ensure_writable()?;
        self.order = order;
        Ok(())
    }

    /// AND another predicate onto the node's condition chain
    pub fn add_condition(&mut self, condition: Condition) -> Result<()> {
        self.ensure_writable()?;
        self.conditions.push(condition);
        Ok(())
    }

    /// Freeze the node's own configuration; irreversible
    pub fn mark_read_only(&mut self) {
        self.read_only = true;
    }

    /// Evaluate the condition chain against `process`; absent conditions mean eligible
    pub fn is_eligible(&self, process: &Process) -> Result<bool> {
        Ok(self.conditions.evaluate(process, self)?)
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(TreeError::ReadOnly(self.id.clone()));
        }
        Ok(())
    }
}

/// Node-id filter for Resume, Fail and Cancel
///
/// An empty filter addresses every pending node. Ids that match nothing are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets(Vec<String>);

impl Targets {
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn matches(&self, id: &str) -> bool {
        self.is_all() || self.0.iter().any(|target| target == id)
    }

    /// Filter to hand to the children of layer `id`: targeting a layer addresses its whole subtree
    pub(crate) fn narrowed_for(&self, id: &str) -> Targets {
        if !self.is_all() && self.matches(id) {
            Targets::all()
        } else {
            self.clone()
        }
    }
}

impl From<&str> for Targets {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

impl From<String> for Targets {
    fn from(id: String) -> Self {
        Self(vec![id])
    }
}

impl From<Vec<String>> for Targets {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(ids: Vec<&str>) -> Self {
        Self(ids.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Targets {
    fn from(ids: &[&str]) -> Self {
        Self(ids.iter().map(|id| id.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(ids: [&str; N]) -> Self {
        Self(ids.iter().map(|id| id.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!ResultStatus::Unknown.is_terminal());
        assert!(!ResultStatus::Waiting.is_terminal());
        assert!(ResultStatus::Success.is_terminal());
        assert!(ResultStatus::Failure.is_terminal());
        assert!(ResultStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_inversion_only_swaps_success_and_failure() {
        assert_eq!(ResultStatus::Success.inverted(), ResultStatus::Failure);
        assert_eq!(ResultStatus::Failure.inverted(), ResultStatus::Success);
        assert_eq!(ResultStatus::Waiting.inverted(), ResultStatus::Waiting);
        assert_eq!(ResultStatus::Cancelled.inverted(), ResultStatus::Cancelled);
        assert_eq!(ResultStatus::Unknown.inverted(), ResultStatus::Unknown);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert!(Priority::Low > Priority::Background);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_read_only_meta_rejects_changes() {
        let mut meta = NodeMeta::new("h1");
        meta.set_priority(Priority::High).unwrap();
        meta.mark_read_only();

        assert!(matches!(
            meta.set_order(3),
            Err(TreeError::ReadOnly(id)) if id == "h1"
        ));
        assert!(meta.add_condition(Condition::new(|_, _| true)).is_err());
        assert_eq!(meta.priority(), Priority::High);
        assert_eq!(meta.order(), 0);
    }

    #[test]
    fn test_targets_matching_and_narrowing() {
        let all = Targets::all();
        assert!(all.matches("anything"));

        let some = Targets::from(["seq", "h2"]);
        assert!(some.matches("h2"));
        assert!(!some.matches("h1"));
        assert!(some.narrowed_for("seq").is_all());
        assert_eq!(some.narrowed_for("other"), some);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ResultStatus::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
        assert_eq!(ResultStatus::Cancelled.to_string(), "CANCELLED");
    }
}
