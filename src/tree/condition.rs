/// Node eligibility predicates
///
/// A condition decides whether a node takes part in an execution pass. Several
/// conditions on one node form an AND-chain evaluated in insertion order that stops
/// at the first false (or failing) predicate.

use crate::process::Process;
use crate::tree::types::NodeMeta;
use serde_json::Value;
use std::{fmt, sync::Arc};

type Predicate = dyn Fn(&Process, &NodeMeta) -> anyhow::Result<bool> + Send + Sync;

/// Cloneable eligibility predicate over a process and the node being considered
#[derive(Clone)]
pub struct Condition(Arc<Predicate>);

impl Condition {
    /// Wrap an infallible predicate
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Process, &NodeMeta) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |process, node| Ok(predicate(process, node))))
    }

    /// Wrap a predicate whose errors abort the execute call evaluating it
    pub fn try_new<F>(predicate: F) -> Self
    where
        F: Fn(&Process, &NodeMeta) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Eligible when the process carries a value under `key`
    pub fn has_value(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |process, _| process.contains(&key))
    }

    /// Eligible when the value under `key` equals `expected`
    pub fn value_equals(key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        Self::new(move |process, _| process.data().get(&key) == Some(&expected))
    }

    /// Negation of another condition; errors pass through
    pub fn not(inner: Condition) -> Self {
        Self::try_new(move |process, node| Ok(!inner.evaluate(process, node)?))
    }

    pub fn evaluate(&self, process: &Process, node: &NodeMeta) -> anyhow::Result<bool> {
        (self.0)(process, node)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// Ordered AND-chain of conditions; empty means always eligible
#[derive(Clone, Default)]
pub struct ConditionChain(Vec<Condition>);

impl ConditionChain {
    pub fn push(&mut self, condition: Condition) {
        self.0.push(condition);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn evaluate(&self, process: &Process, node: &NodeMeta) -> anyhow::Result<bool> {
        for condition in &self.0 {
            if !condition.evaluate(process, node)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for ConditionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConditionChain({} conditions)", self.0.len())
    }
}
