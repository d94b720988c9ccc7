/// Shared bookkeeping for composite nodes
///
/// `Children` owns a layer's child list and computes the eligible-children ordering:
/// condition filter first, then priority descending, then order ascending, with
/// insertion order breaking remaining ties. `StackRun` is the LIFO driver Sequence
/// and Selector share; they differ only in which child outcome lets a pass continue.

use crate::error::{Result, TreeError};
use crate::process::Process;
use crate::runtime::SessionContext;
use crate::tree::node::{Node, TreeNode};
use crate::tree::types::{ResultStatus, Targets};

/// Child list keyed by sibling-unique id, kept in insertion order
#[derive(Default)]
pub(crate) struct Children {
    nodes: Vec<Node>,
}

impl Children {
    pub(crate) fn refs(&self) -> Vec<&Node> {
        self.nodes.iter().collect()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id() == id)
    }

    pub(crate) fn push(&mut self, parent: &str, child: Node) -> Result<()> {
        if self.get(child.id()).is_some() {
            return Err(TreeError::DuplicateChild {
                parent: parent.to_string(),
                child: child.id().to_string(),
            });
        }
        self.nodes.push(child);
        Ok(())
    }

    /// Replace the same-id child in place, or append when there is none
    pub(crate) fn replace(&mut self, child: Node) -> Option<Node> {
        match self.nodes.iter().position(|node| node.id() == child.id()) {
            Some(index) => Some(std::mem::replace(&mut self.nodes[index], child)),
            None => {
                self.nodes.push(child);
                None
            }
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|node| node.id() == id)?;
        Some(self.nodes.remove(index))
    }

    pub(crate) fn clone_all(&self) -> Children {
        Children {
            nodes: self.nodes.iter().map(|node| node.clone_node()).collect(),
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Node> {
        self.nodes
    }

    /// Ids of the children eligible for `process`, in execution order
    ///
    /// Eligible handlers are marked as already filtered so they do not evaluate
    /// their conditions a second time when executed.
    pub(crate) fn eligible(&mut self, process: &Process) -> Result<Vec<String>> {
        let mut eligible = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.is_eligible(process)? {
                eligible.push(index);
            }
        }
        for &index in &eligible {
            self.nodes[index].mark_condition_checked();
        }

        // Stable sort: equal priority and order keep insertion order
        let nodes = &self.nodes;
        eligible.sort_by(|&a, &b| {
            let (a, b) = (&nodes[a], &nodes[b]);
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.order().cmp(&b.order()))
        });

        Ok(eligible.into_iter().map(|index| nodes[index].id().to_string()).collect())
    }

    /// Statuses of the listed children; ids no longer present are skipped
    pub(crate) fn statuses(&self, ids: &[String]) -> Vec<ResultStatus> {
        ids.iter()
            .filter_map(|id| self.get(id))
            .map(|node| node.status())
            .collect()
    }
}

/// Which child outcome lets a stacked pass move on to the next child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackPolicy {
    /// AND: continue on SUCCESS, stop on FAILURE, vacuously SUCCESS
    AllMustSucceed,
    /// OR: continue on FAILURE, stop on SUCCESS, vacuously FAILURE
    FirstSuccessWins,
}

impl StackPolicy {
    /// Child status that advances the pass; also the result once every child has given it
    pub(crate) fn proceed_on(self) -> ResultStatus {
        match self {
            StackPolicy::AllMustSucceed => ResultStatus::Success,
            StackPolicy::FirstSuccessWins => ResultStatus::Failure,
        }
    }

    /// Child status that short-circuits the pass
    pub(crate) fn decisive(self) -> ResultStatus {
        self.proceed_on().inverted()
    }
}

/// Which external trigger is being re-delivered to the pending child
#[derive(Debug, Clone, Copy)]
pub(crate) enum Redelivery {
    Resume,
    Fail,
}

/// LIFO processing state of a Sequence or Selector
#[derive(Debug, Default)]
pub(crate) struct StackRun {
    /// Eligible children computed on the first execute; doubles as the started gate
    snapshot: Option<Vec<String>>,
    /// Children still to run, top of stack next
    pending: Vec<String>,
    /// Child whose outcome is outstanding (kept while it is WAITING)
    current: Option<String>,
}

impl StackRun {
    pub(crate) fn has_started(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Take the eligible snapshot and fill the stack so that popping yields execution order
    pub(crate) fn start(&mut self, children: &mut Children, process: &Process) -> Result<()> {
        if self.snapshot.is_some() {
            return Ok(());
        }
        let eligible = children.eligible(process)?;
        self.pending = eligible.iter().rev().cloned().collect();
        self.snapshot = Some(eligible);
        Ok(())
    }

    /// Run children until one decides the pass, one suspends, or the stack empties
    pub(crate) fn drive(
        &mut self,
        children: &mut Children,
        ctx: &mut SessionContext<'_>,
        policy: StackPolicy,
    ) -> Result<ResultStatus> {
        loop {
            let id = match self.current.clone() {
                Some(id) => id,
                None => match self.pending.pop() {
                    Some(id) => {
                        self.current = Some(id.clone());
                        id
                    }
                    None => return Ok(policy.proceed_on()),
                },
            };

            let Some(child) = children.get_mut(&id) else {
                // Removed after the snapshot was taken
                self.current = None;
                continue;
            };

            let status = child.execute(ctx)?;
            if let Some(outcome) = self.settle(status, policy) {
                return Ok(outcome);
            }
        }
    }

    /// Deliver Resume/Fail to the pending child, then continue the pass if it advanced
    ///
    /// Returns None when no child is pending (nothing started, or already settled).
    pub(crate) fn redeliver(
        &mut self,
        children: &mut Children,
        ctx: &mut SessionContext<'_>,
        policy: StackPolicy,
        targets: &Targets,
        trigger: Redelivery,
    ) -> Result<Option<ResultStatus>> {
        let Some(id) = self.current.clone() else {
            return Ok(None);
        };
        let Some(child) = children.get_mut(&id) else {
            self.current = None;
            return Ok(None);
        };

        let status = match trigger {
            Redelivery::Resume => child.resume(ctx, targets)?,
            Redelivery::Fail => child.fail(ctx, targets)?,
        };

        match self.settle(status, policy) {
            Some(outcome) => Ok(Some(outcome)),
            None => self.drive(children, ctx, policy).map(Some),
        }
    }

    /// Propagate cancel to every non-terminal eligible child
    pub(crate) fn cancel(&mut self, children: &mut Children, targets: &Targets) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        for id in snapshot {
            if let Some(child) = children.get_mut(id) {
                if !child.status().is_terminal() {
                    child.cancel(targets);
                }
            }
        }
    }

    /// Forget pending work once the layer has reached a terminal status
    pub(crate) fn settle_terminal(&mut self, status: ResultStatus) {
        if status.is_terminal() {
            self.current = None;
            self.pending.clear();
        }
    }

    /// Aggregate status by precedence over the eligible snapshot
    pub(crate) fn aggregate(&self, children: &Children, policy: StackPolicy) -> ResultStatus {
        let Some(snapshot) = &self.snapshot else {
            return ResultStatus::Unknown;
        };
        if snapshot.is_empty() {
            return policy.proceed_on();
        }

        let statuses = children.statuses(snapshot);
        if statuses.contains(&ResultStatus::Cancelled) {
            ResultStatus::Cancelled
        } else if statuses.contains(&ResultStatus::Waiting) {
            ResultStatus::Waiting
        } else if statuses.contains(&policy.decisive()) {
            policy.decisive()
        } else if statuses.iter().all(|status| *status == policy.proceed_on()) {
            policy.proceed_on()
        } else {
            ResultStatus::Unknown
        }
    }

    /// Map one child outcome to the pass result, or None to keep going
    fn settle(&mut self, status: ResultStatus, policy: StackPolicy) -> Option<ResultStatus> {
        if status == policy.proceed_on() {
            self.current = None;
            return None;
        }
        if status == ResultStatus::Waiting {
            return Some(ResultStatus::Waiting);
        }
        self.current = None;
        self.pending.clear();
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{condition::Condition, handler::HandlerNode, types::Priority};

    fn leaf(id: &str, priority: Priority, order: i32) -> Node {
        let mut node: Node = HandlerNode::new(id, |_| Ok(ResultStatus::Success)).into();
        node.set_priority(priority).unwrap();
        node.set_order(order).unwrap();
        node
    }

    #[test]
    fn test_eligible_sorts_priority_then_order_then_insertion() {
        let mut children = Children::default();
        children.push("root", leaf("low", Priority::Low, 0)).unwrap();
        children.push("root", leaf("normal-2", Priority::Normal, 2)).unwrap();
        children.push("root", leaf("normal-1a", Priority::Normal, 1)).unwrap();
        children.push("root", leaf("critical", Priority::Critical, 9)).unwrap();
        children.push("root", leaf("normal-1b", Priority::Normal, 1)).unwrap();

        let order = children.eligible(&Process::new("kind")).unwrap();
        assert_eq!(
            order,
            vec!["critical", "normal-1a", "normal-1b", "normal-2", "low"]
        );
    }

    #[test]
    fn test_eligible_filters_by_condition() {
        let mut children = Children::default();
        let mut gated = leaf("gated", Priority::High, 0);
        gated.add_condition(Condition::has_value("vip")).unwrap();
        children.push("root", gated).unwrap();
        children.push("root", leaf("open", Priority::Normal, 0)).unwrap();

        let plain = Process::new("kind");
        assert_eq!(children.eligible(&plain).unwrap(), vec!["open"]);

        let vip = Process::new("kind").with_value("vip", true).unwrap();
        assert_eq!(children.eligible(&vip).unwrap(), vec!["gated", "open"]);
    }

    #[test]
    fn test_duplicate_child_rejected() {
        let mut children = Children::default();
        children.push("root", leaf("h1", Priority::Normal, 0)).unwrap();
        let err = children.push("root", leaf("h1", Priority::High, 0)).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateChild { .. }));
        assert_eq!(children.refs().len(), 1);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut children = Children::default();
        children.push("root", leaf("a", Priority::Normal, 0)).unwrap();
        children.push("root", leaf("b", Priority::Normal, 0)).unwrap();

        let previous = children.replace(leaf("a", Priority::Critical, 0));
        assert!(previous.is_some());
        let ids: Vec<&str> = children.refs().iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(children.get("a").unwrap().priority(), Priority::Critical);
    }

    #[test]
    fn test_policies() {
        assert_eq!(StackPolicy::AllMustSucceed.proceed_on(), ResultStatus::Success);
        assert_eq!(StackPolicy::AllMustSucceed.decisive(), ResultStatus::Failure);
        assert_eq!(StackPolicy::FirstSuccessWins.proceed_on(), ResultStatus::Failure);
        assert_eq!(StackPolicy::FirstSuccessWins.decisive(), ResultStatus::Success);
    }
}
