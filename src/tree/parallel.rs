/// Parallel node (N-of-M threshold)
///
/// Each execute sweeps every eligible child once, in priority/order, regardless of
/// individual outcomes, then resolves the aggregate from the configured thresholds.
/// This is a batch evaluation in one pass on the calling thread, not concurrency.
///
/// Resolution order after a sweep:
/// 1. any CANCELLED child cancels the node;
/// 2. `required_successes == 0` succeeds outright;
/// 3. if `required_successes >= required_failures`: success threshold, then WAITING,
///    then failure threshold; otherwise failure threshold, then WAITING, then
///    success threshold;
/// 4. nothing left pending and no threshold met: FAILURE.

use crate::error::{Result, TreeError};
use crate::runtime::SessionContext;
use crate::tree::layer::Children;
use crate::tree::node::{LayerNode, Node, TreeNode};
use crate::tree::types::{NodeKind, NodeMeta, ResultStatus, Targets};
use serde::{Deserialize, Serialize};

/// Success/failure counts that resolve a Parallel node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub required_successes: usize,
    pub required_failures: usize,
}

impl Thresholds {
    pub fn new(required_successes: usize, required_failures: usize) -> Self {
        Self {
            required_successes,
            required_failures,
        }
    }

    /// Aggregate a set of child statuses
    pub fn resolve(&self, statuses: &[ResultStatus]) -> ResultStatus {
        if statuses.contains(&ResultStatus::Cancelled) {
            return ResultStatus::Cancelled;
        }
        if self.required_successes == 0 {
            return ResultStatus::Success;
        }

        let successes = count(statuses, ResultStatus::Success);
        let failures = count(statuses, ResultStatus::Failure);
        let waiting = statuses.contains(&ResultStatus::Waiting);

        let success_met = successes >= self.required_successes;
        let failure_met = failures >= self.required_failures;

        let resolved = if self.required_successes >= self.required_failures {
            first_met(&[
                (success_met, ResultStatus::Success),
                (waiting, ResultStatus::Waiting),
                (failure_met, ResultStatus::Failure),
            ])
        } else {
            first_met(&[
                (failure_met, ResultStatus::Failure),
                (waiting, ResultStatus::Waiting),
                (success_met, ResultStatus::Success),
            ])
        };

        resolved.unwrap_or_else(|| {
            if statuses.iter().all(|status| status.is_terminal()) {
                ResultStatus::Failure
            } else {
                ResultStatus::Unknown
            }
        })
    }
}

fn count(statuses: &[ResultStatus], wanted: ResultStatus) -> usize {
    statuses.iter().filter(|status| **status == wanted).count()
}

fn first_met(checks: &[(bool, ResultStatus)]) -> Option<ResultStatus> {
    checks.iter().find(|(met, _)| *met).map(|(_, status)| *status)
}

pub struct ParallelNode {
    meta: NodeMeta,
    children: Children,
    thresholds: Thresholds,
    /// Eligible children computed on the first execute; doubles as the started gate
    snapshot: Option<Vec<String>>,
}

impl ParallelNode {
    pub fn new(id: impl Into<String>, required_successes: usize, required_failures: usize) -> Self {
        Self {
            meta: NodeMeta::new(id),
            children: Children::default(),
            thresholds: Thresholds::new(required_successes, required_failures),
            snapshot: None,
        }
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Result<Self> {
        self.add_child(child.into())?;
        Ok(self)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Reconfigure thresholds; rejected once read-only or started
    pub fn set_thresholds(&mut self, thresholds: Thresholds) -> Result<()> {
        self.meta.ensure_writable()?;
        self.ensure_mutable()?;
        self.thresholds = thresholds;
        Ok(())
    }

    pub(crate) fn into_children(self) -> Vec<Node> {
        self.children.into_vec()
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(TreeError::AlreadyStarted(self.meta.id().to_string()));
        }
        Ok(())
    }

    /// Snapshot ids whose child is still WAITING or UNKNOWN
    fn pending(&self) -> Vec<String> {
        self.snapshot
            .iter()
            .flatten()
            .filter(|id| {
                self.children
                    .get(id)
                    .map(|child| {
                        matches!(child.status(), ResultStatus::Waiting | ResultStatus::Unknown)
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn deliver(
        &mut self,
        ctx: &mut SessionContext<'_>,
        targets: &Targets,
        resume: bool,
    ) -> Result<ResultStatus> {
        let current = self.status();
        if self.snapshot.is_none() || current.is_terminal() {
            return Ok(current);
        }

        let targets = targets.narrowed_for(self.meta.id());
        for id in self.pending() {
            if let Some(child) = self.children.get_mut(&id) {
                if resume {
                    child.resume(ctx, &targets)?;
                } else {
                    child.fail(ctx, &targets)?;
                }
            }
        }
        Ok(self.status())
    }
}

impl TreeNode for ParallelNode {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Parallel
    }

    fn status(&self) -> ResultStatus {
        match &self.snapshot {
            None => ResultStatus::Unknown,
            Some(snapshot) => self.thresholds.resolve(&self.children.statuses(snapshot)),
        }
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        let current = self.status();
        if current.is_terminal() {
            return Ok(current);
        }

        if self.snapshot.is_none() {
            self.snapshot = Some(self.children.eligible(ctx.process())?);
        }

        let sweep = self.snapshot.clone().unwrap_or_default();
        for id in &sweep {
            if let Some(child) = self.children.get_mut(id) {
                child.execute(ctx)?;
            }
        }

        let status = self.status();
        tracing::debug!(
            "🔀 Parallel '{}' swept {} children -> {}",
            self.meta.id(),
            sweep.len(),
            status
        );
        Ok(status)
    }

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        self.deliver(ctx, targets, true)
    }

    fn fail(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        self.deliver(ctx, targets, false)
    }

    fn cancel(&mut self, targets: &Targets) -> ResultStatus {
        let current = self.status();
        if current.is_terminal() {
            return current;
        }

        let targets = targets.narrowed_for(self.meta.id());
        for id in self.pending() {
            if let Some(child) = self.children.get_mut(&id) {
                child.cancel(&targets);
            }
        }
        self.status()
    }

    fn clone_node(&self) -> Node {
        Node::Parallel(ParallelNode {
            meta: self.meta.clone(),
            children: self.children.clone_all(),
            thresholds: self.thresholds,
            snapshot: None,
        })
    }
}

impl LayerNode for ParallelNode {
    fn children(&self) -> Vec<&Node> {
        self.children.refs()
    }

    fn child(&self, id: &str) -> Option<&Node> {
        self.children.get(id)
    }

    fn child_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.children.get_mut(id)
    }

    fn add_child(&mut self, child: Node) -> Result<()> {
        self.ensure_mutable()?;
        self.children.push(self.meta.id(), child)
    }

    fn replace_child(&mut self, child: Node) -> Result<Option<Node>> {
        self.ensure_mutable()?;
        Ok(self.children.replace(child))
    }

    fn remove_child(&mut self, id: &str) -> Result<Option<Node>> {
        self.ensure_mutable()?;
        Ok(self.children.remove(id))
    }

    fn has_started(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl std::fmt::Debug for ParallelNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelNode")
            .field("id", &self.meta.id())
            .field("thresholds", &self.thresholds)
            .field("status", &self.status())
            .field("children", &self.children.refs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::tree::handler::HandlerNode;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    use crate::tree::types::ResultStatus::{Cancelled, Failure, Success, Unknown, Waiting};

    fn run<T>(process: &mut Process, f: impl FnOnce(&mut SessionContext<'_>) -> T) -> T {
        let mut active = Vec::new();
        let mut ctx = SessionContext::new(Uuid::new_v4(), process, &mut active, false);
        f(&mut ctx)
    }

    fn fixed(id: &str, outcome: ResultStatus) -> HandlerNode {
        HandlerNode::new(id, move |_| Ok(outcome))
    }

    /// Waits until the process carries `<id>.done`
    fn approval(id: &str) -> HandlerNode {
        let key = format!("{id}.done");
        HandlerNode::new(id, move |ctx| {
            Ok(if ctx.process().contains(&key) {
                Success
            } else {
                Waiting
            })
        })
    }

    #[test]
    fn test_success_threshold_checked_first_when_larger() {
        let thresholds = Thresholds::new(2, 1);
        assert_eq!(thresholds.resolve(&[Success, Success, Failure]), Success);
    }

    #[test]
    fn test_failure_threshold_checked_first_when_larger() {
        let thresholds = Thresholds::new(1, 2);
        assert_eq!(thresholds.resolve(&[Success, Failure, Failure]), Failure);
        assert_eq!(thresholds.resolve(&[Success, Failure, Waiting]), Waiting);
        assert_eq!(thresholds.resolve(&[Success, Failure, Success]), Success);
    }

    #[test]
    fn test_waiting_outranks_lower_threshold() {
        let thresholds = Thresholds::new(2, 1);
        assert_eq!(thresholds.resolve(&[Success, Failure, Waiting]), Waiting);
        assert_eq!(thresholds.resolve(&[Success, Failure]), Failure);
    }

    #[test]
    fn test_cancelled_overrides_everything() {
        let thresholds = Thresholds::new(1, 1);
        assert_eq!(thresholds.resolve(&[Success, Cancelled, Success]), Cancelled);
        assert_eq!(Thresholds::new(0, 0).resolve(&[Cancelled]), Cancelled);
    }

    #[test]
    fn test_zero_required_successes_succeeds_immediately() {
        assert_eq!(Thresholds::new(0, 1).resolve(&[Waiting, Unknown]), Success);
        assert_eq!(Thresholds::new(0, 0).resolve(&[]), Success);
    }

    #[test]
    fn test_unreachable_threshold_fails_once_settled() {
        let thresholds = Thresholds::new(3, 2);
        assert_eq!(thresholds.resolve(&[Success, Success, Failure]), Failure);
        assert_eq!(thresholds.resolve(&[Success, Unknown]), Unknown);
    }

    #[test]
    fn test_sweep_runs_every_child_once() {
        let trace: Arc<Mutex<Vec<String>>> = Arc::default();
        let mut node = ParallelNode::new("par", 2, 1);
        for (id, outcome) in [("a", Success), ("b", Cancelled), ("c", Failure)] {
            let trace = Arc::clone(&trace);
            let name = id.to_string();
            node.add_child(
                HandlerNode::new(id, move |_| {
                    trace.lock().unwrap().push(name.clone());
                    Ok(outcome)
                })
                .into(),
            )
            .unwrap();
        }
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), Cancelled);
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_threshold_pass_over_mixed_outcomes() {
        let mut node = ParallelNode::new("par", 2, 1)
            .with_child(fixed("a", Success))
            .unwrap()
            .with_child(fixed("b", Success))
            .unwrap()
            .with_child(fixed("c", Failure))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), Success);
    }

    #[test]
    fn test_resume_targets_individual_children() {
        let mut node = ParallelNode::new("par", 2, 1)
            .with_child(approval("left"))
            .unwrap()
            .with_child(approval("right"))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), Waiting);

        process.set("left.done", true).unwrap();
        process.set("right.done", true).unwrap();
        let first = run(&mut process, |ctx| node.resume(ctx, &Targets::from("left"))).unwrap();
        assert_eq!(first, Waiting);

        let second = run(&mut process, |ctx| node.resume(ctx, &Targets::from("right"))).unwrap();
        assert_eq!(second, Success);

        let again = run(&mut process, |ctx| node.resume(ctx, &Targets::from("right"))).unwrap();
        assert_eq!(again, Success);
    }

    #[test]
    fn test_fail_fans_out_to_all_pending() {
        let mut node = ParallelNode::new("par", 1, 2)
            .with_child(approval("left"))
            .unwrap()
            .with_child(approval("right"))
            .unwrap();
        let mut process = Process::new("kind");

        run(&mut process, |ctx| node.execute(ctx)).unwrap();
        let status = run(&mut process, |ctx| node.fail(ctx, &Targets::all())).unwrap();
        assert_eq!(status, Failure);
    }

    #[test]
    fn test_cancel_only_touches_pending_children() {
        let done = fixed("done", Success);
        let mut node = ParallelNode::new("par", 2, 1)
            .with_child(done)
            .unwrap()
            .with_child(approval("slow"))
            .unwrap();
        let mut process = Process::new("kind");

        run(&mut process, |ctx| node.execute(ctx)).unwrap();
        assert_eq!(node.cancel(&Targets::all()), Cancelled);
        assert_eq!(node.child("done").unwrap().status(), Success);
        assert_eq!(node.child("slow").unwrap().status(), Cancelled);
    }

    #[test]
    fn test_structure_and_thresholds_frozen_after_start() {
        let mut node = ParallelNode::new("par", 1, 1).with_child(fixed("a", Success)).unwrap();
        let mut process = Process::new("kind");
        run(&mut process, |ctx| node.execute(ctx)).unwrap();

        assert!(matches!(
            node.add_child(fixed("b", Success).into()),
            Err(TreeError::AlreadyStarted(_))
        ));
        assert!(node.set_thresholds(Thresholds::new(2, 2)).is_err());
    }
}
