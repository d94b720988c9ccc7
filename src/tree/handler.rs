/// Handler node: the leaf that does the work
///
/// A handler wraps a work callback. The callback decides the node's status; returning
/// WAITING suspends the node until Resume (which calls the callback again), Fail or
/// Cancel arrives from outside. Clones of a handler share one execution counter so
/// statistics for the same logical handler aggregate across trees.

use crate::error::Result;
use crate::runtime::SessionContext;
use crate::tree::node::{Node, TreeNode};
use crate::tree::types::{NodeKind, NodeMeta, ResultStatus, Targets};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Work callback invoked by a handler node
pub type HandlerFn =
    Arc<dyn Fn(&mut SessionContext<'_>) -> anyhow::Result<ResultStatus> + Send + Sync>;

pub struct HandlerNode {
    meta: NodeMeta,
    callback: HandlerFn,
    /// Shared with every clone of this handler
    executions: Arc<AtomicUsize>,
    status: ResultStatus,
    condition_checked: bool,
}

impl HandlerNode {
    pub fn new<F>(id: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut SessionContext<'_>) -> anyhow::Result<ResultStatus> + Send + Sync + 'static,
    {
        Self::with_callback(id, Arc::new(callback))
    }

    pub fn with_callback(id: impl Into<String>, callback: HandlerFn) -> Self {
        Self {
            meta: NodeMeta::new(id),
            callback,
            executions: Arc::new(AtomicUsize::new(0)),
            status: ResultStatus::Unknown,
            condition_checked: false,
        }
    }

    /// Swap the work callback; rejected on read-only handlers
    pub fn set_callback(&mut self, callback: HandlerFn) -> Result<()> {
        self.meta.ensure_writable()?;
        self.callback = callback;
        Ok(())
    }

    /// Callback invocations across this handler and all of its clones
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// Whether `other` is a clone of the same logical handler
    pub fn shares_counter_with(&self, other: &HandlerNode) -> bool {
        Arc::ptr_eq(&self.executions, &other.executions)
    }

    pub(crate) fn mark_condition_checked(&mut self) {
        self.condition_checked = true;
    }

    fn invoke(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        let mut status = (self.callback)(ctx)?;
        if status == ResultStatus::Unknown {
            tracing::warn!(
                "⚠️ Handler '{}' returned UNKNOWN; recording FAILURE",
                self.meta.id()
            );
            status = ResultStatus::Failure;
        }

        self.status = status;
        Ok(status)
    }
}

impl TreeNode for HandlerNode {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Handler
    }

    fn status(&self) -> ResultStatus {
        self.status
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        // Parents that filtered this handler have already evaluated its conditions
        if !self.condition_checked {
            let eligible = self.meta.is_eligible(ctx.process())?;
            self.condition_checked = true;
            if !eligible {
                tracing::debug!("⏭️ Handler '{}' condition unmet, skipping", self.meta.id());
                self.status = ResultStatus::Success;
                return Ok(self.status);
            }
        }

        self.invoke(ctx)
    }

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        if self.status != ResultStatus::Waiting || !targets.matches(self.meta.id()) {
            return Ok(self.status);
        }
        tracing::debug!("🔁 Resuming handler '{}'", self.meta.id());
        self.invoke(ctx)
    }

    fn fail(&mut self, _ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        if self.status == ResultStatus::Waiting && targets.matches(self.meta.id()) {
            tracing::debug!("✖️ Failing handler '{}'", self.meta.id());
            self.status = ResultStatus::Failure;
        }
        Ok(self.status)
    }

    fn cancel(&mut self, targets: &Targets) -> ResultStatus {
        if !self.status.is_terminal() && targets.matches(self.meta.id()) {
            self.status = ResultStatus::Cancelled;
        }
        self.status
    }

    fn clone_node(&self) -> Node {
        Node::Handler(HandlerNode {
            meta: self.meta.clone(),
            callback: Arc::clone(&self.callback),
            executions: Arc::clone(&self.executions),
            status: ResultStatus::Unknown,
            condition_checked: false,
        })
    }
}

impl std::fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerNode")
            .field("id", &self.meta.id())
            .field("status", &self.status)
            .field("executions", &self.executions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::tree::condition::Condition;
    use uuid::Uuid;

    fn run<T>(process: &mut Process, f: impl FnOnce(&mut SessionContext<'_>) -> T) -> T {
        let mut active = Vec::new();
        let mut ctx = SessionContext::new(Uuid::new_v4(), process, &mut active, false);
        f(&mut ctx)
    }

    #[test]
    fn test_fresh_handler_is_unknown_and_ignores_resume() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        let mut process = Process::new("kind");

        assert_eq!(node.status(), ResultStatus::Unknown);
        let resumed = run(&mut process, |ctx| node.resume(ctx, &Targets::all())).unwrap();
        let failed = run(&mut process, |ctx| node.fail(ctx, &Targets::all())).unwrap();
        assert_eq!(resumed, ResultStatus::Unknown);
        assert_eq!(failed, ResultStatus::Unknown);
        assert_eq!(node.executions(), 0);
    }

    #[test]
    fn test_execute_is_idempotent_once_terminal() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Success);
        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Success);
        assert_eq!(node.executions(), 1);
    }

    #[test]
    fn test_waiting_then_resume_reinvokes_callback() {
        let mut node = HandlerNode::new("h1", |ctx| {
            let approved = ctx.process().try_get::<bool>("approved").unwrap_or(false);
            Ok(if approved {
                ResultStatus::Success
            } else {
                ResultStatus::Waiting
            })
        });
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Waiting);
        process.set("approved", true).unwrap();
        let status = run(&mut process, |ctx| node.resume(ctx, &Targets::all())).unwrap();
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(node.executions(), 2);
    }

    #[test]
    fn test_resume_ignores_other_targets() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Waiting));
        let mut process = Process::new("kind");
        run(&mut process, |ctx| node.execute(ctx)).unwrap();

        let status = run(&mut process, |ctx| node.resume(ctx, &Targets::from("h2"))).unwrap();
        assert_eq!(status, ResultStatus::Waiting);
        assert_eq!(node.executions(), 1);
    }

    #[test]
    fn test_fail_forces_failure_while_waiting() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Waiting));
        let mut process = Process::new("kind");
        run(&mut process, |ctx| node.execute(ctx)).unwrap();

        let status = run(&mut process, |ctx| node.fail(ctx, &Targets::from("h1"))).unwrap();
        assert_eq!(status, ResultStatus::Failure);
        assert_eq!(node.executions(), 1);
    }

    #[test]
    fn test_cancel_from_unknown_and_terminal_is_sticky() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        assert_eq!(node.cancel(&Targets::all()), ResultStatus::Cancelled);

        let mut process = Process::new("kind");
        assert_eq!(
            run(&mut process, |ctx| node.execute(ctx)).unwrap(),
            ResultStatus::Cancelled
        );
        assert_eq!(node.executions(), 0);
    }

    #[test]
    fn test_unmet_condition_succeeds_without_callback() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Failure));
        node.meta_mut()
            .add_condition(Condition::has_value("enabled"))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Success);
        assert_eq!(node.executions(), 0);
    }

    #[test]
    fn test_callback_error_propagates_after_counting() {
        let mut node = HandlerNode::new("h1", |_| Err(anyhow::anyhow!("downstream unavailable")));
        let mut process = Process::new("kind");

        let err = run(&mut process, |ctx| node.execute(ctx)).unwrap_err();
        assert_eq!(err.to_string(), "downstream unavailable");
        assert_eq!(node.executions(), 1);
        assert_eq!(node.status(), ResultStatus::Unknown);
    }

    #[test]
    fn test_unknown_from_callback_is_recorded_as_failure() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Unknown));
        let mut process = Process::new("kind");
        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Failure);
    }

    #[test]
    fn test_clones_share_counter_but_not_status() {
        let mut original = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        let mut process = Process::new("kind");
        run(&mut process, |ctx| original.execute(ctx)).unwrap();

        let Node::Handler(mut copy) = original.clone_node() else {
            panic!("clone changed kind");
        };
        assert!(copy.shares_counter_with(&original));
        assert_eq!(copy.status(), ResultStatus::Unknown);

        run(&mut process, |ctx| copy.execute(ctx)).unwrap();
        assert_eq!(original.executions(), 2);
        assert_eq!(copy.executions(), 2);

        let other = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        assert!(!other.shares_counter_with(&original));
    }

    #[test]
    fn test_read_only_rejects_callback_swap() {
        let mut node = HandlerNode::new("h1", |_| Ok(ResultStatus::Success));
        node.meta_mut().mark_read_only();
        let replacement: HandlerFn =
            Arc::new(|_: &mut SessionContext<'_>| Ok::<_, anyhow::Error>(ResultStatus::Failure));
        assert!(node.set_callback(replacement).is_err());
    }
}
