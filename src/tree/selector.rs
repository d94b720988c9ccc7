/// Selector node (OR)
///
/// Tries eligible children in priority/order until one succeeds. A success or a
/// cancellation ends the pass; failures move on to the next child; exhausting every
/// child is FAILURE, and so is having no eligible children at all.
///
/// Unlike Sequence and Parallel, a Selector keeps accepting structural changes after
/// it has started. Children added mid-run are not part of the running pass; removed
/// children are skipped.

use crate::error::Result;
use crate::runtime::SessionContext;
use crate::tree::layer::{Children, Redelivery, StackPolicy, StackRun};
use crate::tree::node::{LayerNode, Node, TreeNode};
use crate::tree::types::{NodeKind, NodeMeta, ResultStatus, Targets};

const POLICY: StackPolicy = StackPolicy::FirstSuccessWins;

pub struct SelectorNode {
    meta: NodeMeta,
    children: Children,
    run: StackRun,
}

impl SelectorNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(id),
            children: Children::default(),
            run: StackRun::default(),
        }
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Result<Self> {
        self.add_child(child.into())?;
        Ok(self)
    }

    pub(crate) fn into_children(self) -> Vec<Node> {
        self.children.into_vec()
    }

    fn redeliver(
        &mut self,
        ctx: &mut SessionContext<'_>,
        targets: &Targets,
        trigger: Redelivery,
    ) -> Result<ResultStatus> {
        let current = self.status();
        if current.is_terminal() {
            return Ok(current);
        }

        let targets = targets.narrowed_for(self.meta.id());
        match self
            .run
            .redeliver(&mut self.children, ctx, POLICY, &targets, trigger)?
        {
            Some(status) => {
                self.run.settle_terminal(status);
                Ok(status)
            }
            None => Ok(self.status()),
        }
    }
}

impl TreeNode for SelectorNode {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Selector
    }

    fn status(&self) -> ResultStatus {
        self.run.aggregate(&self.children, POLICY)
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        let current = self.status();
        if current.is_terminal() {
            return Ok(current);
        }

        self.run.start(&mut self.children, ctx.process())?;
        let status = self.run.drive(&mut self.children, ctx, POLICY)?;
        self.run.settle_terminal(status);
        Ok(status)
    }

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        self.redeliver(ctx, targets, Redelivery::Resume)
    }

    fn fail(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        self.redeliver(ctx, targets, Redelivery::Fail)
    }

    fn cancel(&mut self, targets: &Targets) -> ResultStatus {
        let current = self.status();
        if current.is_terminal() {
            return current;
        }

        let targets = targets.narrowed_for(self.meta.id());
        self.run.cancel(&mut self.children, &targets);
        let status = self.status();
        self.run.settle_terminal(status);
        status
    }

    fn clone_node(&self) -> Node {
        Node::Selector(SelectorNode {
            meta: self.meta.clone(),
            children: self.children.clone_all(),
            run: StackRun::default(),
        })
    }
}

impl LayerNode for SelectorNode {
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
        if self.run.has_started() {
            tracing::debug!(
                "Selector '{}' accepting child '{}' after start",
                self.meta.id(),
                child.id()
            );
        }
        self.children.push(self.meta.id(), child)
    }

    fn replace_child(&mut self, child: Node) -> Result<Option<Node>> {
        Ok(self.children.replace(child))
    }

    fn remove_child(&mut self, id: &str) -> Result<Option<Node>> {
        Ok(self.children.remove(id))
    }

    fn has_started(&self) -> bool {
        self.run.has_started()
    }
}

impl std::fmt::Debug for SelectorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectorNode")
            .field("id", &self.meta.id())
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

    type Trace = Arc<Mutex<Vec<String>>>;

    fn traced(id: &str, trace: &Trace, outcome: ResultStatus) -> HandlerNode {
        let trace = Arc::clone(trace);
        let name = id.to_string();
        HandlerNode::new(id, move |_| {
            trace.lock().unwrap().push(name.clone());
            Ok(outcome)
        })
    }

    fn run<T>(process: &mut Process, f: impl FnOnce(&mut SessionContext<'_>) -> T) -> T {
        let mut active = Vec::new();
        let mut ctx = SessionContext::new(Uuid::new_v4(), process, &mut active, false);
        f(&mut ctx)
    }

    #[test]
    fn test_first_success_wins() {
        let trace = Trace::default();
        let mut sel = SelectorNode::new("sel")
            .with_child(traced("h1", &trace, ResultStatus::Failure))
            .unwrap()
            .with_child(traced("h2", &trace, ResultStatus::Success))
            .unwrap()
            .with_child(traced("h3", &trace, ResultStatus::Success))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| sel.execute(ctx)).unwrap(), ResultStatus::Success);
        assert_eq!(*trace.lock().unwrap(), vec!["h1", "h2"]);
        assert_eq!(sel.status(), ResultStatus::Success);
    }

    #[test]
    fn test_all_fail() {
        let trace = Trace::default();
        let mut sel = SelectorNode::new("sel")
            .with_child(traced("h1", &trace, ResultStatus::Failure))
            .unwrap()
            .with_child(traced("h2", &trace, ResultStatus::Failure))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| sel.execute(ctx)).unwrap(), ResultStatus::Failure);
        assert_eq!(*trace.lock().unwrap(), vec!["h1", "h2"]);
    }

    #[test]
    fn test_empty_selector_fails() {
        let mut sel = SelectorNode::new("sel");
        let mut process = Process::new("kind");
        assert_eq!(run(&mut process, |ctx| sel.execute(ctx)).unwrap(), ResultStatus::Failure);
        assert_eq!(sel.status(), ResultStatus::Failure);
    }

    #[test]
    fn test_cancelled_child_short_circuits() {
        let trace = Trace::default();
        let mut sel = SelectorNode::new("sel")
            .with_child(traced("h1", &trace, ResultStatus::Cancelled))
            .unwrap()
            .with_child(traced("h2", &trace, ResultStatus::Success))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(
            run(&mut process, |ctx| sel.execute(ctx)).unwrap(),
            ResultStatus::Cancelled
        );
        assert_eq!(*trace.lock().unwrap(), vec!["h1"]);
    }

    #[test]
    fn test_resumed_failure_moves_to_next_child() {
        let trace = Trace::default();
        let mut sel = SelectorNode::new("sel")
            .with_child(HandlerNode::new("remote", |_| Ok(ResultStatus::Waiting)))
            .unwrap()
            .with_child(traced("fallback", &trace, ResultStatus::Success))
            .unwrap();
        let mut process = Process::new("kind");

        assert_eq!(run(&mut process, |ctx| sel.execute(ctx)).unwrap(), ResultStatus::Waiting);
        let status = run(&mut process, |ctx| sel.fail(ctx, &Targets::from("remote"))).unwrap();
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(*trace.lock().unwrap(), vec!["fallback"]);
    }

    #[test]
    fn test_accepts_children_after_start() {
        let mut sel = SelectorNode::new("sel")
            .with_child(HandlerNode::new("remote", |_| Ok(ResultStatus::Waiting)))
            .unwrap();
        let mut process = Process::new("kind");
        run(&mut process, |ctx| sel.execute(ctx)).unwrap();

        sel.add_child(HandlerNode::new("late", |_| Ok(ResultStatus::Success)).into())
            .unwrap();
        assert_eq!(sel.children().len(), 2);
        assert!(sel.remove_child("late").unwrap().is_some());
    }
}
