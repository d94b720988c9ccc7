/// Inverter node (NOT)
///
/// Wraps exactly one child and swaps its SUCCESS and FAILURE. WAITING, CANCELLED and
/// UNKNOWN pass through unchanged. Resume, Fail and Cancel are forwarded to the child
/// as-is; only the reported status is remapped.
///
/// The child's conditions are evaluated once, on the first execute. An ineligible
/// child counts as skipped: SUCCESS before inversion, the same as a gated handler.

use crate::error::{Result, TreeError};
use crate::runtime::SessionContext;
use crate::tree::node::{LayerNode, Node, TreeNode};
use crate::tree::types::{NodeKind, NodeMeta, ResultStatus, Targets};

pub struct InverterNode {
    meta: NodeMeta,
    child: Option<Box<Node>>,
    /// Outcome of the child's condition check; None until the first execute
    child_eligible: Option<bool>,
}

impl InverterNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(id),
            child: None,
            child_eligible: None,
        }
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Result<Self> {
        self.add_child(child.into())?;
        Ok(self)
    }

    pub(crate) fn into_children(self) -> Vec<Node> {
        self.child.map(|child| vec![*child]).unwrap_or_default()
    }

    fn child_skipped(&self) -> bool {
        self.child_eligible == Some(false)
    }
}

impl TreeNode for InverterNode {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Inverter
    }

    fn status(&self) -> ResultStatus {
        match &self.child {
            Some(_) if self.child_skipped() => ResultStatus::Success.inverted(),
            Some(child) => child.status().inverted(),
            None => ResultStatus::Failure,
        }
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        let Some(child) = self.child.as_deref_mut() else {
            return Err(TreeError::MissingChild(self.meta.id().to_string()));
        };

        if self.child_eligible.is_none() {
            let eligible = child.is_eligible(ctx.process())?;
            self.child_eligible = Some(eligible);
            if eligible {
                child.mark_condition_checked();
            } else {
                tracing::debug!(
                    "⏭️ Inverter '{}' child '{}' condition unmet, skipping",
                    self.meta.id(),
                    child.id()
                );
            }
        }
        if self.child_eligible == Some(false) {
            return Ok(ResultStatus::Success.inverted());
        }

        let status = child.status();
        if status.is_terminal() {
            return Ok(status.inverted());
        }
        Ok(child.execute(ctx)?.inverted())
    }

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        let targets = targets.narrowed_for(self.meta.id());
        match self.child.as_deref_mut() {
            Some(child) if self.child_eligible != Some(false) => {
                Ok(child.resume(ctx, &targets)?.inverted())
            }
            _ => Ok(self.status()),
        }
    }

    fn fail(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        let targets = targets.narrowed_for(self.meta.id());
        match self.child.as_deref_mut() {
            Some(child) if self.child_eligible != Some(false) => {
                Ok(child.fail(ctx, &targets)?.inverted())
            }
            _ => Ok(self.status()),
        }
    }

    fn cancel(&mut self, targets: &Targets) -> ResultStatus {
        let targets = targets.narrowed_for(self.meta.id());
        match self.child.as_deref_mut() {
            Some(child) if self.child_eligible != Some(false) => child.cancel(&targets).inverted(),
            _ => self.status(),
        }
    }

    fn clone_node(&self) -> Node {
        Node::Inverter(InverterNode {
            meta: self.meta.clone(),
            child: self.child.as_ref().map(|child| Box::new(child.clone_node())),
            child_eligible: None,
        })
    }
}

impl LayerNode for InverterNode {
    fn children(&self) -> Vec<&Node> {
        self.child.as_deref().into_iter().collect()
    }

    fn child(&self, id: &str) -> Option<&Node> {
        self.child.as_deref().filter(|child| child.id() == id)
    }

    fn child_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.child.as_deref_mut().filter(|child| child.id() == id)
    }

    fn add_child(&mut self, child: Node) -> Result<()> {
        self.meta.ensure_writable()?;
        if self.child.is_some() {
            return Err(TreeError::InverterOccupied(self.meta.id().to_string()));
        }
        self.child = Some(Box::new(child));
        Ok(())
    }

    fn replace_child(&mut self, child: Node) -> Result<Option<Node>> {
        self.meta.ensure_writable()?;
        match &self.child {
            Some(existing) if existing.id() != child.id() => {
                Err(TreeError::InverterOccupied(self.meta.id().to_string()))
            }
            _ => Ok(self.child.replace(Box::new(child)).map(|old| *old)),
        }
    }

    fn remove_child(&mut self, id: &str) -> Result<Option<Node>> {
        self.meta.ensure_writable()?;
        if self.child.as_ref().map(|child| child.id() == id).unwrap_or(false) {
            return Ok(self.child.take().map(|old| *old));
        }
        Ok(None)
    }

    fn has_started(&self) -> bool {
        self.child_eligible.is_some()
            || self
                .child
                .as_ref()
                .map(|child| child.status() != ResultStatus::Unknown || child.has_started())
                .unwrap_or(false)
    }
}

impl std::fmt::Debug for InverterNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InverterNode")
            .field("id", &self.meta.id())
            .field("status", &self.status())
            .field("child", &self.child)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use crate::tree::condition::Condition;
    use crate::tree::handler::HandlerNode;
    use crate::tree::sequence::SequenceNode;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use uuid::Uuid;

    fn run<T>(process: &mut Process, f: impl FnOnce(&mut SessionContext<'_>) -> T) -> T {
        let mut active = Vec::new();
        let mut ctx = SessionContext::new(Uuid::new_v4(), process, &mut active, false);
        f(&mut ctx)
    }

    fn inverted(outcome: ResultStatus) -> InverterNode {
        InverterNode::new("not")
            .with_child(HandlerNode::new("h", move |_| Ok(outcome)))
            .unwrap()
    }

    #[test]
    fn test_swaps_success_and_failure() {
        let mut process = Process::new("kind");

        let mut node = inverted(ResultStatus::Success);
        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Failure);
        assert_eq!(node.status(), ResultStatus::Failure);

        let mut node = inverted(ResultStatus::Failure);
        assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), ResultStatus::Success);
    }

    #[test]
    fn test_passes_through_other_statuses() {
        let mut process = Process::new("kind");
        for outcome in [ResultStatus::Waiting, ResultStatus::Cancelled] {
            let mut node = inverted(outcome);
            assert_eq!(run(&mut process, |ctx| node.execute(ctx)).unwrap(), outcome);
        }
        assert_eq!(inverted(ResultStatus::Success).status(), ResultStatus::Unknown);
    }

    #[test]
    fn test_second_child_rejected() {
        let mut node = inverted(ResultStatus::Success);
        let err = node
            .add_child(HandlerNode::new("h2", |_| Ok(ResultStatus::Success)).into())
            .unwrap_err();
        assert!(matches!(err, TreeError::InverterOccupied(id) if id == "not"));
    }

    #[test]
    fn test_read_only_rejects_child() {
        let mut node = InverterNode::new("not");
        node.meta_mut().mark_read_only();
        let err = node
            .add_child(HandlerNode::new("h", |_| Ok(ResultStatus::Success)).into())
            .unwrap_err();
        assert!(matches!(err, TreeError::ReadOnly(_)));
    }

    #[test]
    fn test_missing_child() {
        let mut node = InverterNode::new("not");
        let mut process = Process::new("kind");
        assert_eq!(node.status(), ResultStatus::Failure);
        let err = run(&mut process, |ctx| node.execute(ctx)).unwrap_err();
        assert!(matches!(err, TreeError::MissingChild(_)));
    }

    #[test]
    fn test_fail_is_forwarded_unchanged_then_inverted() {
        let mut node = inverted(ResultStatus::Waiting);
        let mut process = Process::new("kind");
        run(&mut process, |ctx| node.execute(ctx)).unwrap();

        let status = run(&mut process, |ctx| node.fail(ctx, &Targets::all())).unwrap();
        assert_eq!(status, ResultStatus::Success);
        assert_eq!(node.child("h").unwrap().status(), ResultStatus::Failure);
    }

    #[test]
    fn test_gated_child_is_skipped_whatever_its_kind() {
        let mut process = Process::new("kind");

        let mut gated_handler: Node = HandlerNode::new("h", |_| Ok(ResultStatus::Failure)).into();
        gated_handler.add_condition(Condition::has_value("enabled")).unwrap();
        let mut over_handler = InverterNode::new("not").with_child(gated_handler).unwrap();

        let mut gated_layer: Node = SequenceNode::new("seq")
            .with_child(HandlerNode::new("h", |_| Ok(ResultStatus::Failure)))
            .unwrap()
            .into();
        gated_layer.add_condition(Condition::has_value("enabled")).unwrap();
        let mut over_layer = InverterNode::new("not").with_child(gated_layer).unwrap();

        let handler_status = run(&mut process, |ctx| over_handler.execute(ctx)).unwrap();
        let layer_status = run(&mut process, |ctx| over_layer.execute(ctx)).unwrap();
        assert_eq!(handler_status, ResultStatus::Failure);
        assert_eq!(layer_status, ResultStatus::Failure);
        assert_eq!(over_layer.status(), ResultStatus::Failure);
        assert!(over_layer.has_started());
        assert!(!over_layer.child("seq").unwrap().has_started());
    }

    #[test]
    fn test_child_condition_checked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut child: Node = HandlerNode::new("h", |_| Ok(ResultStatus::Waiting)).into();
        child
            .add_condition(Condition::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }))
            .unwrap();
        let mut node = InverterNode::new("not").with_child(child).unwrap();
        let mut process = Process::new("kind");

        run(&mut process, |ctx| node.execute(ctx)).unwrap();
        run(&mut process, |ctx| node.execute(ctx)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let copy = node.clone_node();
        assert!(!copy.has_started());
    }

    #[test]
    fn test_debug_names_node_and_child() {
        let rendered = format!("{:?}", inverted(ResultStatus::Success));
        assert!(rendered.contains("InverterNode"));
        assert!(rendered.contains("\"h\""));
    }
}
