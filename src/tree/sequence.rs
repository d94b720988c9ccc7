/// Sequence node (AND)
///
/// Runs eligible children one after another in priority/order. The first child that
/// fails or is cancelled ends the pass with that status; a WAITING child suspends the
/// pass and is picked up again on the next execute or resume. No eligible children
/// means SUCCESS. The child list is frozen once the first execute has taken its
/// eligible snapshot.

use crate::error::{Result, TreeError};
use crate::runtime::SessionContext;
use crate::tree::layer::{Children, Redelivery, StackPolicy, StackRun};
use crate::tree::node::{LayerNode, Node, TreeNode};
use crate::tree::types::{NodeKind, NodeMeta, ResultStatus, Targets};

const POLICY: StackPolicy = StackPolicy::AllMustSucceed;

pub struct SequenceNode {
    meta: NodeMeta,
    children: Children,
    run: StackRun,
}

impl SequenceNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(id),
            children: Children::default(),
            run: StackRun::default(),
        }
    }

    /// Builder-style child insertion for hand-assembled trees
    pub fn with_child(mut self, child: impl Into<Node>) -> Result<Self> {
        self.add_child(child.into())?;
        Ok(self)
    }

    pub(crate) fn into_children(self) -> Vec<Node> {
        self.children.into_vec()
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.run.has_started() {
            return Err(TreeError::AlreadyStarted(self.meta.id().to_string()));
        }
        Ok(())
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

impl TreeNode for SequenceNode {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        &mut self.meta
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Sequence
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
        Node::Sequence(SequenceNode {
            meta: self.meta.clone(),
            children: self.children.clone_all(),
            run: StackRun::default(),
        })
    }
}

impl LayerNode for SequenceNode {
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
        self.run.has_started()
    }
}

impl std::fmt::Debug for SequenceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceNode")
            .field("id", &self.meta.id())
            .field("status", &self.status())
            .field("children", &self.children.refs())
            .finish()
    }
}
