/// Node contracts and the closed node enum
///
/// Every tree element implements `TreeNode`. Composite elements additionally implement
/// `LayerNode`, which covers child ownership and structural mutation. `Node` is the
/// tagged union the builder, merge and sessions work with; it dispatches to the
/// concrete kind and keeps the session's active-node stack in step with recursion.

use crate::error::{Result, TreeError};
use crate::process::Process;
use crate::runtime::SessionContext;
use crate::tree::{
    condition::Condition,
    handler::HandlerNode,
    inverter::InverterNode,
    parallel::ParallelNode,
    selector::SelectorNode,
    sequence::SequenceNode,
    types::{NodeKind, NodeMeta, Priority, ResultStatus, Targets},
};

/// Capability set shared by every tree element
pub trait TreeNode: Send + Sync {
    fn meta(&self) -> &NodeMeta;

    fn meta_mut(&mut self) -> &mut NodeMeta;

    fn kind(&self) -> NodeKind;

    /// Current status; a pure query that never mutates the node
    fn status(&self) -> ResultStatus;

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus>;

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus>;

    fn fail(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus>;

    fn cancel(&mut self, targets: &Targets) -> ResultStatus;

    /// Fresh copy of the node's plan: same configuration, new runtime state
    fn clone_node(&self) -> Node;
}

/// Child ownership contract for composite nodes
pub trait LayerNode: TreeNode {
    /// Children in insertion order
    fn children(&self) -> Vec<&Node>;

    fn child(&self, id: &str) -> Option<&Node>;

    fn child_mut(&mut self, id: &str) -> Option<&mut Node>;

    fn add_child(&mut self, child: Node) -> Result<()>;

    /// Swap the same-id child for `child`, returning the previous one
    fn replace_child(&mut self, child: Node) -> Result<Option<Node>>;

    fn remove_child(&mut self, id: &str) -> Result<Option<Node>>;

    /// Whether the eligible-children snapshot has been taken
    fn has_started(&self) -> bool;
}

/// A node of an execution tree
pub enum Node {
    Handler(HandlerNode),
    Sequence(SequenceNode),
    Selector(SelectorNode),
    Parallel(ParallelNode),
    Inverter(InverterNode),
}

impl Node {
    fn inner(&self) -> &dyn TreeNode {
        match self {
            Node::Handler(node) => node,
            Node::Sequence(node) => node,
            Node::Selector(node) => node,
            Node::Parallel(node) => node,
            Node::Inverter(node) => node,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TreeNode {
        match self {
            Node::Handler(node) => node,
            Node::Sequence(node) => node,
            Node::Selector(node) => node,
            Node::Parallel(node) => node,
            Node::Inverter(node) => node,
        }
    }

    pub fn as_layer(&self) -> Option<&dyn LayerNode> {
        match self {
            Node::Handler(_) => None,
            Node::Sequence(node) => Some(node),
            Node::Selector(node) => Some(node),
            Node::Parallel(node) => Some(node),
            Node::Inverter(node) => Some(node),
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut dyn LayerNode> {
        match self {
            Node::Handler(_) => None,
            Node::Sequence(node) => Some(node),
            Node::Selector(node) => Some(node),
            Node::Parallel(node) => Some(node),
            Node::Inverter(node) => Some(node),
        }
    }

    pub fn id(&self) -> &str {
        self.meta().id()
    }

    pub fn priority(&self) -> Priority {
        self.meta().priority()
    }

    pub fn order(&self) -> i32 {
        self.meta().order()
    }

    pub fn is_read_only(&self) -> bool {
        self.meta().is_read_only()
    }

    pub fn is_layer(&self) -> bool {
        self.kind().is_layer()
    }

    pub fn is_eligible(&self, process: &Process) -> Result<bool> {
        self.meta().is_eligible(process)
    }

    pub fn set_priority(&mut self, priority: Priority) -> Result<()> {
        self.meta_mut().set_priority(priority)
    }

    pub fn set_order(&mut self, order: i32) -> Result<()> {
        self.meta_mut().set_order(order)
    }

    pub fn add_condition(&mut self, condition: Condition) -> Result<()> {
        self.meta_mut().add_condition(condition)
    }

    pub fn mark_read_only(&mut self) {
        self.meta_mut().mark_read_only();
    }

    /// Record that the parent has already evaluated this node's conditions
    pub(crate) fn mark_condition_checked(&mut self) {
        if let Node::Handler(node) = self {
            node.mark_condition_checked();
        }
    }

    /// Children in insertion order; empty for handlers
    pub fn children(&self) -> Vec<&Node> {
        self.as_layer().map(|layer| layer.children()).unwrap_or_default()
    }

    pub fn child(&self, id: &str) -> Option<&Node> {
        self.as_layer().and_then(|layer| layer.child(id))
    }

    pub fn child_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.as_layer_mut().and_then(|layer| layer.child_mut(id))
    }

    pub fn add_child(&mut self, child: Node) -> Result<()> {
        let id = self.id().to_string();
        self.as_layer_mut()
            .ok_or(TreeError::NotALayer(id))?
            .add_child(child)
    }

    pub fn replace_child(&mut self, child: Node) -> Result<Option<Node>> {
        let id = self.id().to_string();
        self.as_layer_mut()
            .ok_or(TreeError::NotALayer(id))?
            .replace_child(child)
    }

    pub fn remove_child(&mut self, child_id: &str) -> Result<Option<Node>> {
        let id = self.id().to_string();
        self.as_layer_mut()
            .ok_or(TreeError::NotALayer(id))?
            .remove_child(child_id)
    }

    pub fn has_started(&self) -> bool {
        self.as_layer().map(|layer| layer.has_started()).unwrap_or(false)
    }

    /// Depth-first search for a layer descendant (excluding self) with the given id and kind
    pub fn find_layer_mut(&mut self, id: &str, kind: NodeKind) -> Option<&mut Node> {
        let child_ids: Vec<String> = self.children().iter().map(|c| c.id().to_string()).collect();
        for child_id in child_ids {
            let matched = self
                .child(&child_id)
                .map(|child| child.id() == id && child.kind() == kind)
                .unwrap_or(false);
            if matched {
                return self.child_mut(&child_id);
            }
            let nested = self
                .child(&child_id)
                .map(|child| child.contains_layer(id, kind))
                .unwrap_or(false);
            if nested {
                return self
                    .child_mut(&child_id)
                    .and_then(|child| child.find_layer_mut(id, kind));
            }
        }
        None
    }

    fn contains_layer(&self, id: &str, kind: NodeKind) -> bool {
        self.children()
            .iter()
            .any(|child| (child.id() == id && child.kind() == kind) || child.contains_layer(id, kind))
    }

    /// Consume a layer and hand back its children; handlers yield nothing
    pub fn into_children(self) -> Vec<Node> {
        match self {
            Node::Handler(_) => Vec::new(),
            Node::Sequence(node) => node.into_children(),
            Node::Selector(node) => node.into_children(),
            Node::Parallel(node) => node.into_children(),
            Node::Inverter(node) => node.into_children(),
        }
    }
}

impl TreeNode for Node {
    fn meta(&self) -> &NodeMeta {
        self.inner().meta()
    }

    fn meta_mut(&mut self) -> &mut NodeMeta {
        self.inner_mut().meta_mut()
    }

    fn kind(&self) -> NodeKind {
        self.inner().kind()
    }

    fn status(&self) -> ResultStatus {
        self.inner().status()
    }

    fn execute(&mut self, ctx: &mut SessionContext<'_>) -> Result<ResultStatus> {
        ctx.enter(self.id());
        tracing::debug!("▶️ Executing node '{}' ({:?})", self.id(), self.kind());

        let result = self.inner_mut().execute(ctx);
        ctx.exit();

        if let Ok(status) = &result {
            tracing::debug!("⏹️ Node '{}' -> {}", self.id(), status);
        }
        result
    }

    fn resume(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        ctx.enter(self.id());
        let result = self.inner_mut().resume(ctx, targets);
        ctx.exit();
        result
    }

    fn fail(&mut self, ctx: &mut SessionContext<'_>, targets: &Targets) -> Result<ResultStatus> {
        ctx.enter(self.id());
        let result = self.inner_mut().fail(ctx, targets);
        ctx.exit();
        result
    }

    fn cancel(&mut self, targets: &Targets) -> ResultStatus {
        self.inner_mut().cancel(targets)
    }

    fn clone_node(&self) -> Node {
        self.inner().clone_node()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("status", &self.status())
            .field("children", &self.children())
            .finish()
    }
}

impl From<HandlerNode> for Node {
    fn from(node: HandlerNode) -> Self {
        Node::Handler(node)
    }
}

impl From<SequenceNode> for Node {
    fn from(node: SequenceNode) -> Self {
        Node::Sequence(node)
    }
}

impl From<SelectorNode> for Node {
    fn from(node: SelectorNode) -> Self {
        Node::Selector(node)
    }
}

impl From<ParallelNode> for Node {
    fn from(node: ParallelNode) -> Self {
        Node::Parallel(node)
    }
}

impl From<InverterNode> for Node {
    fn from(node: InverterNode) -> Self {
        Node::Inverter(node)
    }
}
