/// Fluent tree construction and merge
///
/// Builder calls create a typed node under the current root or, when a sibling with
/// the same id already exists, update that node in place. Id collisions between
/// different kinds are logged and ignored so independently authored sub-trees can be
/// layered on top of each other. Configuration errors (read-only nodes, a second
/// Inverter child, mutating a started layer) are collected and reported by `build()`.
///
/// ```ignore
/// let mut builder = TreeBuilder::new();
/// builder.sequence("checkout", |seq| {
///     seq.handler("reserve", reserve_stock).priority(Priority::High);
///     seq.handler("charge", charge_card);
/// });
/// let root = builder.build()?;
/// ```

use crate::error::{Result, TreeError};
use crate::process::Process;
use crate::runtime::SessionContext;
use crate::tree::{
    condition::Condition,
    handler::{HandlerFn, HandlerNode},
    inverter::InverterNode,
    node::{Node, TreeNode},
    parallel::{ParallelNode, Thresholds},
    selector::SelectorNode,
    sequence::SequenceNode,
    types::{NodeKind, NodeMeta, Priority, ResultStatus},
};
use std::sync::Arc;

#[derive(Default)]
pub struct TreeBuilder {
    root: Option<Node>,
    errors: Vec<TreeError>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building on an existing tree
    pub fn from_root(root: Node) -> Self {
        Self {
            root: Some(root),
            errors: Vec::new(),
        }
    }

    pub fn handler<F>(&mut self, id: impl Into<String>, callback: F) -> NodeHandle<'_>
    where
        F: Fn(&mut SessionContext<'_>) -> anyhow::Result<ResultStatus> + Send + Sync + 'static,
    {
        let id = id.into();
        let callback: HandlerFn = Arc::new(callback);
        let node = upsert_root(&mut self.root, &id, NodeKind::Handler, &mut self.errors, || {
            HandlerNode::with_callback(id.clone(), Arc::clone(&callback)).into()
        });
        finish_handler(node, callback, &mut self.errors)
    }

    pub fn sequence<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert_root(&mut self.root, &id, NodeKind::Sequence, &mut self.errors, || {
            SequenceNode::new(id.clone()).into()
        });
        descend(node, &mut self.errors, build)
    }

    pub fn selector<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert_root(&mut self.root, &id, NodeKind::Selector, &mut self.errors, || {
            SelectorNode::new(id.clone()).into()
        });
        descend(node, &mut self.errors, build)
    }

    pub fn parallel<B>(
        &mut self,
        id: impl Into<String>,
        required_successes: usize,
        required_failures: usize,
        build: B,
    ) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let thresholds = Thresholds::new(required_successes, required_failures);
        let node = upsert_root(&mut self.root, &id, NodeKind::Parallel, &mut self.errors, || {
            ParallelNode::new(id.clone(), required_successes, required_failures).into()
        });
        let node = apply_thresholds(node, thresholds, &mut self.errors);
        descend(node, &mut self.errors, build)
    }

    pub fn inverter<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert_root(&mut self.root, &id, NodeKind::Inverter, &mut self.errors, || {
            InverterNode::new(id.clone()).into()
        });
        descend(node, &mut self.errors, build)
    }

    /// Merge `sub_tree` into the tree under construction
    ///
    /// With no root yet, `sub_tree` becomes the root as-is; callers that need the
    /// original untouched must pass a clone.
    pub fn merge(&mut self, sub_tree: Node) -> &mut Self {
        match self.root.as_mut() {
            None => {
                tracing::debug!("🌱 Adopting '{}' as root", sub_tree.id());
                self.root = Some(sub_tree);
            }
            Some(root) => merge_into(root, sub_tree),
        }
        self
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Configuration errors collected so far
    pub fn errors(&self) -> &[TreeError] {
        &self.errors
    }

    pub fn build(self) -> Result<Node> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }
        self.root.ok_or(TreeError::NoRoot)
    }
}

/// Builder scoped to one layer node; calls add or update that layer's children
pub struct LayerBuilder<'a> {
    layer: &'a mut Node,
    errors: &'a mut Vec<TreeError>,
}

impl<'a> LayerBuilder<'a> {
    pub fn id(&self) -> &str {
        self.layer.id()
    }

    pub fn handler<F>(&mut self, id: impl Into<String>, callback: F) -> NodeHandle<'_>
    where
        F: Fn(&mut SessionContext<'_>) -> anyhow::Result<ResultStatus> + Send + Sync + 'static,
    {
        let id = id.into();
        let callback: HandlerFn = Arc::new(callback);
        let node = upsert(self.layer, &id, NodeKind::Handler, self.errors, || {
            HandlerNode::with_callback(id.clone(), Arc::clone(&callback)).into()
        });
        finish_handler(node, callback, self.errors)
    }

    pub fn sequence<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert(self.layer, &id, NodeKind::Sequence, self.errors, || {
            SequenceNode::new(id.clone()).into()
        });
        descend(node, self.errors, build)
    }

    pub fn selector<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert(self.layer, &id, NodeKind::Selector, self.errors, || {
            SelectorNode::new(id.clone()).into()
        });
        descend(node, self.errors, build)
    }

    pub fn parallel<B>(
        &mut self,
        id: impl Into<String>,
        required_successes: usize,
        required_failures: usize,
        build: B,
    ) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let thresholds = Thresholds::new(required_successes, required_failures);
        let node = upsert(self.layer, &id, NodeKind::Parallel, self.errors, || {
            ParallelNode::new(id.clone(), required_successes, required_failures).into()
        });
        let node = apply_thresholds(node, thresholds, self.errors);
        descend(node, self.errors, build)
    }

    pub fn inverter<B>(&mut self, id: impl Into<String>, build: B) -> NodeHandle<'_>
    where
        B: FnOnce(&mut LayerBuilder<'_>),
    {
        let id = id.into();
        let node = upsert(self.layer, &id, NodeKind::Inverter, self.errors, || {
            InverterNode::new(id.clone()).into()
        });
        descend(node, self.errors, build)
    }

    /// Attach a prebuilt node, merging it when a same-id child already exists
    pub fn attach(&mut self, node: Node) -> &mut Self {
        merge_child(self.layer, node);
        self
    }
}

/// Handle to a node just created or updated by a builder call
///
/// Setters on a read-only node record a configuration error instead of applying.
pub struct NodeHandle<'a> {
    meta: Option<&'a mut NodeMeta>,
    errors: &'a mut Vec<TreeError>,
}

impl<'a> NodeHandle<'a> {
    /// Whether the builder call produced a node (false after a kind conflict)
    pub fn is_attached(&self) -> bool {
        self.meta.is_some()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        if let Some(meta) = self.meta.as_deref_mut() {
            if let Err(error) = meta.set_priority(priority) {
                self.errors.push(error);
            }
        }
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        if let Some(meta) = self.meta.as_deref_mut() {
            if let Err(error) = meta.set_order(order) {
                self.errors.push(error);
            }
        }
        self
    }

    /// AND a condition onto the node
    pub fn condition(mut self, condition: Condition) -> Self {
        if let Some(meta) = self.meta.as_deref_mut() {
            if let Err(error) = meta.add_condition(condition) {
                self.errors.push(error);
            }
        }
        self
    }

    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&Process, &NodeMeta) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::new(predicate))
    }

    /// Freeze the node's own configuration
    pub fn read_only(mut self) -> Self {
        if let Some(meta) = self.meta.as_deref_mut() {
            meta.mark_read_only();
        }
        self
    }
}

/// Create-or-update at the top level of a builder
fn upsert_root<'a>(
    root: &'a mut Option<Node>,
    id: &str,
    kind: NodeKind,
    errors: &mut Vec<TreeError>,
    make: impl FnOnce() -> Node,
) -> Option<&'a mut Node> {
    if root.is_none() {
        return Some(root.insert(make()));
    }
    let node = root.as_mut()?;
    if node.id() == id {
        if node.kind() == kind {
            return Some(node);
        }
        tracing::warn!(
            "⚠️ Root '{}' is a {:?}, ignoring {:?} with the same id",
            id,
            node.kind(),
            kind
        );
        return None;
    }
    upsert(node, id, kind, errors, make)
}

/// Create-or-update a child of `parent`
fn upsert<'a>(
    parent: &'a mut Node,
    id: &str,
    kind: NodeKind,
    errors: &mut Vec<TreeError>,
    make: impl FnOnce() -> Node,
) -> Option<&'a mut Node> {
    let existing_kind = parent.child(id).map(|existing| existing.kind());
    match existing_kind {
        Some(existing) if existing == kind => parent.child_mut(id),
        Some(existing) => {
            tracing::warn!(
                "⚠️ '{}' already has a {:?} child '{}', ignoring {:?}",
                parent.id(),
                existing,
                id,
                kind
            );
            None
        }
        None => {
            if let Err(error) = parent.add_child(make()) {
                errors.push(error);
                return None;
            }
            parent.child_mut(id)
        }
    }
}

fn finish_handler<'a>(
    node: Option<&'a mut Node>,
    callback: HandlerFn,
    errors: &'a mut Vec<TreeError>,
) -> NodeHandle<'a> {
    let meta = match node {
        Some(Node::Handler(handler)) => {
            if let Err(error) = handler.set_callback(callback) {
                errors.push(error);
            }
            Some(handler.meta_mut())
        }
        Some(other) => Some(other.meta_mut()),
        None => None,
    };
    NodeHandle { meta, errors }
}

fn apply_thresholds<'a>(
    mut node: Option<&'a mut Node>,
    thresholds: Thresholds,
    errors: &mut Vec<TreeError>,
) -> Option<&'a mut Node> {
    if let Some(Node::Parallel(parallel)) = node.as_deref_mut() {
        if parallel.thresholds() != thresholds {
            if let Err(error) = parallel.set_thresholds(thresholds) {
                errors.push(error);
            }
        }
    }
    node
}

/// Run a nested build closure against `node`, then hand back its handle
fn descend<'a, B>(
    node: Option<&'a mut Node>,
    errors: &'a mut Vec<TreeError>,
    build: B,
) -> NodeHandle<'a>
where
    B: FnOnce(&mut LayerBuilder<'_>),
{
    let Some(node) = node else {
        return NodeHandle { meta: None, errors };
    };

    {
        let mut layer = LayerBuilder {
            layer: &mut *node,
            errors: &mut *errors,
        };
        build(&mut layer);
    }

    NodeHandle {
        meta: Some(node.meta_mut()),
        errors,
    }
}

/// Merge `sub_tree` into an existing root
fn merge_into(root: &mut Node, sub_tree: Node) {
    if root.id() == sub_tree.id() {
        if root.kind() == sub_tree.kind() {
            merge_same(root, sub_tree);
        } else {
            tracing::warn!(
                "⚠️ Cannot merge {:?} '{}' into {:?} root of the same id",
                sub_tree.kind(),
                sub_tree.id(),
                root.kind()
            );
        }
        return;
    }

    if let Some(target) = root.find_layer_mut(sub_tree.id(), sub_tree.kind()) {
        merge_same(target, sub_tree);
        return;
    }

    if !root.is_layer() {
        tracing::warn!(
            "⚠️ Root '{}' is a handler, cannot attach '{}'",
            root.id(),
            sub_tree.id()
        );
        return;
    }

    merge_child(root, sub_tree);
}

/// Merge two nodes known to share id and kind
fn merge_same(target: &mut Node, source: Node) {
    if !target.is_layer() {
        if target.is_read_only() {
            tracing::warn!("⚠️ Handler '{}' is read-only, keeping it", target.id());
        } else {
            *target = source;
        }
        return;
    }
    for child in source.into_children() {
        merge_child(target, child);
    }
}

/// Merge one incoming child into `parent`
fn merge_child(parent: &mut Node, child: Node) {
    let existing = parent
        .child(child.id())
        .map(|node| (node.kind(), node.is_read_only()));

    match existing {
        None => {
            let child_id = child.id().to_string();
            if let Err(error) = parent.add_child(child) {
                tracing::warn!(
                    "⚠️ Skipping '{}' while merging into '{}': {}",
                    child_id,
                    parent.id(),
                    error
                );
            }
        }
        Some((kind, _)) if kind.is_layer() && child.is_layer() => {
            if kind != child.kind() {
                tracing::debug!(
                    "🔀 Merging {:?} '{}' children into existing {:?}",
                    child.kind(),
                    child.id(),
                    kind
                );
            }
            let child_id = child.id().to_string();
            if let Some(target) = parent.child_mut(&child_id) {
                for grandchild in child.into_children() {
                    merge_child(target, grandchild);
                }
            }
        }
        Some((kind, read_only)) if kind == child.kind() => {
            if read_only {
                tracing::warn!("⚠️ '{}' is read-only, skipping merge", child.id());
                return;
            }
            let child_id = child.id().to_string();
            if let Err(error) = parent.replace_child(child) {
                tracing::warn!(
                    "⚠️ Could not replace '{}' in '{}': {}",
                    child_id,
                    parent.id(),
                    error
                );
            }
        }
        Some((kind, _)) => {
            tracing::warn!(
                "⚠️ Kind conflict for '{}' under '{}': keeping {:?}, skipping {:?}",
                child.id(),
                parent.id(),
                kind,
                child.kind()
            );
        }
    }
}
