/// Process manager: registry of execution trees per process kind
///
/// Trees are keyed by process kind and then by owner, with a global slot shared by
/// every owner. Reads are lock-free through `ArcSwap`; registrations clone the
/// current map, apply one change and swap the pointer, serialized by a writer lock
/// so concurrent registrations never lose each other's updates.
///
/// Reads never hand out registered trees directly. `get_root_node` clones every
/// contributing tree before merging, so sessions run on private copies.

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::process::Process;
use crate::runtime::Session;
use crate::tree::{Node, ParallelNode, TreeBuilder, TreeNode};
use arc_swap::ArcSwap;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Registered trees for one process kind
#[derive(Clone, Default)]
struct KindTrees {
    global: Option<Arc<Node>>,
    owners: HashMap<String, Arc<Node>>,
}

impl KindTrees {
    fn get(&self, owner: Option<&str>) -> Option<&Arc<Node>> {
        match owner {
            None => self.global.as_ref(),
            Some(owner) => self.owners.get(owner),
        }
    }

    fn insert(&mut self, owner: Option<&str>, tree: Arc<Node>) {
        match owner {
            None => self.global = Some(tree),
            Some(owner) => {
                self.owners.insert(owner.to_string(), tree);
            }
        }
    }

    fn remove(&mut self, owner: Option<&str>) -> bool {
        match owner {
            None => self.global.take().is_some(),
            Some(owner) => self.owners.remove(owner).is_some(),
        }
    }

    fn is_empty(&self) -> bool {
        self.global.is_none() && self.owners.is_empty()
    }
}

pub struct ProcessManager {
    /// Key: process kind
    trees: ArcSwap<HashMap<String, KindTrees>>,
    /// Serializes load-clone-store updates
    writer: Mutex<()>,
    config: ManagerConfig,
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl ProcessManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            trees: ArcSwap::new(Arc::new(HashMap::new())),
            writer: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Extend the global tree of `kind`
    ///
    /// `build` receives a builder seeded with the tree registered so far (or a default
    /// Parallel root named after the kind), so repeated registrations accumulate.
    pub fn register<B>(&self, kind: &str, build: B) -> Result<()>
    where
        B: FnOnce(&mut TreeBuilder),
    {
        self.register_tree(kind, None, build)
    }

    /// Extend the tree of `kind` that applies only to `owner`
    pub fn register_owned<B>(&self, kind: &str, owner: &str, build: B) -> Result<()>
    where
        B: FnOnce(&mut TreeBuilder),
    {
        self.register_tree(kind, Some(owner), build)
    }

    fn register_tree<B>(&self, kind: &str, owner: Option<&str>, build: B) -> Result<()>
    where
        B: FnOnce(&mut TreeBuilder),
    {
        let _guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.trees.load();
        let seed = current
            .get(kind)
            .and_then(|trees| trees.get(owner))
            .map(|tree| tree.clone_node())
            .unwrap_or_else(|| self.default_root(kind));

        let mut builder = TreeBuilder::from_root(seed);
        build(&mut builder);
        let root = builder.build().map_err(|error| {
            tracing::error!(
                "❌ Registration for kind '{}' ({}) rejected: {}",
                kind,
                owner_label(owner),
                error
            );
            error
        })?;

        let child_count = root.children().len();
        let mut next = (**current).clone();
        next.entry(kind.to_string())
            .or_default()
            .insert(owner, Arc::new(root));
        self.trees.store(Arc::new(next));

        tracing::info!(
            "📝 Registered tree for kind '{}' ({}), {} top-level children",
            kind,
            owner_label(owner),
            child_count
        );
        Ok(())
    }

    /// Compose the executable tree for `kind`
    ///
    /// Layers, lowest precedence first: a clone of the global tree, a clone of the
    /// owner's tree, then `local_tree` as given. Fails with `NoRoot` when none exist.
    pub fn get_root_node(
        &self,
        kind: &str,
        owner: Option<&str>,
        local_tree: Option<Node>,
    ) -> Result<Node> {
        let registry = self.trees.load();
        let mut builder = TreeBuilder::new();

        if let Some(trees) = registry.get(kind) {
            if let Some(global) = &trees.global {
                builder.merge(global.clone_node());
            }
            if let Some(tree) = owner.and_then(|owner| trees.owners.get(owner)) {
                builder.merge(tree.clone_node());
            }
        }

        if let Some(local) = local_tree {
            builder.merge(local);
        }

        builder.build()
    }

    /// Compose the tree for the process's kind and wrap both in a new session
    pub fn start_session(
        &self,
        process: Process,
        owner: Option<&str>,
        local_tree: Option<Node>,
    ) -> Result<Session> {
        let root = self.get_root_node(process.kind(), owner, local_tree)?;
        let session = Session::new(process, root);
        tracing::debug!(
            "🆕 Session {} created for kind '{}'",
            session.id(),
            session.process().kind()
        );
        Ok(session)
    }

    /// Drop a registered tree; returns whether one existed
    pub fn unregister(&self, kind: &str, owner: Option<&str>) -> bool {
        let _guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = self.trees.load();
        let mut next = (**current).clone();
        let removed = match next.get_mut(kind) {
            Some(trees) => {
                let removed = trees.remove(owner);
                if trees.is_empty() {
                    next.remove(kind);
                }
                removed
            }
            None => false,
        };

        if removed {
            self.trees.store(Arc::new(next));
            tracing::info!("🗑️ Unregistered tree for kind '{}' ({})", kind, owner_label(owner));
        }
        removed
    }

    pub fn is_registered(&self, kind: &str, owner: Option<&str>) -> bool {
        self.trees
            .load()
            .get(kind)
            .map(|trees| trees.get(owner).is_some())
            .unwrap_or(false)
    }

    /// Registered process kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.trees.load().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Owners with a dedicated tree for `kind`, sorted
    pub fn owners(&self, kind: &str) -> Vec<String> {
        let mut owners: Vec<String> = self
            .trees
            .load()
            .get(kind)
            .map(|trees| trees.owners.keys().cloned().collect())
            .unwrap_or_default();
        owners.sort();
        owners
    }

    fn default_root(&self, kind: &str) -> Node {
        ParallelNode::new(
            kind,
            self.config.root_required_successes,
            self.config.root_required_failures,
        )
        .into()
    }
}

fn owner_label(owner: Option<&str>) -> &str {
    owner.unwrap_or("global")
}
