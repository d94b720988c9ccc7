/// Serializable view of a tree's structure and state
///
/// Snapshots are plain data, so two trees are structurally equal when their
/// snapshots are equal. Callbacks are not captured; conditions are reported as a count.

use crate::tree::node::{Node, TreeNode};
use crate::tree::parallel::Thresholds;
use crate::tree::types::{NodeKind, Priority, ResultStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub kind: NodeKind,
    pub priority: Priority,
    pub order: i32,
    pub read_only: bool,
    pub conditions: usize,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thresholds: Option<Thresholds>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Find a descendant by slash-separated id path relative to this node
    pub fn find(&self, path: &str) -> Option<&NodeSnapshot> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children.iter().find(|child| child.id == segment)
            })
    }

    /// Number of nodes in this subtree, including self
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(NodeSnapshot::size).sum::<usize>()
    }
}

impl Node {
    pub fn snapshot(&self) -> NodeSnapshot {
        let meta = self.meta();
        NodeSnapshot {
            id: meta.id().to_string(),
            kind: self.kind(),
            priority: meta.priority(),
            order: meta.order(),
            read_only: meta.is_read_only(),
            conditions: meta.conditions().len(),
            status: self.status(),
            thresholds: match self {
                Node::Parallel(node) => Some(node.thresholds()),
                _ => None,
            },
            children: self.children().into_iter().map(Node::snapshot).collect(),
        }
    }
}
