/// Graph view of an execution tree for diagnostics
///
/// Node ids are only unique among siblings, so graph vertices are keyed by the
/// slash-separated path of ids from the root (`order/checkout/reserve`).

use crate::tree::node::{Node, TreeNode};
use crate::tree::types::{NodeKind, ResultStatus};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use std::collections::HashMap;
use std::fmt;

/// Vertex weight: one tree node at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub path: String,
    pub id: String,
    pub kind: NodeKind,
    pub status: ResultStatus,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}) {}", self.id, self.kind, self.status)
    }
}

pub struct TreeGraph {
    /// Edges point parent -> child; the weight is the child's insertion position
    graph: DiGraph<GraphNode, usize>,
    path_to_index: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl TreeGraph {
    pub fn from_node(root: &Node) -> Self {
        let mut graph = DiGraph::new();
        let mut path_to_index = HashMap::new();
        let root_index = add_subtree(&mut graph, &mut path_to_index, root, None);

        tracing::debug!(
            "🏗️ Built tree graph for '{}' with {} nodes",
            root.id(),
            graph.node_count()
        );

        Self {
            graph,
            path_to_index,
            root: root_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get(&self, path: &str) -> Option<&GraphNode> {
        self.path_to_index
            .get(path)
            .map(|index| &self.graph[*index])
    }

    /// Paths of the direct children of `path`, in insertion order
    pub fn children_of(&self, path: &str) -> Vec<&str> {
        let Some(index) = self.path_to_index.get(path) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges(*index)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect();
        edges.sort_by_key(|(position, _)| *position);
        edges
            .into_iter()
            .map(|(_, target)| self.graph[target].path.as_str())
            .collect()
    }

    /// Pre-order traversal from the root
    pub fn depth_first_paths(&self) -> Vec<&str> {
        let mut paths = Vec::with_capacity(self.graph.node_count());
        let mut dfs = Dfs::new(&self.graph, self.root);
        while let Some(index) = dfs.next(&self.graph) {
            paths.push(self.graph[index].path.as_str());
        }
        paths
    }

    /// Graphviz rendering
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }
}

fn add_subtree(
    graph: &mut DiGraph<GraphNode, usize>,
    path_to_index: &mut HashMap<String, NodeIndex>,
    node: &Node,
    parent: Option<(&str, NodeIndex, usize)>,
) -> NodeIndex {
    let path = match parent {
        Some((parent_path, _, _)) => format!("{}/{}", parent_path, node.id()),
        None => node.id().to_string(),
    };

    let index = graph.add_node(GraphNode {
        path: path.clone(),
        id: node.id().to_string(),
        kind: node.kind(),
        status: node.status(),
    });
    path_to_index.insert(path.clone(), index);

    if let Some((_, parent_index, position)) = parent {
        graph.add_edge(parent_index, index, position);
    }

    for (position, child) in node.children().into_iter().enumerate() {
        add_subtree(graph, path_to_index, child, Some((&path, index, position)));
    }

    index
}
