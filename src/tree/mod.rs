pub mod builder;
pub mod condition;
pub mod graph;
pub mod handler;
pub mod inverter;
pub(crate) mod layer;
pub mod node;
pub mod parallel;
pub mod selector;
pub mod sequence;
pub mod snapshot;
pub mod types;

pub use builder::{LayerBuilder, NodeHandle, TreeBuilder};
pub use condition::{Condition, ConditionChain};
pub use graph::{GraphNode, TreeGraph};
pub use handler::{HandlerFn, HandlerNode};
pub use inverter::InverterNode;
pub use node::{LayerNode, Node, TreeNode};
pub use parallel::{ParallelNode, Thresholds};
pub use selector::SelectorNode;
pub use sequence::SequenceNode;
pub use snapshot::NodeSnapshot;
pub use types::{NodeKind, NodeMeta, Priority, ResultStatus, Targets};
