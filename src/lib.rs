/// Proctree: hierarchical process-execution engine
///
/// This library evaluates a domain process against a composable tree of execution
/// nodes: work handlers plus Sequence (AND), Selector (OR), Parallel (N-of-M) and
/// Inverter composites. Steps may suspend with WAITING and be resumed, failed or
/// cancelled from outside. A process manager registers trees per process kind and
/// owner and merges them into one executable plan per session.

// Core configuration and logging setup
pub mod config;
pub mod telemetry;

// Error hierarchy shared by every layer
pub mod error;

// Domain payload carried through a session
pub mod process;

// Tree layer - node kinds, conditions, builder and merge
pub mod tree;

// Runtime layer - sessions and the per-call execution context
pub mod runtime;

// Registry of trees per process kind and owner
pub mod manager;

// Re-export commonly used types for external consumers
pub use config::{Config, LoggingConfig, ManagerConfig};
pub use error::{Result, TreeError};
pub use manager::ProcessManager;
pub use process::Process;
pub use runtime::{Session, SessionContext};
pub use tree::{
    Condition, LayerNode, Node, NodeKind, NodeMeta, NodeSnapshot, Priority, ResultStatus,
    Targets, TreeBuilder, TreeGraph, TreeNode,
};
