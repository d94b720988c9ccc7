/// Execution session
///
/// A session binds one process instance to one root node for a single execution
/// attempt. It owns the active-node stack and a cancellation flag that, once
/// latched, never clears. Execute may be called again while the root is WAITING;
/// once the root is terminal or the session was cancelled, Execute is rejected.

use crate::error::{Result, TreeError};
use crate::process::Process;
use crate::runtime::SessionContext;
use crate::tree::{Node, ResultStatus, Targets, TreeNode};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct Session {
    id: Uuid,
    process: Process,
    root: Node,
    cancelled: bool,
    /// Ids of the nodes currently executing, root first
    active_nodes: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(process: Process, root: Node) -> Self {
        Self {
            id: Uuid::new_v4(),
            process,
            root,
            cancelled: false,
            active_nodes: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Run the tree; returns the root's status after the pass
    pub fn execute(&mut self) -> Result<ResultStatus> {
        if self.cancelled || self.is_completed() {
            return Err(TreeError::SessionCompleted(self.id));
        }

        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
            tracing::info!(
                "🚀 Session {} executing '{}' for process {} ({})",
                self.id,
                self.root.id(),
                self.process.id(),
                self.process.kind()
            );
        }

        let status = {
            let mut ctx = SessionContext::new(
                self.id,
                &mut self.process,
                &mut self.active_nodes,
                self.cancelled,
            );
            self.root.execute(&mut ctx)?
        };
        Ok(self.record(status))
    }

    /// Re-deliver to pending nodes; an empty filter addresses all of them
    pub fn resume(&mut self, targets: impl Into<Targets>) -> Result<ResultStatus> {
        let targets = targets.into();
        tracing::info!("🔁 Session {} resume {:?}", self.id, targets.ids());

        let status = {
            let mut ctx = SessionContext::new(
                self.id,
                &mut self.process,
                &mut self.active_nodes,
                self.cancelled,
            );
            self.root.resume(&mut ctx, &targets)?
        };
        Ok(self.record(status))
    }

    /// Force pending nodes to FAILURE; an empty filter addresses all of them
    pub fn fail(&mut self, targets: impl Into<Targets>) -> Result<ResultStatus> {
        let targets = targets.into();
        tracing::info!("✖️ Session {} fail {:?}", self.id, targets.ids());

        let status = {
            let mut ctx = SessionContext::new(
                self.id,
                &mut self.process,
                &mut self.active_nodes,
                self.cancelled,
            );
            self.root.fail(&mut ctx, &targets)?
        };
        Ok(self.record(status))
    }

    /// Cancel the whole tree and latch the session's cancellation flag
    pub fn cancel(&mut self) -> ResultStatus {
        let status = self.root.cancel(&Targets::all());
        if status != ResultStatus::Cancelled {
            tracing::warn!(
                "⚠️ Session {} cancelled but root '{}' reports {}",
                self.id,
                self.root.id(),
                status
            );
        }
        if !self.cancelled {
            tracing::info!("🛑 Session {} cancelled", self.id);
        }
        self.cancelled = true;
        self.completed_at.get_or_insert_with(Utc::now);
        status
    }

    /// Cancel only the targeted pending nodes
    ///
    /// The session flag latches only if the root itself ends up CANCELLED.
    pub fn cancel_nodes(&mut self, targets: impl Into<Targets>) -> ResultStatus {
        let targets = targets.into();
        let status = self.root.cancel(&targets);
        self.record(status)
    }

    pub fn is_completed(&self) -> bool {
        self.root.status().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn status(&self) -> ResultStatus {
        self.root.status()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut Process {
        &mut self.process
    }

    pub fn into_process(self) -> Process {
        self.process
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Node on top of the active stack; only set while a call is in progress
    pub fn active_node(&self) -> Option<&str> {
        self.active_nodes.last().map(String::as_str)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn record(&mut self, status: ResultStatus) -> ResultStatus {
        if status == ResultStatus::Cancelled {
            self.cancelled = true;
        }
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
            tracing::info!("🏁 Session {} completed: {}", self.id, status);
        }
        status
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("process", &self.process.id())
            .field("root", &self.root.id())
            .field("status", &self.status())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
