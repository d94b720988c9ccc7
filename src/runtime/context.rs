/// Per-call execution context
///
/// Borrowed view of a session handed down the tree on every Execute/Resume/Fail call.
/// Handlers use it to read and write the process and to see where they sit in the
/// active-node stack.

use crate::process::Process;
use uuid::Uuid;

pub struct SessionContext<'a> {
    session_id: Uuid,
    process: &'a mut Process,
    active: &'a mut Vec<String>,
    cancelled: bool,
}

impl<'a> SessionContext<'a> {
    pub(crate) fn new(
        session_id: Uuid,
        process: &'a mut Process,
        active: &'a mut Vec<String>,
        cancelled: bool,
    ) -> Self {
        Self {
            session_id,
            process,
            active,
            cancelled,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn process(&self) -> &Process {
        &*self.process
    }

    pub fn process_mut(&mut self) -> &mut Process {
        &mut *self.process
    }

    /// Id of the node currently executing (top of the active stack)
    pub fn current_node(&self) -> Option<&str> {
        self.active.last().map(String::as_str)
    }

    /// Ids from the root down to the node currently executing
    pub fn active_path(&self) -> &[String] {
        self.active.as_slice()
    }

    /// Whether the owning session has latched its cancellation flag
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn enter(&mut self, node_id: &str) {
        self.active.push(node_id.to_string());
    }

    pub(crate) fn exit(&mut self) {
        self.active.pop();
    }
}
