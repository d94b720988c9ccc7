/// Runtime execution layer
///
/// Sessions bind a process to a tree and drive Execute/Resume/Fail/Cancel;
/// the context is the borrowed view handed to every node during a call.

pub mod context;
pub mod session;

pub use context::SessionContext;
pub use session::Session;
