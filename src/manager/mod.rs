/// Process manager layer
///
/// Holds the registered trees per process kind and owner and composes them into
/// executable trees on demand.

pub mod registry;

pub use registry::ProcessManager;
