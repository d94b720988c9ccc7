/// Process payload module
///
/// Defines the keyed-data carrier that execution trees evaluate.
/// Conditions read it, handlers read and write it.

pub mod types;

pub use types::Process;
