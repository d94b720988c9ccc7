/// Error hierarchy for tree construction, execution and process payload access
///
/// Configuration errors are raised immediately when a tree is built or mutated in a way
/// the node contracts forbid. Errors raised by user callbacks travel through unchanged
/// as `Callback` so they abort the Execute/Resume/Fail call that triggered them.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TreeError {
    // Configuration errors
    #[error("Tree has no root node")]
    NoRoot,

    #[error("Inverter '{0}' already has a child")]
    InverterOccupied(String),

    #[error("Inverter '{0}' has no child to execute")]
    MissingChild(String),

    #[error("Node '{0}' has already started processing and cannot change structure")]
    AlreadyStarted(String),

    #[error("Node '{0}' is read-only")]
    ReadOnly(String),

    #[error("Node '{parent}' already has a child with id '{child}'")]
    DuplicateChild { parent: String, child: String },

    #[error("Node '{0}' is a handler and cannot hold children")]
    NotALayer(String),

    // Session errors
    #[error("Session {0} has already completed")]
    SessionCompleted(Uuid),

    // Process payload errors
    #[error("Process has no value for key '{0}'")]
    MissingValue(String),

    #[error("Process value '{key}' could not be converted: {source}")]
    ValueConversion {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    // Errors raised by condition or handler callbacks
    #[error(transparent)]
    Callback(#[from] anyhow::Error),
}

impl TreeError {
    /// True for errors caused by an invalid tree shape or a forbidden mutation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TreeError::NoRoot
                | TreeError::InverterOccupied(_)
                | TreeError::MissingChild(_)
                | TreeError::AlreadyStarted(_)
                | TreeError::ReadOnly(_)
                | TreeError::DuplicateChild { .. }
                | TreeError::NotALayer(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
