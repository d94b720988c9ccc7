/// Process payload type definitions
///
/// A process is the domain action a tree evaluates. The engine treats it as an opaque
/// keyed-data carrier: it reads an identity and a kind, and offers typed get/set access
/// to JSON values for conditions and handlers.

use crate::error::{Result, TreeError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Keyed-data carrier evaluated by an execution tree
///
/// `kind` names the process family (e.g., "order-checkout") and is the key the
/// process manager uses to look up registered trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// Unique process identifier (UUID v4 unless supplied)
    id: String,
    /// Process kind used for tree registration lookups
    kind: String,
    /// Domain data read and written by conditions and handlers
    data: HashMap<String, Value>,
    /// Bookkeeping (created_at, caller-supplied annotations)
    metadata: HashMap<String, Value>,
}

impl Process {
    /// Create a process of the given kind with a generated id
    pub fn new(kind: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind)
    }

    /// Create a process with an explicit id
    pub fn with_id(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "created_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        Self {
            id: id.into(),
            kind: kind.into(),
            data: HashMap::new(),
            metadata,
        }
    }

    /// Builder-style insert, for seeding a process before execution
    pub fn with_value<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Read a typed value, failing if the key is absent or does not convert
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| TreeError::MissingValue(key.to_string()))?;

        serde_json::from_value(value.clone()).map_err(|source| TreeError::ValueConversion {
            key: key.to_string(),
            source,
        })
    }

    /// Read a typed value, returning None when absent or not convertible
    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Store a value under `key`, replacing any previous value
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| TreeError::ValueConversion {
            key: key.clone(),
            source,
        })?;
        self.data.insert(key, value);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Raw JSON view of the process data
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }
}
