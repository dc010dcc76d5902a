//! Operations, parameters and payloads passed through the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Call parameters. Ordered so cache keys are canonical.
pub type Params = BTreeMap<String, Value>;

/// Result returned by a service.
pub type Payload = Value;

/// What an operation does to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Read,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn is_idempotent(&self) -> bool {
        matches!(self, OperationKind::Read)
    }
}

/// A named operation on a service.
///
/// Only idempotent operations consult or populate the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Read)
    }

    pub fn create(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Create)
    }

    pub fn update(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Update)
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Delete)
    }

    pub fn is_cacheable(&self) -> bool {
        self.kind.is_idempotent()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Build params from `(key, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
