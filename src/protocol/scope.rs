//! Interaction descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Interaction type carried in the scope's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ScopeType {
    Http,
    Websocket,
    /// The startup/shutdown handshake.
    Lifespan,
    /// Any type this crate does not interpret. Forwarded untouched.
    Other(String),
}

impl ScopeType {
    /// Wire name of this scope type.
    pub fn as_str(&self) -> &str {
        match self {
            ScopeType::Http => "http",
            ScopeType::Websocket => "websocket",
            ScopeType::Lifespan => "lifespan",
            ScopeType::Other(kind) => kind,
        }
    }
}

impl From<&str> for ScopeType {
    fn from(kind: &str) -> Self {
        match kind {
            "http" => ScopeType::Http,
            "websocket" => ScopeType::Websocket,
            "lifespan" => ScopeType::Lifespan,
            other => ScopeType::Other(other.to_string()),
        }
    }
}

impl From<String> for ScopeType {
    fn from(kind: String) -> Self {
        ScopeType::from(kind.as_str())
    }
}

impl From<ScopeType> for String {
    fn from(kind: ScopeType) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor for a single interaction.
///
/// Only `type` is interpreted; every other key is carried in `extra` and
/// reaches the application exactly as the host built it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: ScopeType,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scope {
    pub fn new(kind: impl Into<ScopeType>) -> Self {
        let kind = match kind.into() {
            ScopeType::Other(name) => ScopeType::from(name),
            known => known,
        };
        Self {
            kind,
            extra: Map::new(),
        }
    }

    /// Scope for the startup/shutdown handshake.
    pub fn lifespan() -> Self {
        Self::new(ScopeType::Lifespan)
    }

    pub fn http(method: &str, path: &str) -> Self {
        Self::new(ScopeType::Http)
            .with("method", method)
            .with("path", path)
    }

    /// Builder-style insert of an extra key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn is_lifespan(&self) -> bool {
        self.kind.as_str() == ScopeType::Lifespan.as_str()
    }
}
