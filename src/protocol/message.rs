//! Wire messages and the typed lifespan view over them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const STARTUP: &str = "lifespan.startup";
pub const STARTUP_COMPLETE: &str = "lifespan.startup.complete";
pub const STARTUP_FAILED: &str = "lifespan.startup.failed";
pub const SHUTDOWN: &str = "lifespan.shutdown";
pub const SHUTDOWN_COMPLETE: &str = "lifespan.shutdown.complete";
pub const SHUTDOWN_FAILED: &str = "lifespan.shutdown.failed";

/// A single protocol message: a `type` plus arbitrary fields.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style insert of a field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field accessor; `None` when absent or not a string.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Handshake messages exchanged on a `lifespan` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifespanEvent {
    Startup,
    StartupComplete,
    StartupFailed { message: String },
    Shutdown,
    ShutdownComplete,
    ShutdownFailed { message: String },
}

impl LifespanEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LifespanEvent::Startup => STARTUP,
            LifespanEvent::StartupComplete => STARTUP_COMPLETE,
            LifespanEvent::StartupFailed { .. } => STARTUP_FAILED,
            LifespanEvent::Shutdown => SHUTDOWN,
            LifespanEvent::ShutdownComplete => SHUTDOWN_COMPLETE,
            LifespanEvent::ShutdownFailed { .. } => SHUTDOWN_FAILED,
        }
    }

    /// Typed view of `message`, or `None` for non-lifespan traffic.
    ///
    /// A failure message without a `message` field parses with an empty reason.
    pub fn parse(message: &Message) -> Option<Self> {
        let reason = || message.text("message").unwrap_or_default().to_string();
        let event = match message.kind() {
            STARTUP => LifespanEvent::Startup,
            STARTUP_COMPLETE => LifespanEvent::StartupComplete,
            STARTUP_FAILED => LifespanEvent::StartupFailed { message: reason() },
            SHUTDOWN => LifespanEvent::Shutdown,
            SHUTDOWN_COMPLETE => LifespanEvent::ShutdownComplete,
            SHUTDOWN_FAILED => LifespanEvent::ShutdownFailed { message: reason() },
            _ => return None,
        };
        Some(event)
    }
}

impl From<LifespanEvent> for Message {
    fn from(event: LifespanEvent) -> Self {
        let kind = event.kind();
        match event {
            LifespanEvent::StartupFailed { message } | LifespanEvent::ShutdownFailed { message } => {
                Message::new(kind).with("message", message)
            }
            _ => Message::new(kind),
        }
    }
}
