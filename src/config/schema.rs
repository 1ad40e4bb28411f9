//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_CAPACITY;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Handshake behaviour.
    pub lifespan: LifespanConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// How the wrapped application signals that it has no lifespan support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedConvention {
    /// Only `AppError::LifespanUnsupported`, or returning without
    /// acknowledging startup. Every other error is a startup failure.
    Explicit,

    /// Also treat an error raised before the application read its first
    /// handshake message as "unsupported". Applications that reject unknown
    /// scope types up front behave this way.
    #[default]
    ExplicitOrEarlyError,
}

/// Lifespan handshake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifespanConfig {
    /// Convention used to detect that the application lacks lifespan support.
    pub unsupported: UnsupportedConvention,

    /// Include the full error source chain in failure messages.
    pub include_error_chain: bool,

    /// Queue depth of the channels used to drive the application's handshake.
    pub channel_capacity: usize,
}

impl Default for LifespanConfig {
    fn default() -> Self {
        Self {
            unsupported: UnsupportedConvention::default(),
            include_error_chain: true,
            channel_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
