//! Error types for applications and the lifespan handshake.

use thiserror::Error;

/// Boxed error used at trait seams where callers bring their own error types.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned from [`Application::call`](crate::app::Application::call).
#[derive(Debug, Error)]
pub enum AppError {
    /// The application does not implement the lifespan handshake.
    ///
    /// Returning this from a `lifespan` call is the explicit "unsupported"
    /// signal; it is never reported to the host as a failure.
    #[error("application does not support the lifespan protocol")]
    LifespanUnsupported,

    /// The peer side of a message channel is gone.
    #[error("message channel disconnected")]
    Disconnected,

    #[error(transparent)]
    Lifespan(#[from] LifespanError),

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl AppError {
    /// Wrap any error as an application failure.
    pub fn other(err: impl Into<BoxError>) -> Self {
        AppError::Other(err.into())
    }

    /// Application failure from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        AppError::Other(message.into())
    }
}

/// Failures of the startup/shutdown handshake.
#[derive(Debug, Error)]
pub enum LifespanError {
    /// The wrapping lifespan's setup phase failed.
    #[error("lifespan setup failed: {0}")]
    Startup(#[source] BoxError),

    /// The wrapped application reported a genuine startup failure.
    #[error("application startup failed: {reason}")]
    InnerStartup { reason: String },

    /// One or both teardown paths failed. Both were attempted.
    #[error("lifespan shutdown failed: {}", shutdown_summary(.outer, .inner))]
    Shutdown {
        outer: Option<BoxError>,
        inner: Option<String>,
    },

    #[error("expected `{expected}` but received `{received}`")]
    UnexpectedMessage {
        expected: &'static str,
        received: String,
    },

    /// The host went away in the middle of the handshake.
    #[error("lifespan session disconnected")]
    Disconnected,
}

impl LifespanError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifespanError::Startup(_) => "startup",
            LifespanError::InnerStartup { .. } => "inner_startup",
            LifespanError::Shutdown { .. } => "shutdown",
            LifespanError::UnexpectedMessage { .. } => "unexpected_message",
            LifespanError::Disconnected => "disconnected",
        }
    }
}

fn shutdown_summary(outer: &Option<BoxError>, inner: &Option<String>) -> String {
    match (outer, inner) {
        (Some(outer), Some(inner)) => format!("application: {inner}; lifespan: {outer}"),
        (Some(outer), None) => format!("lifespan: {outer}"),
        (None, Some(inner)) => format!("application: {inner}"),
        (None, None) => "no teardown error recorded".to_string(),
    }
}

/// Render an error for a failure message.
///
/// With `include_chain` every `source()` is appended, skipping causes whose
/// text the message already ends with.
pub fn error_report(err: &(dyn std::error::Error + 'static), include_chain: bool) -> String {
    let mut text = err.to_string();
    if !include_chain {
        return text;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}
