//! Lifespan middleware for message-passing applications.
//!
//! Wraps an application so a caller-supplied setup/teardown routine runs in
//! lock-step with the application's own startup/shutdown handshake, whether or
//! not the application implements that handshake.

pub mod app;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod protocol;

pub use app::{app_fn, Application};
pub use config::{LifespanConfig, MiddlewareConfig, UnsupportedConvention};
pub use error::{AppError, BoxError, LifespanError};
pub use host::{HostError, HostLifespan, LifespanHost};
pub use lifecycle::{lifespan_fn, Lifespan, LifespanGuard, Phase};
pub use middleware::{LifespanLayer, LifespanMiddleware};
pub use protocol::{LifespanEvent, Message, MessageReceiver, MessageSender, Scope, ScopeType};
