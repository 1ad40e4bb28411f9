//! In-process host.
//!
//! # Data Flow
//! ```text
//! LifespanHost::start
//!     → spawn app.call(lifespan scope) on its own task
//!     → send lifespan.startup, wait for the acknowledgement
//! LifespanHost::request (any number, any time)
//!     → app.call(scope) with the given inbound messages, collect what it sends
//! LifespanHost::shutdown
//!     → send lifespan.shutdown, wait for the acknowledgement, join the task
//! ```
//!
//! # Design Decisions
//! - No transport: messages are handed over in memory
//! - An application that returns or errors before acknowledging startup is
//!   treated as not supporting lifespan, and shutdown becomes a no-op
//! - Timeouts are left to the caller (wrap calls in `tokio::time::timeout`)

pub mod driver;

pub use driver::{HostError, HostLifespan, LifespanHost};
