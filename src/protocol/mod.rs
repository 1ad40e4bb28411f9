//! Message-passing protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Host
//!     → scope.rs (interaction descriptor, `type` discriminator)
//!     → channel.rs (receive/send halves handed to the application)
//!     → message.rs (wire messages, typed lifespan events)
//!     → Application::call
//! ```
//!
//! # Design Decisions
//! - Messages are JSON objects keyed by a `type` field; everything else is opaque
//! - Lifespan events are a typed view over `Message`, never a separate wire format
//! - Channels are bounded tokio mpsc queues; a dropped peer reads as disconnect

pub mod channel;
pub mod message;
pub mod scope;

pub use channel::{channel, MessageReceiver, MessageSender, DEFAULT_CAPACITY};
pub use message::{LifespanEvent, Message};
pub use scope::{Scope, ScopeType};
