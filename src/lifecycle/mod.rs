//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     lifespan.startup → manager.rs (outer setup)
//!         → inner.rs (drive the application's own handshake)
//!         → lifespan.startup.complete
//!
//! Shutdown:
//!     lifespan.shutdown → inner.rs (application teardown, if supported)
//!         → manager.rs (outer teardown)
//!         → lifespan.shutdown.complete
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → host begins shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: outer first, then the application
//! - Ordered shutdown: application first, then outer
//! - Outer teardown is tied to a guard so it runs even if the handshake is dropped
//! - Timeouts belong to the host, not to this subsystem

pub mod inner;
pub mod manager;
pub mod phase;
pub mod signals;

pub use inner::{InnerHandle, InnerLifespan, Support};
pub use manager::{lifespan_fn, ExitOnDrop, FnLifespan, Lifespan, LifespanGuard};
pub use phase::{Phase, PhaseTracker};
