//! Middleware subsystem.
//!
//! # Data Flow
//! ```text
//! Host call (scope, receive, send)
//!     → lifespan.rs
//!         scope.type != "lifespan" → wrapped application, untouched
//!         scope.type == "lifespan" → handshake (outer lifespan + application)
//!     → layer.rs wraps applications for tower-style stacking
//! ```

pub mod layer;
pub mod lifespan;

pub use layer::LifespanLayer;
pub use lifespan::LifespanMiddleware;
