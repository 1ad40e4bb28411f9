//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware / lifecycle / host
//!     → tracing events (structured fields, handshake_id span)
//!     → logging.rs (fmt subscriber with env filter)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Every handshake runs inside a span carrying a UUID v4 handshake id
//! - Library code only emits events; installing a subscriber is the binary's job

pub mod logging;
