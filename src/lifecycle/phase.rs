//! Handshake phase tracking.

use tokio::sync::watch;

/// Where a lifespan handshake currently stands.
///
/// ```text
/// Idle → Starting → Running → Stopping → Stopped
///            └──────────┴─────────┴────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No handshake has begun.
    Idle,
    /// Running setup (outer manager, then the application).
    Starting,
    /// Startup acknowledged, waiting for the shutdown request.
    Running,
    /// Running teardown (application, then outer manager).
    Stopping,
    /// Shutdown acknowledged.
    Stopped,
    /// Startup or shutdown failed, or the host went away.
    Failed,
}

impl Phase {
    /// True once no further transition will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Stopped | Phase::Failed)
    }
}

/// Publishes phase changes to any number of observers.
#[derive(Debug)]
pub struct PhaseTracker {
    tx: watch::Sender<Phase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Idle);
        Self { tx }
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Current phase.
    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Move to `phase`. Works with zero subscribers.
    pub fn set(&self, phase: Phase) {
        let previous = self.tx.send_replace(phase);
        tracing::debug!(from = ?previous, to = ?phase, "Lifespan phase changed");
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
