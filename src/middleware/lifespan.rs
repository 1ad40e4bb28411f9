//! Lifespan middleware.
//! Runs a caller-supplied lifespan around the wrapped application's own.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::app::Application;
use crate::config::LifespanConfig;
use crate::error::{error_report, AppError, LifespanError};
use crate::lifecycle::{ExitOnDrop, InnerLifespan, Lifespan, Phase, PhaseTracker, Support};
use crate::protocol::message::STARTUP;
use crate::protocol::{LifespanEvent, MessageReceiver, MessageSender, Scope};

/// Wraps an application so that `lifespan` runs in lock-step with the
/// application's own startup/shutdown handshake.
///
/// Non-lifespan interactions go straight to the application. For the
/// handshake, setup runs outer first (this lifespan, then the application)
/// and teardown runs in reverse. Applications that do not speak the
/// handshake are tolerated: only the outer lifespan runs.
pub struct LifespanMiddleware<A: ?Sized, L> {
    app: Arc<A>,
    lifespan: L,
    config: LifespanConfig,
    phase: PhaseTracker,
}

impl<A, L> LifespanMiddleware<A, L> {
    pub fn new(app: A, lifespan: L) -> Self {
        Self::from_arc(Arc::new(app), lifespan)
    }
}

impl<A: ?Sized, L> LifespanMiddleware<A, L> {
    /// Wrap an application that is already shared.
    pub fn from_arc(app: Arc<A>, lifespan: L) -> Self {
        Self {
            app,
            lifespan,
            config: LifespanConfig::default(),
            phase: PhaseTracker::new(),
        }
    }

    pub fn with_config(mut self, config: LifespanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LifespanConfig {
        &self.config
    }

    /// The wrapped application.
    pub fn inner(&self) -> &Arc<A> {
        &self.app
    }

    /// Current handshake phase.
    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    /// Watch handshake phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn report(&self, err: &LifespanError) -> String {
        error_report(err, self.config.include_error_chain)
    }
}

impl<A, L> LifespanMiddleware<A, L>
where
    A: Application + ?Sized,
    L: Lifespan<A>,
{
    async fn handshake(
        &self,
        mut receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        self.phase.set(Phase::Starting);

        let first = match receive.recv().await {
            Ok(msg) => msg,
            Err(e) => {
                self.phase.set(Phase::Failed);
                return Err(e);
            }
        };
        if LifespanEvent::parse(&first) != Some(LifespanEvent::Startup) {
            self.phase.set(Phase::Failed);
            return Err(LifespanError::UnexpectedMessage {
                expected: STARTUP,
                received: first.kind,
            }
            .into());
        }

        let guard = match self.lifespan.enter(Arc::clone(&self.app)).await {
            Ok(guard) => ExitOnDrop::new(guard),
            Err(e) => {
                let err = LifespanError::Startup(e);
                tracing::error!(error = %err, "Lifespan setup failed");
                self.fail_startup(&send, self.report(&err)).await;
                return Err(err.into());
            }
        };
        tracing::debug!("Lifespan setup complete");

        let support = match InnerLifespan::start(Arc::clone(&self.app), &self.config).await {
            Ok(support) => support,
            Err(err) => {
                tracing::error!(error = %err, "Application startup failed, tearing down lifespan");
                let mut reason = self.report(&err);
                if let Err(e) = guard.exit().await {
                    tracing::error!(error = %e, "Lifespan teardown after failed startup failed");
                    reason.push_str("; lifespan teardown also failed: ");
                    reason.push_str(&error_report(&*e, self.config.include_error_chain));
                }
                self.fail_startup(&send, reason).await;
                return Err(err.into());
            }
        };

        self.phase.set(Phase::Running);
        if send.send(LifespanEvent::StartupComplete).await.is_err() {
            tracing::warn!("Host disconnected before startup was acknowledged");
            self.phase.set(Phase::Stopping);
            if let Err(err) = self.teardown(support, guard).await {
                tracing::error!(error = %err, "Teardown after disconnect failed");
            }
            self.phase.set(Phase::Failed);
            return Err(LifespanError::Disconnected.into());
        }
        tracing::info!(
            inner_lifespan = support.is_supported(),
            "Lifespan startup complete"
        );

        let shutdown_requested = loop {
            match receive.recv().await {
                Ok(msg) if LifespanEvent::parse(&msg) == Some(LifespanEvent::Shutdown) => break true,
                Ok(msg) => {
                    tracing::warn!(received = %msg.kind, "Ignoring unexpected message while running");
                }
                Err(_) => break false,
            }
        };

        self.phase.set(Phase::Stopping);
        let result = self.teardown(support, guard).await;

        if !shutdown_requested {
            if let Err(err) = &result {
                tracing::error!(error = %err, "Teardown after disconnect failed");
            }
            tracing::warn!("Host disconnected before shutdown, lifespan released");
            self.phase.set(Phase::Failed);
            return Err(LifespanError::Disconnected.into());
        }

        match result {
            Ok(()) => {
                self.phase.set(Phase::Stopped);
                if send.send(LifespanEvent::ShutdownComplete).await.is_err() {
                    tracing::debug!("Host gone before shutdown was acknowledged");
                }
                tracing::info!("Lifespan shutdown complete");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "Lifespan shutdown failed");
                self.phase.set(Phase::Failed);
                let message = self.report(&err);
                if send
                    .send(LifespanEvent::ShutdownFailed { message })
                    .await
                    .is_err()
                {
                    tracing::debug!("Host gone before shutdown failure was reported");
                }
                Err(err.into())
            }
        }
    }

    /// Application teardown first, then the outer lifespan. Both always run.
    async fn teardown(&self, support: Support, guard: ExitOnDrop) -> Result<(), LifespanError> {
        let inner = match support {
            Support::Supported(handle) => handle.shutdown().await.err(),
            Support::Unsupported => None,
        };
        if let Some(reason) = &inner {
            tracing::error!(reason = %reason, "Application lifespan teardown failed");
        }

        let outer = guard.exit().await.err();
        if let Some(e) = &outer {
            tracing::error!(error = %e, "Lifespan teardown failed");
        }

        match (outer, inner) {
            (None, None) => Ok(()),
            (outer, inner) => Err(LifespanError::Shutdown { outer, inner }),
        }
    }

    async fn fail_startup(&self, send: &MessageSender, message: String) {
        self.phase.set(Phase::Failed);
        if send
            .send(LifespanEvent::StartupFailed { message })
            .await
            .is_err()
        {
            tracing::debug!("Host gone before startup failure was reported");
        }
    }
}

#[async_trait]
impl<A, L> Application for LifespanMiddleware<A, L>
where
    A: Application + ?Sized,
    L: Lifespan<A>,
{
    async fn call(
        &self,
        scope: Scope,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        if !scope.is_lifespan() {
            return self.app.call(scope, receive, send).await;
        }

        let span = tracing::info_span!("lifespan", handshake_id = %Uuid::new_v4());
        self.handshake(receive, send).instrument(span).await
    }
}
