//! Driving the wrapped application's own lifespan handshake.
//!
//! The application is called with a `lifespan` scope on its own task and fed
//! `lifespan.startup`. What it does next decides [`Support`]:
//!
//! ```text
//! sends startup.complete            → Supported
//! sends startup.failed              → genuine failure
//! returns Ok without acknowledging  → Unsupported
//! returns LifespanUnsupported       → Unsupported
//! errors before reading anything    → Unsupported (ExplicitOrEarlyError only)
//! errors after reading              → genuine failure
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

use crate::app::Application;
use crate::config::{LifespanConfig, UnsupportedConvention};
use crate::error::{error_report, AppError, LifespanError};
use crate::protocol::message::{SHUTDOWN_COMPLETE, STARTUP_COMPLETE};
use crate::protocol::{channel, LifespanEvent, Message, MessageReceiver, MessageSender, Scope};

type CallHandle = JoinHandle<Result<(), AppError>>;

/// Outcome of probing the application for lifespan support.
#[derive(Debug)]
pub enum Support {
    /// The application acknowledged startup and is waiting for shutdown.
    Supported(InnerHandle),
    /// The application does not take part in the handshake.
    Unsupported,
}

impl Support {
    pub fn is_supported(&self) -> bool {
        matches!(self, Support::Supported(_))
    }
}

/// Entry point for running an application's handshake.
pub struct InnerLifespan;

impl InnerLifespan {
    /// Start the application's handshake and wait for its verdict.
    pub async fn start<A>(app: Arc<A>, config: &LifespanConfig) -> Result<Support, LifespanError>
    where
        A: Application + ?Sized,
    {
        let (to_app, app_rx) = channel(config.channel_capacity);
        let (app_tx, mut from_app) = channel(config.channel_capacity);
        let listened = Arc::new(AtomicBool::new(false));
        let app_rx = app_rx.observe_reads(Arc::clone(&listened));

        let mut task = Some(tokio::spawn(async move {
            app.call(Scope::lifespan(), app_rx, app_tx).await
        }));

        // Fails only if the call already returned, which the loop below sees.
        let _ = to_app.send(LifespanEvent::Startup).await;

        let mut exited = None;
        loop {
            match next_event(&mut from_app, &mut task).await {
                Next::Message(msg) => match LifespanEvent::parse(&msg) {
                    Some(LifespanEvent::StartupComplete) => {
                        tracing::debug!("Application acknowledged lifespan startup");
                        return Ok(Support::Supported(InnerHandle {
                            to_app,
                            from_app,
                            task,
                            include_chain: config.include_error_chain,
                        }));
                    }
                    Some(LifespanEvent::StartupFailed { message }) => {
                        abort(task);
                        return Err(LifespanError::InnerStartup { reason: message });
                    }
                    _ => {
                        abort(task);
                        return Err(LifespanError::UnexpectedMessage {
                            expected: STARTUP_COMPLETE,
                            received: msg.kind,
                        });
                    }
                },
                Next::Exited(outcome) => exited = Some(outcome),
                Next::Drained => {
                    return classify(
                        exited.unwrap_or(Ok(())),
                        listened.load(Ordering::SeqCst),
                        config,
                    );
                }
            }
        }
    }
}

/// A running application handshake, waiting for shutdown.
#[derive(Debug)]
pub struct InnerHandle {
    to_app: MessageSender,
    from_app: MessageReceiver,
    /// `None` once the call has been joined.
    task: Option<CallHandle>,
    include_chain: bool,
}

impl InnerHandle {
    /// Send `lifespan.shutdown` and wait for the application's answer.
    ///
    /// The error is the application's failure reason.
    pub async fn shutdown(mut self) -> Result<(), String> {
        if self.task.is_none() {
            // Acknowledged startup and already returned; nothing left to stop.
            return Ok(());
        }

        let _ = self.to_app.send(LifespanEvent::Shutdown).await;

        let mut exited = None;
        loop {
            match next_event(&mut self.from_app, &mut self.task).await {
                Next::Message(msg) => match LifespanEvent::parse(&msg) {
                    Some(LifespanEvent::ShutdownComplete) => {
                        if let Some(task) = self.task.take() {
                            if let Err(e) = joined(task.await) {
                                tracing::warn!(error = %e, "Application errored after completing shutdown");
                            }
                        }
                        return Ok(());
                    }
                    Some(LifespanEvent::ShutdownFailed { message }) => {
                        if let Some(task) = self.task.take() {
                            if let Err(e) = joined(task.await) {
                                tracing::warn!(error = %e, "Application errored after reporting shutdown failure");
                            }
                        }
                        return Err(message);
                    }
                    _ => {
                        tracing::warn!(
                            expected = SHUTDOWN_COMPLETE,
                            received = %msg.kind,
                            "Ignoring unexpected message from application"
                        );
                    }
                },
                Next::Exited(outcome) => exited = Some(outcome),
                Next::Drained => {
                    return match exited {
                        Some(Err(e)) => Err(error_report(&e, self.include_chain)),
                        _ => Ok(()),
                    };
                }
            }
        }
    }
}

impl Drop for InnerHandle {
    fn drop(&mut self) {
        // Dropped without `shutdown`: let the application tear down on its own.
        if self.task.is_some() && self.to_app.try_send(LifespanEvent::Shutdown).is_ok() {
            tracing::debug!("Detached application lifespan after sending shutdown");
        }
    }
}

enum Next {
    Message(Message),
    Exited(Result<(), AppError>),
    /// The call has returned and nothing it sent is left in the queue.
    Drained,
}

/// Next thing that happens on the application side. Queued messages win over
/// the call finishing, so an acknowledgement sent just before returning is
/// never lost. Once the call has returned only what is already queued is
/// read: a sender clone kept alive by a background task must not stall the
/// handshake.
async fn next_event(from_app: &mut MessageReceiver, task: &mut Option<CallHandle>) -> Next {
    if let Some(handle) = task.as_mut() {
        let finished = tokio::select! {
            biased;
            msg = from_app.recv() => match msg {
                Ok(msg) => return Next::Message(msg),
                Err(_) => None,
            },
            outcome = &mut *handle => Some(outcome),
        };
        let outcome = match finished {
            Some(outcome) => outcome,
            None => handle.await,
        };
        *task = None;
        return Next::Exited(joined(outcome));
    }

    match from_app.try_recv() {
        Some(msg) => Next::Message(msg),
        None => Next::Drained,
    }
}

fn joined(outcome: Result<Result<(), AppError>, JoinError>) -> Result<(), AppError> {
    outcome.unwrap_or_else(|e| Err(AppError::msg(format!("application lifespan task failed: {e}"))))
}

fn abort(task: Option<CallHandle>) {
    if let Some(task) = task {
        task.abort();
    }
}

fn classify(
    outcome: Result<(), AppError>,
    listened: bool,
    config: &LifespanConfig,
) -> Result<Support, LifespanError> {
    match outcome {
        Ok(()) => {
            tracing::debug!("Application returned without acknowledging startup, lifespan unsupported");
            Ok(Support::Unsupported)
        }
        Err(AppError::LifespanUnsupported) => {
            tracing::debug!("Application signalled lifespan unsupported");
            Ok(Support::Unsupported)
        }
        Err(e) if !listened && config.unsupported == UnsupportedConvention::ExplicitOrEarlyError => {
            tracing::debug!(error = %e, "Application failed before reading the handshake, lifespan unsupported");
            Ok(Support::Unsupported)
        }
        Err(e) => Err(LifespanError::InnerStartup {
            reason: error_report(&e, config.include_error_chain),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::app_fn;

    fn config() -> LifespanConfig {
        LifespanConfig::default()
    }

    #[tokio::test]
    async fn supporting_app_runs_both_phases() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, send: MessageSender| async move {
            receive.recv().await?;
            send.send(LifespanEvent::StartupComplete).await?;
            receive.recv().await?;
            send.send(LifespanEvent::ShutdownComplete).await
        });

        let support = InnerLifespan::start(Arc::new(app), &config()).await.unwrap();
        let Support::Supported(handle) = support else {
            panic!("expected lifespan support");
        };
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn app_that_returns_is_unsupported() {
        let app = app_fn(|_scope, _receive, _send| async { Ok(()) });
        let support = InnerLifespan::start(Arc::new(app), &config()).await.unwrap();
        assert!(!support.is_supported());
    }

    #[tokio::test]
    async fn returning_while_a_sender_lingers_is_unsupported() {
        let app = app_fn(|_scope, _receive, send: MessageSender| async move {
            tokio::spawn(async move {
                let _send = send;
                std::future::pending::<()>().await;
            });
            Ok(())
        });
        let support = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            InnerLifespan::start(Arc::new(app), &config()),
        )
        .await
        .expect("startup stalled on the lingering sender")
        .unwrap();
        assert!(!support.is_supported());
    }

    #[tokio::test]
    async fn shutdown_returns_while_a_sender_lingers() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, send: MessageSender| async move {
            receive.recv().await?;
            send.send(LifespanEvent::StartupComplete).await?;
            receive.recv().await?;
            tokio::spawn(async move {
                let _send = send;
                std::future::pending::<()>().await;
            });
            Ok(())
        });

        let Support::Supported(handle) = InnerLifespan::start(Arc::new(app), &config()).await.unwrap() else {
            panic!("expected lifespan support");
        };
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle.shutdown())
            .await
            .expect("shutdown stalled on the lingering sender");
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn early_error_depends_on_convention() {
        let app = Arc::new(app_fn(|scope: Scope, _receive, _send| async move {
            Err(AppError::msg(format!("unsupported scope type {}", scope.kind)))
        }));

        let support = InnerLifespan::start(Arc::clone(&app), &config()).await.unwrap();
        assert!(!support.is_supported());

        let strict = LifespanConfig {
            unsupported: UnsupportedConvention::Explicit,
            ..LifespanConfig::default()
        };
        let err = InnerLifespan::start(app, &strict).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "application startup failed: unsupported scope type lifespan"
        );
    }

    #[tokio::test]
    async fn explicit_signal_after_reading_is_unsupported() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, _send| async move {
            receive.recv().await?;
            Err(AppError::LifespanUnsupported)
        });
        let support = InnerLifespan::start(Arc::new(app), &config()).await.unwrap();
        assert!(!support.is_supported());
    }

    #[tokio::test]
    async fn error_after_reading_is_genuine() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, _send| async move {
            receive.recv().await?;
            Err(AppError::msg("cache warmup failed"))
        });
        let err = InnerLifespan::start(Arc::new(app), &config()).await.unwrap_err();
        assert!(matches!(err, LifespanError::InnerStartup { ref reason } if reason == "cache warmup failed"));
    }

    #[tokio::test]
    async fn startup_failed_message_is_genuine() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, send: MessageSender| async move {
            receive.recv().await?;
            send.send(LifespanEvent::StartupFailed {
                message: "migrations pending".into(),
            })
            .await
        });
        let err = InnerLifespan::start(Arc::new(app), &config()).await.unwrap_err();
        assert!(matches!(err, LifespanError::InnerStartup { ref reason } if reason == "migrations pending"));
    }

    #[tokio::test]
    async fn shutdown_failure_reports_reason() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, send: MessageSender| async move {
            receive.recv().await?;
            send.send(LifespanEvent::StartupComplete).await?;
            receive.recv().await?;
            Err(AppError::msg("flush failed"))
        });

        let Support::Supported(handle) = InnerLifespan::start(Arc::new(app), &config()).await.unwrap() else {
            panic!("expected lifespan support");
        };
        assert_eq!(handle.shutdown().await.unwrap_err(), "flush failed");
    }

    #[tokio::test]
    async fn shutdown_failed_message_joins_erroring_app() {
        let app = app_fn(|_scope, mut receive: MessageReceiver, send: MessageSender| async move {
            receive.recv().await?;
            send.send(LifespanEvent::StartupComplete).await?;
            receive.recv().await?;
            send.send(LifespanEvent::ShutdownFailed {
                message: "queue not drained".into(),
            })
            .await?;
            Err(AppError::msg("queue not drained"))
        });

        let Support::Supported(handle) = InnerLifespan::start(Arc::new(app), &config()).await.unwrap() else {
            panic!("expected lifespan support");
        };
        assert_eq!(handle.shutdown().await.unwrap_err(), "queue not drained");
    }
}
