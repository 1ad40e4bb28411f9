//! Host-side driver for the lifespan handshake and ordinary interactions.

use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::app::Application;
use crate::error::AppError;
use crate::protocol::message::{SHUTDOWN_COMPLETE, STARTUP_COMPLETE};
use crate::protocol::{
    channel, LifespanEvent, Message, MessageReceiver, MessageSender, Scope, DEFAULT_CAPACITY,
};

/// Errors seen by the host while driving the handshake.
#[derive(Debug, Error)]
pub enum HostError {
    /// The application answered `lifespan.startup.failed`.
    #[error("application startup failed: {message}")]
    StartupFailed {
        message: String,
        #[source]
        source: Option<AppError>,
    },

    /// The application answered `lifespan.shutdown.failed`.
    #[error("application shutdown failed: {message}")]
    ShutdownFailed {
        message: String,
        #[source]
        source: Option<AppError>,
    },

    /// The lifespan call returned an error after acknowledging shutdown.
    #[error("application error during lifespan: {0}")]
    Application(#[source] AppError),

    #[error("expected `{expected}` but received `{received}`")]
    UnexpectedMessage {
        expected: &'static str,
        received: String,
    },

    #[error("lifespan already started")]
    AlreadyStarted,

    #[error("lifespan task failed: {0}")]
    Join(#[from] JoinError),
}

/// What `start` found out about the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLifespan {
    /// Startup acknowledged; `shutdown` must follow.
    Running,
    /// The application does not take part in the handshake.
    Unsupported,
}

struct Session {
    to_app: MessageSender,
    from_app: MessageReceiver,
    task: CallTask,
}

type CallOutcome = Result<Result<(), AppError>, JoinError>;

/// The lifespan call on its own task. Remembers the outcome once it returns.
struct CallTask {
    handle: JoinHandle<Result<(), AppError>>,
    outcome: Option<CallOutcome>,
}

impl CallTask {
    fn new(handle: JoinHandle<Result<(), AppError>>) -> Self {
        Self {
            handle,
            outcome: None,
        }
    }

    /// Next reply from the application, or `None` once the call has returned
    /// and nothing it sent is left queued. Sender clones held elsewhere do not
    /// keep this waiting.
    async fn reply(&mut self, from_app: &mut MessageReceiver) -> Option<Message> {
        if self.outcome.is_none() {
            let received = tokio::select! {
                biased;
                msg = from_app.recv() => msg.ok(),
                outcome = &mut self.handle => {
                    self.outcome = Some(outcome);
                    None
                }
            };
            if received.is_some() {
                return received;
            }
            if self.outcome.is_none() {
                self.outcome = Some((&mut self.handle).await);
            }
        }
        from_app.try_recv()
    }

    async fn join(mut self) -> CallOutcome {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self.handle.await,
        }
    }

    fn abort(&self) {
        if self.outcome.is_none() {
            self.handle.abort();
        }
    }
}

/// Drives an application the way a server would, without a transport.
pub struct LifespanHost<A: ?Sized> {
    app: Arc<A>,
    capacity: usize,
    session: Option<Session>,
}

impl<A: Application + ?Sized> LifespanHost<A> {
    pub fn new(app: Arc<A>) -> Self {
        Self {
            app,
            capacity: DEFAULT_CAPACITY,
            session: None,
        }
    }

    /// True between a successful `start` and `shutdown`.
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Run the startup half of the handshake.
    pub async fn start(&mut self) -> Result<HostLifespan, HostError> {
        if self.session.is_some() {
            return Err(HostError::AlreadyStarted);
        }

        let (to_app, app_rx) = channel(self.capacity);
        let (app_tx, mut from_app) = channel(self.capacity);
        let app = Arc::clone(&self.app);
        let mut task = CallTask::new(tokio::spawn(async move {
            app.call(Scope::lifespan(), app_rx, app_tx).await
        }));

        let _ = to_app.send(LifespanEvent::Startup).await;

        match task.reply(&mut from_app).await {
            Some(msg) => match LifespanEvent::parse(&msg) {
                Some(LifespanEvent::StartupComplete) => {
                    tracing::info!("Application startup complete");
                    self.session = Some(Session {
                        to_app,
                        from_app,
                        task,
                    });
                    Ok(HostLifespan::Running)
                }
                Some(LifespanEvent::StartupFailed { message }) => {
                    tracing::error!(reason = %message, "Application startup failed");
                    let source = task.join().await?.err();
                    Err(HostError::StartupFailed { message, source })
                }
                _ => {
                    task.abort();
                    Err(HostError::UnexpectedMessage {
                        expected: STARTUP_COMPLETE,
                        received: msg.kind,
                    })
                }
            },
            None => {
                match task.join().await? {
                    Ok(()) => tracing::info!("Application returned without lifespan support"),
                    Err(e) => {
                        tracing::warn!(error = %e, "Application raised during lifespan, continuing without it")
                    }
                }
                Ok(HostLifespan::Unsupported)
            }
        }
    }

    /// Run the shutdown half of the handshake. No-op if nothing is running.
    pub async fn shutdown(&mut self) -> Result<(), HostError> {
        let Some(Session {
            to_app,
            mut from_app,
            mut task,
        }) = self.session.take()
        else {
            return Ok(());
        };

        let _ = to_app.send(LifespanEvent::Shutdown).await;

        match task.reply(&mut from_app).await {
            Some(msg) => match LifespanEvent::parse(&msg) {
                Some(LifespanEvent::ShutdownComplete) => {
                    tracing::info!("Application shutdown complete");
                    task.join().await?.map_err(HostError::Application)
                }
                Some(LifespanEvent::ShutdownFailed { message }) => {
                    tracing::error!(reason = %message, "Application shutdown failed");
                    let source = task.join().await?.err();
                    Err(HostError::ShutdownFailed { message, source })
                }
                _ => {
                    task.abort();
                    Err(HostError::UnexpectedMessage {
                        expected: SHUTDOWN_COMPLETE,
                        received: msg.kind,
                    })
                }
            },
            None => task.join().await?.map_err(HostError::Application),
        }
    }

    /// Run one ordinary interaction.
    ///
    /// `inbound` is queued up front and the receive side then reads as
    /// disconnected. Returns every message the application sent, in order.
    pub async fn request(
        &self,
        scope: Scope,
        inbound: Vec<Message>,
    ) -> Result<Vec<Message>, AppError> {
        let (in_tx, in_rx) = channel(inbound.len().max(self.capacity));
        for msg in inbound {
            in_tx.send(msg).await?;
        }
        drop(in_tx);

        let (out_tx, mut out_rx) = channel(self.capacity);
        let call = self.app.call(scope, in_rx, out_tx);
        let collect = async move {
            let mut sent = Vec::new();
            while let Ok(msg) = out_rx.recv().await {
                sent.push(msg);
            }
            sent
        };

        let (result, sent) = futures_util::future::join(call, collect).await;
        result.map(|()| sent)
    }
}
