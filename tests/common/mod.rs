//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lifespan_middleware::protocol::{channel, DEFAULT_CAPACITY};
use lifespan_middleware::{
    AppError, Application, BoxError, Lifespan, LifespanEvent, LifespanGuard, Message,
    MessageReceiver, MessageSender, Scope,
};

/// Ordered log of setup/teardown calls shared by every fixture in a test.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

fn record(events: &Events, entry: String) {
    events.lock().unwrap().push(entry);
}

/// Poll until `entry` shows up in the log, or give up after a second.
pub async fn wait_for(events: &Events, entry: &str) -> bool {
    for _ in 0..100 {
        if snapshot(events).iter().any(|e| e == entry) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Outer lifespan that records `<name>-setup` / `<name>-teardown`.
#[derive(Clone)]
pub struct TrackingLifespan {
    name: &'static str,
    events: Events,
    fail_setup: Option<&'static str>,
    fail_teardown: Option<&'static str>,
}

impl TrackingLifespan {
    pub fn new(name: &'static str, events: &Events) -> Self {
        Self {
            name,
            events: Arc::clone(events),
            fail_setup: None,
            fail_teardown: None,
        }
    }

    pub fn failing_setup(mut self, reason: &'static str) -> Self {
        self.fail_setup = Some(reason);
        self
    }

    pub fn failing_teardown(mut self, reason: &'static str) -> Self {
        self.fail_teardown = Some(reason);
        self
    }
}

#[async_trait]
impl<A: ?Sized + Send + Sync + 'static> Lifespan<A> for TrackingLifespan {
    async fn enter(&self, _app: Arc<A>) -> Result<Box<dyn LifespanGuard>, BoxError> {
        record(&self.events, format!("{}-setup", self.name));
        if let Some(reason) = self.fail_setup {
            return Err(reason.into());
        }
        Ok(Box::new(TrackingGuard {
            name: self.name,
            events: Arc::clone(&self.events),
            fail: self.fail_teardown,
        }))
    }
}

struct TrackingGuard {
    name: &'static str,
    events: Events,
    fail: Option<&'static str>,
}

#[async_trait]
impl LifespanGuard for TrackingGuard {
    async fn exit(self: Box<Self>) -> Result<(), BoxError> {
        record(&self.events, format!("{}-teardown", self.name));
        match self.fail {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }
}

/// How [`LifespanApp`] answers `lifespan.startup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerSetup {
    Succeed,
    /// Sends `lifespan.startup.failed`, then returns an error.
    FailWithError,
    /// Sends `lifespan.startup.failed`, then returns `Ok`.
    FailWithMessageOnly,
}

/// Application with its own lifespan, recording `inner-setup` / `inner-teardown`.
pub struct LifespanApp {
    events: Events,
    setup: InnerSetup,
    fail_teardown: Option<&'static str>,
}

impl LifespanApp {
    pub fn new(events: &Events) -> Self {
        Self {
            events: Arc::clone(events),
            setup: InnerSetup::Succeed,
            fail_teardown: None,
        }
    }

    pub fn with_setup(mut self, setup: InnerSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn failing_teardown(mut self, reason: &'static str) -> Self {
        self.fail_teardown = Some(reason);
        self
    }
}

#[async_trait]
impl Application for LifespanApp {
    async fn call(
        &self,
        scope: Scope,
        mut receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        if !scope.is_lifespan() {
            return echo(scope, receive, send).await;
        }

        receive.recv().await?;
        record(&self.events, "inner-setup".to_string());
        match self.setup {
            InnerSetup::Succeed => {}
            InnerSetup::FailWithError => {
                send.send(LifespanEvent::StartupFailed {
                    message: "inner setup failed".into(),
                })
                .await?;
                return Err(AppError::msg("inner setup failed"));
            }
            InnerSetup::FailWithMessageOnly => {
                return send
                    .send(LifespanEvent::StartupFailed {
                        message: "inner setup failed".into(),
                    })
                    .await;
            }
        }
        send.send(LifespanEvent::StartupComplete).await?;

        receive.recv().await?;
        record(&self.events, "inner-teardown".to_string());
        if let Some(reason) = self.fail_teardown {
            send.send(LifespanEvent::ShutdownFailed {
                message: reason.into(),
            })
            .await?;
            return Err(AppError::msg(reason));
        }
        send.send(LifespanEvent::ShutdownComplete).await
    }
}

/// How [`PlainApp`] reacts to a lifespan scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoLifespan {
    /// Returns immediately without reading.
    Returns,
    /// Errors immediately without reading.
    Raises,
    /// Reads the startup message, then returns the explicit unsupported signal.
    Signals,
}

/// Application without lifespan support.
pub struct PlainApp {
    mode: NoLifespan,
}

impl PlainApp {
    pub fn new(mode: NoLifespan) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Application for PlainApp {
    async fn call(
        &self,
        scope: Scope,
        mut receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        if !scope.is_lifespan() {
            return echo(scope, receive, send).await;
        }
        match self.mode {
            NoLifespan::Returns => Ok(()),
            NoLifespan::Raises => Err(AppError::msg(format!("unsupported scope type {}", scope.kind))),
            NoLifespan::Signals => {
                receive.recv().await?;
                Err(AppError::LifespanUnsupported)
            }
        }
    }
}

/// Ordinary handler: reports the scope it saw, then echoes every inbound
/// message. Path `/fail` errors instead.
pub async fn echo(
    scope: Scope,
    mut receive: MessageReceiver,
    send: MessageSender,
) -> Result<(), AppError> {
    if scope.get("path").and_then(Value::as_str) == Some("/fail") {
        return Err(AppError::msg("handler failed"));
    }

    let seen = serde_json::to_value(&scope).map_err(AppError::other)?;
    send.send(Message::new("http.response.start").with("status", 200).with("scope", seen))
        .await?;
    while let Ok(msg) = receive.recv().await {
        let echoed = serde_json::to_value(&msg).map_err(AppError::other)?;
        send.send(Message::new("http.response.body").with("echo", echoed))
            .await?;
    }
    Ok(())
}

/// Run one lifespan call with `inbound` pre-queued; the host side then hangs
/// up. Returns the call's result and everything it sent.
pub async fn run_lifespan<A: Application + ?Sized>(
    app: &A,
    inbound: Vec<Message>,
) -> (Result<(), AppError>, Vec<Message>) {
    let (in_tx, in_rx) = channel(DEFAULT_CAPACITY);
    for msg in inbound {
        in_tx.send(msg).await.unwrap();
    }
    drop(in_tx);

    let (out_tx, mut out_rx) = channel(DEFAULT_CAPACITY);
    let result = app.call(Scope::lifespan(), in_rx, out_tx).await;

    let mut sent = Vec::new();
    while let Ok(msg) = out_rx.recv().await {
        sent.push(msg);
    }
    (result, sent)
}

/// Startup followed by shutdown.
pub fn full_cycle() -> Vec<Message> {
    vec![LifespanEvent::Startup.into(), LifespanEvent::Shutdown.into()]
}

pub fn kinds(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(Message::kind).collect()
}
