//! Application abstraction.
//!
//! # Data Flow
//! ```text
//! Host builds (Scope, MessageReceiver, MessageSender)
//!     → Application::call
//!     → handler reads inbound messages, writes outbound messages
//!     → Ok(()) when the interaction is finished
//! ```
//!
//! # Design Decisions
//! - One entry point for every interaction type; `scope.kind` selects the mode
//! - Lifespan support is never declared; it is observed at runtime
//! - Middlewares are applications too, so they nest

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::AppError;
use crate::protocol::{MessageReceiver, MessageSender, Scope};

/// An application reachable through the standard calling convention.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    async fn call(
        &self,
        scope: Scope,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError>;
}

#[async_trait]
impl<T: Application + ?Sized> Application for Arc<T> {
    async fn call(
        &self,
        scope: Scope,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        (**self).call(scope, receive, send).await
    }
}

#[async_trait]
impl<T: Application + ?Sized> Application for Box<T> {
    async fn call(
        &self,
        scope: Scope,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        (**self).call(scope, receive, send).await
    }
}

/// Application backed by an async closure. See [`app_fn`].
#[derive(Clone)]
pub struct AppFn<F> {
    f: F,
}

/// Build an [`Application`] from an async closure.
///
/// ```
/// use lifespan_middleware::app::app_fn;
/// use lifespan_middleware::AppError;
///
/// let app = app_fn(|_scope, _receive, _send| async { Ok::<(), AppError>(()) });
/// # let _ = app;
/// ```
pub fn app_fn<F, Fut>(f: F) -> AppFn<F>
where
    F: Fn(Scope, MessageReceiver, MessageSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    AppFn { f }
}

#[async_trait]
impl<F, Fut> Application for AppFn<F>
where
    F: Fn(Scope, MessageReceiver, MessageSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    async fn call(
        &self,
        scope: Scope,
        receive: MessageReceiver,
        send: MessageSender,
    ) -> Result<(), AppError> {
        (self.f)(scope, receive, send).await
    }
}
