//! Caller-supplied lifespan managers.
//!
//! A [`Lifespan`] is a scoped-resource factory: `enter` runs setup against the
//! wrapped application and returns a [`LifespanGuard`], whose `exit` runs
//! teardown. [`ExitOnDrop`] pairs every successful `enter` with an `exit`,
//! including when the owning future is dropped.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::BoxError;

/// Scoped setup/teardown wrapped around an application's lifetime.
#[async_trait]
pub trait Lifespan<A: ?Sized + Send + Sync + 'static>: Send + Sync + 'static {
    /// Run setup. The returned guard owns whatever must be released.
    async fn enter(&self, app: Arc<A>) -> Result<Box<dyn LifespanGuard>, BoxError>;
}

/// Release half of a [`Lifespan`]. Consumed by `exit`, so it runs at most once.
#[async_trait]
pub trait LifespanGuard: Send + 'static {
    async fn exit(self: Box<Self>) -> Result<(), BoxError>;
}

#[async_trait]
impl<A, L> Lifespan<A> for Arc<L>
where
    A: ?Sized + Send + Sync + 'static,
    L: Lifespan<A> + ?Sized,
{
    async fn enter(&self, app: Arc<A>) -> Result<Box<dyn LifespanGuard>, BoxError> {
        (**self).enter(app).await
    }
}

/// Lifespan built from a setup closure and a teardown closure.
/// See [`lifespan_fn`].
#[derive(Clone)]
pub struct FnLifespan<S, T> {
    setup: S,
    teardown: T,
}

/// Build a [`Lifespan`] from async closures.
///
/// `setup` receives the wrapped application and produces a state value;
/// `teardown` receives that state back when the guard exits.
pub fn lifespan_fn<S, T>(setup: S, teardown: T) -> FnLifespan<S, T> {
    FnLifespan { setup, teardown }
}

#[async_trait]
impl<A, S, SF, G, T, TF> Lifespan<A> for FnLifespan<S, T>
where
    A: ?Sized + Send + Sync + 'static,
    S: Fn(Arc<A>) -> SF + Send + Sync + 'static,
    SF: Future<Output = Result<G, BoxError>> + Send + 'static,
    G: Send + 'static,
    T: Fn(G) -> TF + Clone + Send + Sync + 'static,
    TF: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn enter(&self, app: Arc<A>) -> Result<Box<dyn LifespanGuard>, BoxError> {
        let state = (self.setup)(app).await?;
        Ok(Box::new(FnGuard {
            state,
            teardown: self.teardown.clone(),
        }))
    }
}

struct FnGuard<G, T> {
    state: G,
    teardown: T,
}

#[async_trait]
impl<G, T, TF> LifespanGuard for FnGuard<G, T>
where
    G: Send + 'static,
    T: FnOnce(G) -> TF + Send + 'static,
    TF: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn exit(self: Box<Self>) -> Result<(), BoxError> {
        let FnGuard { state, teardown } = *self;
        teardown(state).await
    }
}

/// Guard wrapper that still runs teardown if it is dropped without `exit`.
///
/// On drop the pending exit is spawned onto the current tokio runtime. With no
/// runtime available the teardown cannot run and an error is logged.
pub struct ExitOnDrop {
    guard: Option<Box<dyn LifespanGuard>>,
}

impl ExitOnDrop {
    pub fn new(guard: Box<dyn LifespanGuard>) -> Self {
        Self { guard: Some(guard) }
    }

    /// Run teardown now.
    pub async fn exit(mut self) -> Result<(), BoxError> {
        match self.guard.take() {
            Some(guard) => guard.exit().await,
            None => Ok(()),
        }
    }
}

impl Drop for ExitOnDrop {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!("Lifespan dropped before shutdown, running teardown in background");
                handle.spawn(async move {
                    if let Err(e) = guard.exit().await {
                        tracing::error!(error = %e, "Background lifespan teardown failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!("Lifespan dropped outside a tokio runtime, teardown skipped");
            }
        }
    }
}
