//! Tower layer for stacking lifespans.

use tower::Layer;

use crate::config::LifespanConfig;
use crate::middleware::lifespan::LifespanMiddleware;

/// Applies a [`LifespanMiddleware`] to an application.
///
/// Layers stack like any tower layer: the first layer added to a
/// `ServiceBuilder` is the outermost, so its setup runs first and its
/// teardown last.
#[derive(Debug, Clone)]
pub struct LifespanLayer<L> {
    lifespan: L,
    config: LifespanConfig,
}

impl<L> LifespanLayer<L> {
    pub fn new(lifespan: L) -> Self {
        Self {
            lifespan,
            config: LifespanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifespanConfig) -> Self {
        self.config = config;
        self
    }
}

impl<A, L: Clone> Layer<A> for LifespanLayer<L> {
    type Service = LifespanMiddleware<A, L>;

    fn layer(&self, app: A) -> Self::Service {
        LifespanMiddleware::new(app, self.lifespan.clone()).with_config(self.config.clone())
    }
}
