use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use hookwire_sender::Sender;
use hookwire_store::{DeliveryStore, EndpointRegistry, WebhookStore};

use crate::config::EngineConfig;
use crate::engine::WebhookEngine;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;

/// Fluent builder for constructing a [`WebhookEngine`].
///
/// An endpoint registry, a delivery store, and a sender must be supplied.
/// The configuration defaults to [`EngineConfig::default`].
#[derive(Default)]
pub struct WebhookEngineBuilder {
    registry: Option<Arc<dyn EndpointRegistry>>,
    deliveries: Option<Arc<dyn DeliveryStore>>,
    sender: Option<Arc<dyn Sender>>,
    config: EngineConfig,
}

impl WebhookEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one backend as both endpoint registry and delivery store.
    #[must_use]
    pub fn store<S: WebhookStore + 'static>(mut self, store: Arc<S>) -> Self {
        self.registry = Some(Arc::clone(&store) as Arc<dyn EndpointRegistry>);
        self.deliveries = Some(store as Arc<dyn DeliveryStore>);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<dyn EndpointRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn delivery_store(mut self, store: Arc<dyn DeliveryStore>) -> Self {
        self.deliveries = Some(store);
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: Arc<dyn Sender>) -> Self {
        self.sender = Some(sender);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] if a required component is
    /// missing or the configuration is invalid.
    pub fn build(self) -> Result<WebhookEngine, EngineError> {
        let registry = self
            .registry
            .ok_or_else(|| EngineError::Configuration("endpoint registry is required".into()))?;
        let deliveries = self
            .deliveries
            .ok_or_else(|| EngineError::Configuration("delivery store is required".into()))?;
        let sender = self
            .sender
            .ok_or_else(|| EngineError::Configuration("sender is required".into()))?;
        self.config.validate()?;
        let immediate_permits = Arc::new(Semaphore::new(self.config.max_concurrent_sends));

        Ok(WebhookEngine {
            registry,
            deliveries,
            sender,
            config: Arc::new(self.config),
            metrics: Arc::new(EngineMetrics::default()),
            tracker: TaskTracker::new(),
            immediate_permits,
        })
    }
}
