use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument};

use hookwire_core::{
    DeliveryFilter, DeliveryId, DeliveryStats, EndpointId, NewEndpoint, TenantId,
    WebhookDelivery, WebhookEndpoint,
};
use hookwire_sender::Sender;
use hookwire_store::{DeliveryStore, EndpointRegistry};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::{EngineMetrics, MetricsSnapshot};

/// The webhook delivery engine.
///
/// Cheap to clone; clones share the same stores, sender, metrics, and
/// in-flight task tracker. Build one with
/// [`WebhookEngineBuilder`](crate::WebhookEngineBuilder).
#[derive(Clone)]
pub struct WebhookEngine {
    pub(crate) registry: Arc<dyn EndpointRegistry>,
    pub(crate) deliveries: Arc<dyn DeliveryStore>,
    pub(crate) sender: Arc<dyn Sender>,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) metrics: Arc<EngineMetrics>,
    pub(crate) tracker: TaskTracker,
    /// Bounds immediate deliveries to `max_concurrent_sends` across all
    /// dispatches.
    pub(crate) immediate_permits: Arc<Semaphore>,
}

impl WebhookEngine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Validate and register a new endpoint with a freshly generated secret.
    ///
    /// The returned endpoint carries the secret; this is the only time it is
    /// handed out.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id))]
    pub async fn register_endpoint(
        &self,
        request: NewEndpoint,
    ) -> Result<WebhookEndpoint, EngineError> {
        let endpoint = request.into_endpoint(hookwire_signer::generate_secret(), Utc::now())?;
        self.registry.insert_endpoint(&endpoint).await?;
        info!(endpoint_id = %endpoint.id, url = %endpoint.url, "endpoint registered");
        Ok(endpoint)
    }

    /// Stop all future deliveries to an endpoint. Deliveries already QUEUED
    /// finish their attempt; everything else is cancelled when next claimed.
    #[instrument(skip(self))]
    pub async fn deactivate_endpoint(&self, id: EndpointId) -> Result<WebhookEndpoint, EngineError> {
        let endpoint = self.registry.deactivate_endpoint(id, Utc::now()).await?;
        info!(endpoint_id = %id, "endpoint deactivated");
        Ok(endpoint)
    }

    pub async fn get_endpoint(&self, id: EndpointId) -> Result<WebhookEndpoint, EngineError> {
        self.registry
            .get_endpoint(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("endpoint {id}")))
    }

    pub async fn list_endpoints(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<WebhookEndpoint>, EngineError> {
        Ok(self.registry.list_endpoints(tenant_id).await?)
    }

    pub async fn get_delivery(&self, id: DeliveryId) -> Result<WebhookDelivery, EngineError> {
        self.deliveries
            .get_delivery(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("delivery {id}")))
    }

    pub async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, EngineError> {
        Ok(self.deliveries.list_deliveries(filter).await?)
    }

    /// Delivery counts for one endpoint, aggregated at call time.
    pub async fn delivery_stats(&self, endpoint_id: EndpointId) -> Result<DeliveryStats, EngineError> {
        Ok(self.deliveries.delivery_stats(endpoint_id).await?)
    }

    /// Wait for every in-flight immediate delivery to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        info!("webhook engine shutdown complete");
    }
}
