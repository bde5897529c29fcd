use async_trait::async_trait;
use chrono::{DateTime, Utc};

use hookwire_core::{
    DeliveryFilter, DeliveryId, DeliveryStats, EndpointId, NewDelivery, OutcomeUpdate, TenantId,
    WebhookDelivery, WebhookEndpoint,
};

use crate::claim::ClaimOutcome;
use crate::error::StoreError;

/// Storage of webhook endpoints.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Persist a newly registered endpoint. Fails with
    /// [`StoreError::Conflict`] if the id is already taken.
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), StoreError>;

    async fn get_endpoint(&self, id: EndpointId) -> Result<Option<WebhookEndpoint>, StoreError>;

    /// All endpoints of a tenant, active or not, oldest first.
    async fn list_endpoints(&self, tenant_id: &TenantId)
    -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Mark an endpoint inactive. Idempotent: an already inactive endpoint
    /// keeps its original `revoked_at`.
    async fn deactivate_endpoint(
        &self,
        id: EndpointId,
        now: DateTime<Utc>,
    ) -> Result<WebhookEndpoint, StoreError>;

    /// Active endpoints of `tenant_id` with a pattern matching `event_type`.
    async fn resolve_subscribers(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;
}

/// Durable storage of deliveries and the owner of their state transitions.
///
/// Implementations must be `Send + Sync` and safe for concurrent access by
/// any number of sweeping workers.
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Insert one PENDING delivery per entry in a single transaction. Either
    /// every row becomes visible or none does. Ids are returned in input
    /// order.
    async fn create_deliveries(
        &self,
        deliveries: Vec<NewDelivery>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError>;

    /// Ids of PENDING/RETRYING deliveries with `next_attempt_at <= now`,
    /// earliest first. Takes no locks.
    async fn list_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError>;

    /// Lock the row without waiting, re-check it is claimable and due, then
    /// either cancel it or move it to QUEUED. The change is committed before
    /// this returns.
    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Apply a resolved send outcome. Only succeeds while the delivery is
    /// still QUEUED under the claim identified by `claimed_at`.
    async fn record_outcome(
        &self,
        id: DeliveryId,
        claimed_at: DateTime<Utc>,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError>;

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Deliveries matching `filter`, newest first.
    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Per-status counts for one endpoint, computed at call time.
    async fn delivery_stats(&self, endpoint_id: EndpointId) -> Result<DeliveryStats, StoreError>;

    /// QUEUED deliveries claimed at or before `cutoff`, oldest claim first.
    async fn list_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;
}

/// A backend providing both endpoint and delivery storage.
pub trait WebhookStore: DeliveryStore + EndpointRegistry {}

impl<T: DeliveryStore + EndpointRegistry + ?Sized> WebhookStore for T {}
