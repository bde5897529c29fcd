use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use hookwire_core::{
    DeliveryFilter, DeliveryId, DeliveryStats, DeliveryStatus, EndpointId, NewDelivery,
    OutcomeUpdate, TenantId, WebhookDelivery, WebhookEndpoint,
};
use hookwire_store::{
    ClaimOutcome, DeliveryStore, EndpointRegistry, StoreError, cancel_reason,
};

type Row = Arc<Mutex<WebhookDelivery>>;

/// In-memory [`DeliveryStore`] and [`EndpointRegistry`].
///
/// Each delivery lives behind its own mutex, which plays the role of a row
/// lock: claims use `try_lock` and skip rows another worker holds. The
/// delivery index sits behind a single `RwLock` so a dispatch batch becomes
/// visible in one step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    endpoints: DashMap<EndpointId, WebhookEndpoint>,
    deliveries: RwLock<HashMap<DeliveryId, Row>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_deliveries` call fail at commit time, after
    /// the batch has been staged. Used to exercise all-or-nothing dispatch.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of stored deliveries.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.read().len()
    }

    fn row(&self, id: DeliveryId) -> Option<Row> {
        self.deliveries.read().get(&id).cloned()
    }

    /// Snapshot every row, locking each briefly.
    fn snapshot(&self, mut keep: impl FnMut(&WebhookDelivery) -> bool) -> Vec<WebhookDelivery> {
        let rows: Vec<Row> = self.deliveries.read().values().cloned().collect();
        rows.iter()
            .filter_map(|row| {
                let delivery = row.lock();
                keep(&delivery).then(|| delivery.clone())
            })
            .collect()
    }
}

#[async_trait]
impl EndpointRegistry for MemoryStore {
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), StoreError> {
        match self.endpoints.entry(endpoint.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "endpoint {} already exists",
                endpoint.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(endpoint.clone());
                Ok(())
            }
        }
    }

    async fn get_endpoint(&self, id: EndpointId) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.endpoints.get(&id).map(|e| e.value().clone()))
    }

    async fn list_endpoints(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let mut endpoints: Vec<WebhookEndpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.tenant_id == *tenant_id)
            .map(|e| e.value().clone())
            .collect();
        endpoints.sort_by_key(|e| (e.created_at, e.id));
        Ok(endpoints)
    }

    async fn deactivate_endpoint(
        &self,
        id: EndpointId,
        now: DateTime<Utc>,
    ) -> Result<WebhookEndpoint, StoreError> {
        let mut endpoint = self
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("endpoint {id}")))?;
        if endpoint.active {
            endpoint.active = false;
            endpoint.revoked_at = Some(now);
        }
        Ok(endpoint.clone())
    }

    async fn resolve_subscribers(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let mut endpoints: Vec<WebhookEndpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.tenant_id == *tenant_id && e.accepts(event_type))
            .map(|e| e.value().clone())
            .collect();
        endpoints.sort_by_key(|e| (e.created_at, e.id));
        Ok(endpoints)
    }
}

#[async_trait]
impl DeliveryStore for MemoryStore {
    async fn create_deliveries(
        &self,
        deliveries: Vec<NewDelivery>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let staged: Vec<WebhookDelivery> = deliveries
            .into_iter()
            .map(|d| d.into_delivery(now))
            .collect();

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            warn!(rows = staged.len(), "injected commit failure, batch discarded");
            return Err(StoreError::Backend("injected commit failure".into()));
        }

        let ids: Vec<DeliveryId> = staged.iter().map(|d| d.id).collect();
        let mut index = self.deliveries.write();
        for delivery in staged {
            index.insert(delivery.id, Arc::new(Mutex::new(delivery)));
        }
        Ok(ids)
    }

    async fn list_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let mut due: Vec<(DateTime<Utc>, DeliveryId)> = self
            .snapshot(|d| d.is_due(now))
            .into_iter()
            .filter_map(|d| d.next_attempt_at.map(|at| (at, d.id)))
            .collect();
        due.sort_unstable();
        Ok(due.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let Some(row) = self.row(id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        let Some(mut delivery) = row.try_lock() else {
            debug!(delivery_id = %id, "row locked by another worker, skipping");
            return Ok(ClaimOutcome::Contended);
        };
        if !delivery.is_due(now) {
            return Ok(ClaimOutcome::NotClaimable {
                status: delivery.status,
            });
        }

        let endpoint = self
            .endpoints
            .get(&delivery.endpoint_id)
            .map(|e| e.value().clone());

        if let Some(reason) = cancel_reason(endpoint.as_ref(), &delivery) {
            delivery.mark_cancelled(reason.as_str(), now)?;
            return Ok(ClaimOutcome::Cancelled {
                delivery: delivery.clone(),
                reason,
            });
        }
        let Some(endpoint) = endpoint else {
            return Ok(ClaimOutcome::NotFound);
        };

        delivery.mark_queued(now)?;
        Ok(ClaimOutcome::Claimed {
            delivery: delivery.clone(),
            endpoint,
        })
    }

    async fn record_outcome(
        &self,
        id: DeliveryId,
        claimed_at: DateTime<Utc>,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError> {
        let row = self
            .row(id)
            .ok_or_else(|| StoreError::NotFound(format!("delivery {id}")))?;
        let mut delivery = row.lock();
        if delivery.status != DeliveryStatus::Queued {
            return Err(StoreError::NotQueued {
                id,
                status: delivery.status,
            });
        }
        if delivery.claimed_at != Some(claimed_at) {
            return Err(StoreError::ClaimSuperseded { id });
        }
        delivery.apply_outcome(update)?;
        Ok(())
    }

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(self.row(id).map(|row| row.lock().clone()))
    }

    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut rows = self.snapshot(|d| filter.matches(d));
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }

    async fn delivery_stats(&self, endpoint_id: EndpointId) -> Result<DeliveryStats, StoreError> {
        let mut stats = DeliveryStats::default();
        for delivery in self.snapshot(|d| d.endpoint_id == endpoint_id) {
            stats.add(delivery.status, 1);
        }
        Ok(stats)
    }

    async fn list_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut stale = self.snapshot(|d| {
            d.status == DeliveryStatus::Queued && d.claimed_at.is_some_and(|at| at <= cutoff)
        });
        stale.sort_by_key(|d| (d.claimed_at, d.id));
        stale.truncate(limit);
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hookwire_core::{NewEndpoint, WebhookSecret};
    use hookwire_store::testing::run_store_conformance_tests;

    use super::*;

    fn endpoint(store: &MemoryStore) -> WebhookEndpoint {
        let ep = NewEndpoint::new("t1", "https://example.com/hook", ["bio.*"])
            .into_endpoint(WebhookSecret::new("secret"), Utc::now())
            .unwrap();
        store.endpoints.insert(ep.id, ep.clone());
        ep
    }

    fn new_delivery(ep: &WebhookEndpoint) -> NewDelivery {
        NewDelivery {
            endpoint_id: ep.id,
            tenant_id: ep.tenant_id.clone(),
            event_type: "bio.created".into(),
            payload: "{}".into(),
        }
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn injected_commit_failure_creates_nothing() {
        let store = MemoryStore::new();
        let ep = endpoint(&store);
        store.fail_next_commit();

        let result = store
            .create_deliveries(vec![new_delivery(&ep), new_delivery(&ep)], Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(store.delivery_count(), 0);

        // Only the next commit fails.
        let ids = store
            .create_deliveries(vec![new_delivery(&ep)], Utc::now())
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.delivery_count(), 1);
    }

    #[tokio::test]
    async fn locked_row_is_contended() {
        let store = MemoryStore::new();
        let ep = endpoint(&store);
        let now = Utc::now();
        let ids = store
            .create_deliveries(vec![new_delivery(&ep)], now)
            .await
            .unwrap();

        let row = store.row(ids[0]).unwrap();
        let guard = row.lock();
        let outcome = store.claim_delivery(ids[0], now).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Contended));
        drop(guard);

        let outcome = store.claim_delivery(ids[0], now).await.unwrap();
        assert!(outcome.is_claimed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let ep = endpoint(&store);
        let now = Utc::now();
        let ids = store
            .create_deliveries(vec![new_delivery(&ep)], now)
            .await
            .unwrap();
        let id = ids[0];

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.claim_delivery(id, now).await.unwrap() })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap().is_claimed() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn missing_endpoint_cancels() {
        let store = MemoryStore::new();
        let ep = endpoint(&store);
        let now = Utc::now();
        let ids = store
            .create_deliveries(vec![new_delivery(&ep)], now)
            .await
            .unwrap();
        store.endpoints.remove(&ep.id);

        match store.claim_delivery(ids[0], now).await.unwrap() {
            ClaimOutcome::Cancelled { reason, .. } => {
                assert_eq!(reason, hookwire_store::CancelReason::EndpointMissing);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
