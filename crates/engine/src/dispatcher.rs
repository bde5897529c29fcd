use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use hookwire_core::{DeliveryId, NewDelivery, TenantId, ValidationError, validate_event_type};

use crate::engine::WebhookEngine;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;

impl WebhookEngine {
    /// Fan an event out to every active endpoint of `tenant_id` subscribed to
    /// `event_type`.
    ///
    /// The payload is serialized once and stored with each delivery. All rows
    /// are created in one transaction: on failure none exist and nothing is
    /// scheduled. An event with no subscribers returns an empty list.
    ///
    /// With `immediate_delivery` enabled, each new delivery is handed to the
    /// claim-and-send path on a background task; otherwise the next sweep
    /// picks it up. At most `max_concurrent_sends` of those tasks send at
    /// once; the rest wait for a permit.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, event_type = %event_type))]
    pub async fn dispatch<T>(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
        data: &T,
    ) -> Result<Vec<DeliveryId>, EngineError>
    where
        T: Serialize + ?Sized + Sync,
    {
        if tenant_id.is_empty() {
            return Err(ValidationError::EmptyTenant.into());
        }
        validate_event_type(event_type)?;

        let subscribers = self
            .registry
            .resolve_subscribers(tenant_id, event_type)
            .await?;
        if subscribers.is_empty() {
            debug!("no subscribed endpoints, nothing to deliver");
            return Ok(Vec::new());
        }

        let payload =
            serde_json::to_string(data).map_err(|e| ValidationError::Payload(e.to_string()))?;

        let new_deliveries: Vec<NewDelivery> = subscribers
            .iter()
            .map(|endpoint| NewDelivery {
                endpoint_id: endpoint.id,
                tenant_id: tenant_id.clone(),
                event_type: event_type.to_owned(),
                payload: payload.clone(),
            })
            .collect();

        let ids = self
            .deliveries
            .create_deliveries(new_deliveries, Utc::now())
            .await?;

        EngineMetrics::incr(&self.metrics.events_dispatched);
        EngineMetrics::add(&self.metrics.deliveries_created, ids.len() as u64);
        info!(deliveries = ids.len(), "event dispatched");

        if self.config.immediate_delivery {
            for &id in &ids {
                let engine = self.clone();
                self.tracker.spawn(async move {
                    let Ok(_permit) = Arc::clone(&engine.immediate_permits).acquire_owned().await
                    else {
                        return; // semaphore closed
                    };
                    if let Err(e) = engine.process_delivery(id).await {
                        warn!(delivery_id = %id, error = %e, "immediate delivery failed");
                    }
                });
            }
        }

        Ok(ids)
    }
}
