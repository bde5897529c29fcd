use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use hookwire_core::{
    DeliveryId, DeliveryOutcome, DeliveryStatus, OutcomeUpdate, WebhookDelivery, WebhookEndpoint,
};
use hookwire_sender::{OutboundRequest, SendError, outcome_of};
use hookwire_store::{CancelReason, ClaimOutcome, StoreError};

use crate::engine::WebhookEngine;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;

/// Error recorded on a delivery whose claim outlived `stale_claim_after`.
pub const STALE_CLAIM_ERROR: &str = "claim expired before outcome was recorded";

/// What happened to one delivery handed to the claim-and-send path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Sent and acknowledged with a 2xx.
    Delivered { status_code: u16 },
    /// The attempt failed and another is scheduled.
    Retrying {
        attempts: u32,
        next_attempt_at: Option<DateTime<Utc>>,
    },
    /// The attempt failed and the ceiling was reached.
    Failed { attempts: u32 },
    /// Cancelled at claim time without a send.
    Cancelled(CancelReason),
    /// Not claimed by this call.
    Skipped(SkipReason),
}

impl ProcessOutcome {
    fn from_update(update: &OutcomeUpdate) -> Self {
        match update.status {
            DeliveryStatus::Success => Self::Delivered {
                status_code: update.last_status_code.unwrap_or_default(),
            },
            DeliveryStatus::Failed => Self::Failed {
                attempts: update.attempts,
            },
            _ => Self::Retrying {
                attempts: update.attempts,
                next_attempt_at: update.next_attempt_at,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker holds the row.
    Contended,
    /// Already claimed, terminal, or not yet due.
    NotClaimable(DeliveryStatus),
    NotFound,
}

/// Tally of one `process_queue` sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Orphaned claims resolved before the scan.
    pub recovered: usize,
    /// Due deliveries returned by the scan.
    pub scanned: usize,
    /// Deliveries this sweep moved to QUEUED and sent.
    pub claimed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SweepReport {
    fn tally(&mut self, id: DeliveryId, result: Result<ProcessOutcome, EngineError>) {
        match result {
            Ok(ProcessOutcome::Delivered { .. }) => {
                self.claimed += 1;
                self.delivered += 1;
            }
            Ok(ProcessOutcome::Retrying { .. }) => {
                self.claimed += 1;
                self.retried += 1;
            }
            Ok(ProcessOutcome::Failed { .. }) => {
                self.claimed += 1;
                self.failed += 1;
            }
            Ok(ProcessOutcome::Cancelled(_)) => self.cancelled += 1,
            Ok(ProcessOutcome::Skipped(_)) => self.skipped += 1,
            Err(e) => {
                if matches!(e, EngineError::RecordOutcome { .. }) {
                    self.claimed += 1;
                }
                self.errors += 1;
                warn!(delivery_id = %id, error = %e, "delivery processing failed");
            }
        }
    }
}

impl WebhookEngine {
    /// Sweep the queue once: recover stale claims, then claim and send up to
    /// `batch_size` due deliveries with at most `max_concurrent_sends` in
    /// flight.
    ///
    /// Per-delivery failures are logged and counted in the report. Only a
    /// failure of the due-list query fails the sweep.
    #[instrument(skip(self))]
    pub async fn process_queue(&self, batch_size: usize) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();

        match self.recover_stale_claims(batch_size).await {
            Ok(recovered) => report.recovered = recovered,
            Err(e) => {
                EngineMetrics::incr(&self.metrics.errors);
                report.errors += 1;
                error!(error = %e, "stale claim recovery failed");
            }
        }

        let ids = self
            .deliveries
            .list_due_deliveries(Utc::now(), batch_size)
            .await?;
        report.scanned = ids.len();

        let results: Vec<(DeliveryId, Result<ProcessOutcome, EngineError>)> = stream::iter(ids)
            .map(|id| async move { (id, self.process_delivery(id).await) })
            .buffer_unordered(self.config.max_concurrent_sends)
            .collect()
            .await;

        for (id, result) in results {
            report.tally(id, result);
        }

        if report.scanned > 0 || report.recovered > 0 {
            info!(
                scanned = report.scanned,
                claimed = report.claimed,
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed,
                cancelled = report.cancelled,
                skipped = report.skipped,
                errors = report.errors,
                recovered = report.recovered,
                "queue sweep complete"
            );
        }
        Ok(report)
    }

    /// [`process_queue`](Self::process_queue) with the configured batch size.
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        self.process_queue(self.config.batch_size).await
    }

    /// Claim one delivery, send it, and record the outcome.
    ///
    /// The claim commits before the sender is invoked; the outcome is only
    /// recorded while the delivery is still QUEUED under that claim.
    #[instrument(skip_all, fields(delivery_id = %id))]
    pub async fn process_delivery(&self, id: DeliveryId) -> Result<ProcessOutcome, EngineError> {
        let result = self.claim_and_send(id).await;
        if result.is_err() {
            EngineMetrics::incr(&self.metrics.errors);
        }
        result
    }

    async fn claim_and_send(&self, id: DeliveryId) -> Result<ProcessOutcome, EngineError> {
        match self.deliveries.claim_delivery(id, Utc::now()).await? {
            ClaimOutcome::Claimed { delivery, endpoint } => {
                EngineMetrics::incr(&self.metrics.claimed);
                self.attempt(&delivery, &endpoint).await
            }
            ClaimOutcome::Cancelled { delivery, reason } => {
                EngineMetrics::incr(&self.metrics.cancelled);
                info!(
                    endpoint_id = %delivery.endpoint_id,
                    event_type = %delivery.event_type,
                    reason = %reason,
                    "delivery cancelled"
                );
                Ok(ProcessOutcome::Cancelled(reason))
            }
            ClaimOutcome::NotClaimable { status } => {
                debug!(status = %status, "delivery not claimable");
                Ok(ProcessOutcome::Skipped(SkipReason::NotClaimable(status)))
            }
            ClaimOutcome::Contended => {
                EngineMetrics::incr(&self.metrics.contended);
                debug!("delivery locked by another worker");
                Ok(ProcessOutcome::Skipped(SkipReason::Contended))
            }
            ClaimOutcome::NotFound => Ok(ProcessOutcome::Skipped(SkipReason::NotFound)),
        }
    }

    async fn attempt(
        &self,
        delivery: &WebhookDelivery,
        endpoint: &WebhookEndpoint,
    ) -> Result<ProcessOutcome, EngineError> {
        let claimed_at = delivery.claimed_at.ok_or_else(|| {
            StoreError::Backend(format!("claimed delivery {} has no claim time", delivery.id))
        })?;

        let request = OutboundRequest {
            delivery_id: delivery.id,
            event_type: delivery.event_type.clone(),
            url: endpoint.url.clone(),
            payload: delivery.payload.clone(),
            secret: endpoint.secret.clone(),
            timestamp: Utc::now().timestamp(),
        };

        let timeout = self.config.send_timeout;
        let result = tokio::time::timeout(timeout, self.sender.send(&request))
            .await
            .unwrap_or(Err(SendError::Timeout(timeout)));
        let outcome = outcome_of(&result);

        let update = self.record(delivery, claimed_at, &outcome).await?;
        let processed = ProcessOutcome::from_update(&update);
        match &processed {
            ProcessOutcome::Delivered { status_code } => {
                EngineMetrics::incr(&self.metrics.delivered);
                info!(
                    endpoint_id = %delivery.endpoint_id,
                    status_code,
                    attempts = update.attempts,
                    "webhook delivered"
                );
            }
            ProcessOutcome::Failed { attempts } => {
                EngineMetrics::incr(&self.metrics.failed);
                warn!(
                    endpoint_id = %delivery.endpoint_id,
                    attempts,
                    error = update.last_error.as_deref().unwrap_or_default(),
                    "webhook delivery failed permanently"
                );
            }
            _ => {
                EngineMetrics::incr(&self.metrics.retried);
                info!(
                    endpoint_id = %delivery.endpoint_id,
                    attempts = update.attempts,
                    next_attempt_at = ?update.next_attempt_at,
                    error = update.last_error.as_deref().unwrap_or_default(),
                    "webhook delivery will be retried"
                );
            }
        }
        Ok(processed)
    }

    /// Resolve `outcome` against the retry policy and write it under the
    /// claim identified by `claimed_at`.
    async fn record(
        &self,
        delivery: &WebhookDelivery,
        claimed_at: DateTime<Utc>,
        outcome: &DeliveryOutcome,
    ) -> Result<OutcomeUpdate, EngineError> {
        let update = delivery.resolve_outcome(outcome, &self.config.retry_policy, Utc::now())?;
        self.deliveries
            .record_outcome(delivery.id, claimed_at, &update)
            .await
            .map_err(|source| EngineError::RecordOutcome {
                id: delivery.id,
                source,
            })?;
        Ok(update)
    }

    /// Treat QUEUED deliveries claimed longer than `stale_claim_after` ago as
    /// failed attempts. Returns how many were resolved.
    ///
    /// A claim that gets resolved by its own worker in the meantime is left
    /// alone.
    #[instrument(skip(self))]
    pub async fn recover_stale_claims(&self, limit: usize) -> Result<usize, EngineError> {
        let now = Utc::now();
        let stale_after = chrono::Duration::from_std(self.config.stale_claim_after)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        let cutoff = now
            .checked_sub_signed(stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let stale = self.deliveries.list_stale_claims(cutoff, limit).await?;
        let outcome = DeliveryOutcome::failed(STALE_CLAIM_ERROR);
        let mut recovered = 0;

        for delivery in stale {
            let Some(claimed_at) = delivery.claimed_at else {
                continue;
            };
            match self.record(&delivery, claimed_at, &outcome).await {
                Ok(update) => {
                    recovered += 1;
                    EngineMetrics::incr(&self.metrics.stale_recovered);
                    warn!(
                        delivery_id = %delivery.id,
                        claimed_at = %claimed_at,
                        status = %update.status,
                        attempts = update.attempts,
                        "recovered stale claim"
                    );
                }
                Err(EngineError::RecordOutcome {
                    source: StoreError::NotQueued { .. } | StoreError::ClaimSuperseded { .. },
                    ..
                }) => {
                    debug!(delivery_id = %delivery.id, "stale claim resolved concurrently");
                }
                Err(e) => {
                    EngineMetrics::incr(&self.metrics.errors);
                    error!(delivery_id = %delivery.id, error = %e, "failed to recover stale claim");
                }
            }
        }
        Ok(recovered)
    }
}
