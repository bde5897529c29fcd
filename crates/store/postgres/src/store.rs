use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use hookwire_core::{
    DeliveryFilter, DeliveryId, DeliveryStats, DeliveryStatus, EndpointId, NewDelivery,
    OutcomeUpdate, TenantId, WebhookDelivery, WebhookEndpoint,
};
use hookwire_store::{
    ClaimOutcome, DeliveryStore, EndpointRegistry, StoreError, cancel_reason,
};

use crate::config::PostgresConfig;
use crate::migrations;
use crate::rows::{DeliveryRow, EndpointRow, into_deliveries, into_endpoints};

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// PostgreSQL-backed [`DeliveryStore`] and [`EndpointRegistry`].
///
/// Claims lock the delivery row with `SELECT ... FOR UPDATE SKIP LOCKED`
/// inside a short transaction that commits the status change before the
/// caller sends anything.
pub struct PostgresStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresStore {
    /// Open a pool of at most `config.pool_size` connections and migrate.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connection`] for a bad URL, TLS setting or unreachable
    /// server; [`StoreError::Backend`] when a migration statement fails.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Wrap a pool the caller already owns. Migrations still run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration statement fails.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Claims pass their open transaction here. A second pooled connection
    /// per claim starves the pool once claims reach `pool_size`.
    async fn fetch_endpoint<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<WebhookEndpoint>, StoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.config.endpoints_table());
        sqlx::query_as::<_, EndpointRow>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
            .map_err(backend)?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Explain why a conditional outcome update matched no row.
    async fn outcome_rejection(&self, id: DeliveryId) -> Result<StoreError, StoreError> {
        let sql = format!(
            "SELECT status FROM {} WHERE id = $1",
            self.config.deliveries_table()
        );
        let status: Option<String> = sqlx::query_scalar(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        let Some(status) = status else {
            return Ok(StoreError::NotFound(format!("delivery {id}")));
        };
        let status: DeliveryStatus = status
            .parse()
            .map_err(|e: hookwire_core::UnknownStatus| StoreError::Serialization(e.to_string()))?;
        if status == DeliveryStatus::Queued {
            Ok(StoreError::ClaimSuperseded { id })
        } else {
            Ok(StoreError::NotQueued { id, status })
        }
    }
}

#[async_trait]
impl EndpointRegistry for PostgresStore {
    async fn insert_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, url, secret, active, event_patterns, created_at, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
            self.config.endpoints_table()
        );
        let patterns: Vec<String> = endpoint
            .event_patterns
            .iter()
            .map(ToString::to_string)
            .collect();

        let result = sqlx::query(&sql)
            .bind(endpoint.id.as_uuid())
            .bind(endpoint.tenant_id.as_str())
            .bind(&endpoint.url)
            .bind(endpoint.secret.expose())
            .bind(endpoint.active)
            .bind(&patterns)
            .bind(endpoint.created_at)
            .bind(endpoint.revoked_at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "endpoint {} already exists",
                endpoint.id
            )));
        }
        Ok(())
    }

    async fn get_endpoint(&self, id: EndpointId) -> Result<Option<WebhookEndpoint>, StoreError> {
        self.fetch_endpoint(&self.pool, id.as_uuid()).await
    }

    async fn list_endpoints(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 ORDER BY created_at ASC, id ASC",
            self.config.endpoints_table()
        );
        let rows = sqlx::query_as::<_, EndpointRow>(&sql)
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_endpoints(rows)
    }

    async fn deactivate_endpoint(
        &self,
        id: EndpointId,
        now: DateTime<Utc>,
    ) -> Result<WebhookEndpoint, StoreError> {
        let sql = format!(
            "UPDATE {} SET active = FALSE, revoked_at = COALESCE(revoked_at, $2) \
             WHERE id = $1 RETURNING *",
            self.config.endpoints_table()
        );
        sqlx::query_as::<_, EndpointRow>(&sql)
            .bind(id.as_uuid())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::NotFound(format!("endpoint {id}")))?
            .try_into()
    }

    async fn resolve_subscribers(
        &self,
        tenant_id: &TenantId,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE tenant_id = $1 AND active ORDER BY created_at ASC, id ASC",
            self.config.endpoints_table()
        );
        let rows = sqlx::query_as::<_, EndpointRow>(&sql)
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        // Patterns are matched here rather than in SQL so both backends
        // share one matching implementation.
        Ok(into_endpoints(rows)?
            .into_iter()
            .filter(|e| e.accepts(event_type))
            .collect())
    }
}

#[async_trait]
impl DeliveryStore for PostgresStore {
    async fn create_deliveries(
        &self,
        deliveries: Vec<NewDelivery>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        if deliveries.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "INSERT INTO {} (id, endpoint_id, tenant_id, event_type, payload, status, attempts, \
             next_attempt_at, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.config.deliveries_table()
        );

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut ids = Vec::with_capacity(deliveries.len());
        for new in deliveries {
            let delivery = new.into_delivery(now);
            sqlx::query(&sql)
                .bind(delivery.id.as_uuid())
                .bind(delivery.endpoint_id.as_uuid())
                .bind(delivery.tenant_id.as_str())
                .bind(&delivery.event_type)
                .bind(&delivery.payload)
                .bind(delivery.status.as_str())
                .bind(0_i32)
                .bind(delivery.next_attempt_at)
                .bind(delivery.created_at)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            ids.push(delivery.id);
        }
        tx.commit().await.map_err(backend)?;
        Ok(ids)
    }

    async fn list_due_deliveries(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let sql = format!(
            "SELECT id FROM {} \
             WHERE status IN ('pending', 'retrying') AND next_attempt_at <= $1 \
             ORDER BY next_attempt_at ASC, id ASC LIMIT $2",
            self.config.deliveries_table()
        );
        let ids: Vec<Uuid> = sqlx::query_scalar(&sql)
            .bind(now)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(ids.into_iter().map(DeliveryId::from_uuid).collect())
    }

    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let table = self.config.deliveries_table();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let lock_sql = format!("SELECT * FROM {table} WHERE id = $1 FOR UPDATE SKIP LOCKED");
        let locked = sqlx::query_as::<_, DeliveryRow>(&lock_sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;

        let Some(row) = locked else {
            tx.rollback().await.map_err(backend)?;
            let exists_sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
            let exists: bool = sqlx::query_scalar(&exists_sql)
                .bind(id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
            if exists {
                debug!(delivery_id = %id, "row locked by another worker, skipping");
                return Ok(ClaimOutcome::Contended);
            }
            return Ok(ClaimOutcome::NotFound);
        };

        let delivery = WebhookDelivery::try_from(row)?;
        if !delivery.is_due(now) {
            tx.rollback().await.map_err(backend)?;
            return Ok(ClaimOutcome::NotClaimable {
                status: delivery.status,
            });
        }

        let endpoint = self
            .fetch_endpoint(&mut *tx, delivery.endpoint_id.as_uuid())
            .await?;

        if let Some(reason) = cancel_reason(endpoint.as_ref(), &delivery) {
            delivery
                .status
                .check_transition(DeliveryStatus::Cancelled)?;
            let cancel_sql = format!(
                "UPDATE {table} SET status = $2, next_attempt_at = NULL, last_error = $3, \
                 processed_at = $4 WHERE id = $1 RETURNING *"
            );
            let row = sqlx::query_as::<_, DeliveryRow>(&cancel_sql)
                .bind(id.as_uuid())
                .bind(DeliveryStatus::Cancelled.as_str())
                .bind(reason.as_str())
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
            tx.commit().await.map_err(backend)?;
            return Ok(ClaimOutcome::Cancelled {
                delivery: row.try_into()?,
                reason,
            });
        }
        let Some(endpoint) = endpoint else {
            tx.rollback().await.map_err(backend)?;
            return Ok(ClaimOutcome::NotFound);
        };

        delivery.status.check_transition(DeliveryStatus::Queued)?;
        let queue_sql =
            format!("UPDATE {table} SET status = $2, claimed_at = $3 WHERE id = $1 RETURNING *");
        let row = sqlx::query_as::<_, DeliveryRow>(&queue_sql)
            .bind(id.as_uuid())
            .bind(DeliveryStatus::Queued.as_str())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)?;

        Ok(ClaimOutcome::Claimed {
            delivery: row.try_into()?,
            endpoint,
        })
    }

    async fn record_outcome(
        &self,
        id: DeliveryId,
        claimed_at: DateTime<Utc>,
        update: &OutcomeUpdate,
    ) -> Result<(), StoreError> {
        DeliveryStatus::Queued.check_transition(update.status)?;
        let attempts = i32::try_from(update.attempts)
            .map_err(|_| StoreError::Serialization(format!("attempts overflow: {}", update.attempts)))?;

        let sql = format!(
            "UPDATE {} SET status = $3, attempts = $4, next_attempt_at = $5, last_error = $6, \
             last_status_code = $7, processed_at = $8 \
             WHERE id = $1 AND status = 'queued' AND claimed_at = $2",
            self.config.deliveries_table()
        );
        let result = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(claimed_at)
            .bind(update.status.as_str())
            .bind(attempts)
            .bind(update.next_attempt_at)
            .bind(update.last_error.as_deref())
            .bind(update.last_status_code.map(i32::from))
            .bind(update.processed_at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(self.outcome_rejection(id).await?)
        }
    }

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.config.deliveries_table());
        sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;
        if filter.tenant_id.is_some() {
            conditions.push(format!("tenant_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.endpoint_id.is_some() {
            conditions.push(format!("endpoint_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT * FROM {} {where_clause} ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            self.config.deliveries_table(),
            bind_idx + 1
        );

        let mut query = sqlx::query_as::<_, DeliveryRow>(&sql);
        if let Some(tenant_id) = &filter.tenant_id {
            query = query.bind(tenant_id.as_str());
        }
        if let Some(endpoint_id) = filter.endpoint_id {
            query = query.bind(endpoint_id.as_uuid());
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .bind(limit_param(filter.limit))
            .bind(limit_param(filter.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_deliveries(rows)
    }

    async fn delivery_stats(&self, endpoint_id: EndpointId) -> Result<DeliveryStats, StoreError> {
        let sql = format!(
            "SELECT status, COUNT(*) FROM {} WHERE endpoint_id = $1 GROUP BY status",
            self.config.deliveries_table()
        );
        let counts: Vec<(String, i64)> = sqlx::query_as(&sql)
            .bind(endpoint_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        let mut stats = DeliveryStats::default();
        for (status, count) in counts {
            let status: DeliveryStatus = status.parse().map_err(
                |e: hookwire_core::UnknownStatus| StoreError::Serialization(e.to_string()),
            )?;
            stats.add(status, u64::try_from(count).unwrap_or_default());
        }
        Ok(stats)
    }

    async fn list_stale_claims(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE status = 'queued' AND claimed_at <= $1 \
             ORDER BY claimed_at ASC, id ASC LIMIT $2",
            self.config.deliveries_table()
        );
        let rows = sqlx::query_as::<_, DeliveryRow>(&sql)
            .bind(cutoff)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_deliveries(rows)
    }
}
