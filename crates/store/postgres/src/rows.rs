use chrono::{DateTime, Utc};
use uuid::Uuid;

use hookwire_core::{
    DeliveryId, EndpointId, EventPattern, TenantId, WebhookDelivery, WebhookEndpoint,
    WebhookSecret,
};
use hookwire_store::StoreError;

/// Row type for the endpoints table.
#[derive(sqlx::FromRow)]
pub(crate) struct EndpointRow {
    id: Uuid,
    tenant_id: String,
    url: String,
    secret: String,
    active: bool,
    event_patterns: Vec<String>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<EndpointRow> for WebhookEndpoint {
    type Error = StoreError;

    fn try_from(row: EndpointRow) -> Result<Self, Self::Error> {
        let event_patterns = row
            .event_patterns
            .iter()
            .map(|p| EventPattern::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            id: EndpointId::from_uuid(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            url: row.url,
            secret: WebhookSecret::new(row.secret),
            active: row.active,
            event_patterns,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}

/// Row type for the deliveries table.
#[derive(sqlx::FromRow)]
pub(crate) struct DeliveryRow {
    id: Uuid,
    endpoint_id: Uuid,
    tenant_id: String,
    event_type: String,
    payload: String,
    status: String,
    attempts: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_status_code: Option<i32>,
    created_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DeliveryRow> for WebhookDelivery {
    type Error = StoreError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e: hookwire_core::UnknownStatus| StoreError::Serialization(e.to_string()))?;
        let attempts = u32::try_from(row.attempts)
            .map_err(|_| StoreError::Serialization(format!("negative attempts: {}", row.attempts)))?;
        let last_status_code = row
            .last_status_code
            .map(u16::try_from)
            .transpose()
            .map_err(|e| StoreError::Serialization(format!("bad status code: {e}")))?;

        Ok(Self {
            id: DeliveryId::from_uuid(row.id),
            endpoint_id: EndpointId::from_uuid(row.endpoint_id),
            tenant_id: TenantId::new(row.tenant_id),
            event_type: row.event_type,
            payload: row.payload,
            status,
            attempts,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            last_status_code,
            created_at: row.created_at,
            claimed_at: row.claimed_at,
            processed_at: row.processed_at,
        })
    }
}

pub(crate) fn into_endpoints(rows: Vec<EndpointRow>) -> Result<Vec<WebhookEndpoint>, StoreError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

pub(crate) fn into_deliveries(rows: Vec<DeliveryRow>) -> Result<Vec<WebhookDelivery>, StoreError> {
    rows.into_iter().map(TryInto::try_into).collect()
}
