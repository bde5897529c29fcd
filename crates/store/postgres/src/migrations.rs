use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the endpoints and deliveries tables and
/// their indexes if they do not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let endpoints = config.endpoints_table();
    let deliveries = config.deliveries_table();
    let prefix = &config.table_prefix;

    let create_endpoints = format!(
        "CREATE TABLE IF NOT EXISTS {endpoints} (
            id UUID PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            url TEXT NOT NULL,
            secret TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            event_patterns TEXT[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            revoked_at TIMESTAMPTZ
        )"
    );

    let create_endpoints_tenant_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}endpoints_tenant_idx \
         ON {endpoints} (tenant_id, active)"
    );

    // Endpoints are never hard-deleted while deliveries reference them.
    let create_deliveries = format!(
        "CREATE TABLE IF NOT EXISTS {deliveries} (
            id UUID PRIMARY KEY,
            endpoint_id UUID NOT NULL REFERENCES {endpoints} (id),
            tenant_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            next_attempt_at TIMESTAMPTZ,
            last_error TEXT,
            last_status_code INTEGER,
            created_at TIMESTAMPTZ NOT NULL,
            claimed_at TIMESTAMPTZ,
            processed_at TIMESTAMPTZ
        )"
    );

    let create_due_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}deliveries_due_idx \
         ON {deliveries} (status, next_attempt_at)"
    );

    let create_claimed_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}deliveries_claimed_idx \
         ON {deliveries} (status, claimed_at)"
    );

    let create_endpoint_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}deliveries_endpoint_idx \
         ON {deliveries} (endpoint_id, created_at)"
    );

    let create_tenant_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}deliveries_tenant_idx \
         ON {deliveries} (tenant_id, created_at)"
    );

    for ddl in [
        &create_endpoints,
        &create_endpoints_tenant_idx,
        &create_deliveries,
        &create_due_idx,
        &create_claimed_idx,
        &create_endpoint_idx,
        &create_tenant_idx,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}
