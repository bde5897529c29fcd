use std::sync::Arc;

use hookwire_store::{DeliveryStore, EndpointRegistry};
use hookwire_store_memory::MemoryStore;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::ServerError;

/// Endpoint registry and delivery store handles backed by one backend.
pub type StoreHandles = (Arc<dyn EndpointRegistry>, Arc<dyn DeliveryStore>);

/// Create the configured backend. The `postgres` backend runs its
/// migrations on connect.
pub async fn create_store(config: &StoreConfig) -> Result<StoreHandles, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            warn!("memory backend selected, deliveries do not survive a restart");
            Ok(share(Arc::new(MemoryStore::new())))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("postgres backend requires store.url".into())
            })?;
            let mut pg_config = hookwire_store_postgres::PostgresConfig {
                url: url.to_owned(),
                ssl_mode: config.ssl_mode.clone(),
                ssl_root_cert: config.ssl_root_cert.clone(),
                ..hookwire_store_postgres::PostgresConfig::default()
            };
            if let Some(schema) = &config.schema {
                pg_config.schema.clone_from(schema);
            }
            if let Some(prefix) = &config.table_prefix {
                pg_config.table_prefix.clone_from(prefix);
            }
            if let Some(pool_size) = config.pool_size {
                pg_config.pool_size = pool_size;
            }
            let store = Arc::new(hookwire_store_postgres::PostgresStore::new(pg_config).await?);
            info!(schema = ?config.schema, "postgres store connected");
            Ok(share(store))
        }
        #[cfg(not(feature = "postgres"))]
        "postgres" => Err(ServerError::Config(
            "postgres backend requires the `postgres` feature".into(),
        )),
        other => Err(ServerError::Config(format!(
            "unknown store backend: {other}"
        ))),
    }
}

fn share<S: EndpointRegistry + DeliveryStore + 'static>(store: Arc<S>) -> StoreHandles {
    let registry: Arc<dyn EndpointRegistry> = Arc::<S>::clone(&store);
    let deliveries: Arc<dyn DeliveryStore> = store;
    (registry, deliveries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_shares_one_store() {
        let config = StoreConfig {
            backend: "memory".into(),
            ..StoreConfig::default()
        };
        let (registry, deliveries) = create_store(&config).await.unwrap();
        let tenant = hookwire_core::TenantId::new("t");
        assert!(registry.list_endpoints(&tenant).await.unwrap().is_empty());
        let stats = deliveries
            .delivery_stats(hookwire_core::EndpointId::generate())
            .await
            .unwrap();
        assert_eq!(stats.total, 0);
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = StoreConfig {
            backend: "redis".into(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(ServerError::Config(_))
        ));
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn postgres_requires_url() {
        let config = StoreConfig {
            backend: "postgres".into(),
            ..StoreConfig::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(ServerError::Config(_))
        ));
    }
}
