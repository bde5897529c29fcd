use sqlx::postgres::{PgConnectOptions, PgSslMode};

use hookwire_store::StoreError;

/// Connection and naming settings for [`PostgresStore`](crate::PostgresStore).
///
/// Both tables live in `schema` and share `table_prefix`, so several
/// deployments can share one database.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    /// Upper bound on pooled connections. Each in-flight claim holds one.
    pub pool_size: u32,
    pub schema: String,
    pub table_prefix: String,
    /// Any libpq `sslmode` value. `None` keeps whatever the URL says.
    pub ssl_mode: Option<String>,
    /// CA bundle used by `verify-ca` and `verify-full`.
    pub ssl_root_cert: Option<String>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/hookwire".to_owned(),
            pool_size: 10,
            schema: "public".to_owned(),
            table_prefix: "hookwire_".to_owned(),
            ssl_mode: None,
            ssl_root_cert: None,
        }
    }
}

impl PostgresConfig {
    pub(crate) fn endpoints_table(&self) -> String {
        self.table("endpoints")
    }

    pub(crate) fn deliveries_table(&self) -> String {
        self.table("deliveries")
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}{name}", self.schema, self.table_prefix)
    }

    /// Parse the URL and layer the TLS overrides on top.
    pub(crate) fn connect_options(&self) -> Result<PgConnectOptions, StoreError> {
        let connection = |e: sqlx::Error| StoreError::Connection(e.to_string());
        let mut options: PgConnectOptions = self.url.parse().map_err(connection)?;

        if let Some(mode) = self.ssl_mode.as_deref() {
            let mode: PgSslMode = mode
                .parse()
                .map_err(|_| StoreError::Connection(format!("unknown ssl_mode: {mode}")))?;
            options = options.ssl_mode(mode);
        }
        if let Some(path) = self.ssl_root_cert.as_deref() {
            options = options.ssl_root_cert(path);
        }
        Ok(options)
    }
}
