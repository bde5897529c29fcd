pub mod config;
pub mod migrations;
mod rows;
pub mod store;

pub use config::PostgresConfig;
pub use migrations::run_migrations;
pub use store::PostgresStore;
