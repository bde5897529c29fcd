//! Webhook delivery orchestration.
//!
//! [`WebhookEngine`] ties the endpoint registry, the delivery store, and the
//! sender together: it dispatches events into per-endpoint deliveries,
//! claims due deliveries, sends them, and records each outcome against the
//! delivery state machine. [`QueueWorker`] drives periodic sweeps.

pub mod builder;
mod claimer;
pub mod config;
mod dispatcher;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod worker;

pub use builder::WebhookEngineBuilder;
pub use claimer::{ProcessOutcome, STALE_CLAIM_ERROR, SkipReason, SweepReport};
pub use config::EngineConfig;
pub use engine::WebhookEngine;
pub use error::EngineError;
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use worker::{QueueWorker, WorkerConfig};
