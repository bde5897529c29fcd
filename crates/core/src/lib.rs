//! Core domain types for the Hookwire webhook delivery engine: endpoints,
//! deliveries and their state machine, event patterns, and retry policy.

pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod pattern;
pub mod retry;
pub mod types;

pub use delivery::{
    DeliveryFilter, DeliveryOutcome, DeliveryStats, DeliveryStatus, NewDelivery, OutcomeUpdate,
    UnknownStatus, WebhookDelivery,
};
pub use endpoint::{NewEndpoint, WebhookEndpoint, validate_url};
pub use error::{TransitionError, ValidationError};
pub use pattern::{EventPattern, matches_any, validate_event_type};
pub use retry::{Backoff, DEFAULT_MAX_ATTEMPTS, DEFAULT_SCHEDULE, RetryPolicy};
pub use types::{DeliveryId, EndpointId, TenantId, WebhookSecret};
