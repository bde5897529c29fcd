pub mod claim;
pub mod error;
pub mod store;
pub mod testing;

pub use claim::{CancelReason, ClaimOutcome, cancel_reason};
pub use error::StoreError;
pub use store::{DeliveryStore, EndpointRegistry, WebhookStore};
