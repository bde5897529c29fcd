//! Outbound HTTP transport for webhook deliveries.
//!
//! The [`Sender`] trait is the seam between the claim path and the network.
//! [`HttpSender`] is the production implementation over `reqwest`.

pub mod config;
pub mod error;
pub mod http;
pub mod request;

pub use config::SenderConfig;
pub use error::SendError;
pub use http::HttpSender;
pub use request::{
    DELIVERY_ID_HEADER, EVENT_HEADER, OutboundRequest, SendResponse, Sender, outcome_of,
};
