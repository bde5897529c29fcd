use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::{debug, instrument, warn};

use hookwire_signer::{SIGNATURE_HEADER, SignedHeaders, TIMESTAMP_HEADER};

use crate::config::SenderConfig;
use crate::error::SendError;
use crate::request::{DELIVERY_ID_HEADER, EVENT_HEADER, OutboundRequest, SendResponse, Sender};

/// [`Sender`] that POSTs signed payloads with `reqwest`.
///
/// Redirects are never followed: a 3xx response is reported as-is and
/// counts as a failed attempt.
pub struct HttpSender {
    config: SenderConfig,
    client: Client,
}

impl HttpSender {
    /// Create a sender with its own connection pool.
    pub fn new(config: SenderConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SendError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Create a sender with a custom HTTP client.
    ///
    /// The client is used as given; its own timeout and redirect settings
    /// apply.
    pub fn with_client(config: SenderConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn truncate_body(&self, mut body: String) -> String {
        if body.len() > self.config.max_error_body {
            let mut end = self.config.max_error_body;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        body
    }

    /// Read at most `max_error_body` bytes of a failed response. The rest
    /// of the body is never pulled off the wire.
    async fn read_error_body(&self, mut response: reqwest::Response) -> String {
        let limit = self.config.max_error_body;
        let mut buf = Vec::new();
        while buf.len() < limit {
            match response.chunk().await {
                Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                Ok(None) => break,
                // A body that cannot be read does not change the outcome.
                Err(e) => {
                    debug!(error = %e, "failed to read error body");
                    break;
                }
            }
        }
        buf.truncate(limit);
        self.truncate_body(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[async_trait]
impl Sender for HttpSender {
    #[instrument(
        skip(self, request),
        fields(delivery_id = %request.delivery_id, event_type = %request.event_type)
    )]
    async fn send(&self, request: &OutboundRequest) -> Result<SendResponse, SendError> {
        let signed = SignedHeaders::new(
            request.payload.as_bytes(),
            request.secret.expose(),
            request.timestamp,
        )
        .map_err(|e| SendError::Signing(e.to_string()))?;

        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, hookwire_signer::CONTENT_TYPE)
            .header(USER_AGENT, &self.config.user_agent)
            .header(SIGNATURE_HEADER, &signed.signature)
            .header(TIMESTAMP_HEADER, &signed.timestamp)
            .header(DELIVERY_ID_HEADER, request.delivery_id.to_string())
            .header(EVENT_HEADER, &request.event_type)
            .body(request.payload.clone())
            .send()
            .await
            .map_err(|e| {
                let err = SendError::from_reqwest(&e, self.config.timeout);
                warn!(error = %err, "webhook request failed");
                err
            })?;

        let status = response.status().as_u16();
        let body = if response.status().is_success() {
            String::new()
        } else {
            self.read_error_body(response).await
        };

        debug!(status, "webhook endpoint responded");
        Ok(SendResponse { status, body })
    }
}
