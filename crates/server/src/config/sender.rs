use std::time::Duration;

use hookwire_sender::SenderConfig;
use serde::Deserialize;

/// Outbound HTTP client settings.
#[derive(Debug, Default, Deserialize)]
pub struct SenderSection {
    /// TCP connect timeout in seconds. Defaults to 5.
    pub connect_timeout_seconds: Option<u64>,
    /// `User-Agent` header value. Defaults to `hookwire/<version>`.
    pub user_agent: Option<String>,
    /// Bytes of an error response body kept in `last_error`. Defaults to 512.
    pub max_error_body: Option<usize>,
}

impl SenderSection {
    /// Build the sender configuration. The request timeout always follows
    /// the engine's send timeout.
    pub fn to_sender_config(&self, send_timeout: Duration) -> SenderConfig {
        let mut config = SenderConfig::default().with_timeout(send_timeout);
        if let Some(secs) = self.connect_timeout_seconds {
            config = config.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        if let Some(bytes) = self.max_error_body {
            config = config.with_max_error_body(bytes);
        }
        config
    }
}
