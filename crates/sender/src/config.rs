use std::time::Duration;

/// Configuration for [`HttpSender`](crate::HttpSender).
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Upper bound on one request, connect to last byte.
    pub timeout: Duration,
    /// Timeout for establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Maximum number of response-body bytes kept for error messages.
    pub max_error_body: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("hookwire/{}", env!("CARGO_PKG_VERSION")),
            max_error_body: 512,
        }
    }
}

impl SenderConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_max_error_body(mut self, bytes: usize) -> Self {
        self.max_error_body = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SenderConfig::default();
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert!(cfg.user_agent.starts_with("hookwire/"));
        assert_eq!(cfg.max_error_body, 512);
    }

    #[test]
    fn builder() {
        let cfg = SenderConfig::default()
            .with_timeout(Duration::from_secs(3))
            .with_user_agent("custom/1.0")
            .with_max_error_body(16);
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.user_agent, "custom/1.0");
        assert_eq!(cfg.max_error_body, 16);
    }
}
