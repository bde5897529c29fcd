use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::pattern::{EventPattern, matches_any};
use crate::types::{EndpointId, TenantId, WebhookSecret};

/// A tenant-configured HTTP destination subscribed to one or more event
/// patterns.
#[derive(Debug, Clone)]
pub struct WebhookEndpoint {
    pub id: EndpointId,
    pub tenant_id: TenantId,
    pub url: String,
    pub secret: WebhookSecret,
    pub active: bool,
    pub event_patterns: Vec<EventPattern>,
    pub created_at: DateTime<Utc>,
    /// Set when the endpoint is deactivated. Kept for audit history only.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl WebhookEndpoint {
    /// Whether this endpoint is subscribed to `event_type`, regardless of
    /// whether it is active.
    #[must_use]
    pub fn is_subscribed_to(&self, event_type: &str) -> bool {
        matches_any(&self.event_patterns, event_type)
    }

    /// Whether a delivery of `event_type` to this endpoint may be attempted.
    #[must_use]
    pub fn accepts(&self, event_type: &str) -> bool {
        self.active && self.is_subscribed_to(event_type)
    }
}

/// Request to register a new endpoint.
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub tenant_id: TenantId,
    pub url: String,
    pub event_patterns: Vec<String>,
}

impl NewEndpoint {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        url: impl Into<String>,
        event_patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            url: url.into(),
            event_patterns: event_patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the request and return the parsed pattern set.
    pub fn validate(&self) -> Result<Vec<EventPattern>, ValidationError> {
        if self.tenant_id.is_empty() {
            return Err(ValidationError::EmptyTenant);
        }
        validate_url(&self.url)?;
        if self.event_patterns.is_empty() {
            return Err(ValidationError::NoPatterns);
        }
        let mut patterns: Vec<EventPattern> = Vec::with_capacity(self.event_patterns.len());
        for raw in &self.event_patterns {
            let pattern = EventPattern::parse(raw)?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        Ok(patterns)
    }

    /// Validate and build the endpoint with a freshly issued secret.
    pub fn into_endpoint(
        self,
        secret: WebhookSecret,
        now: DateTime<Utc>,
    ) -> Result<WebhookEndpoint, ValidationError> {
        let event_patterns = self.validate()?;
        Ok(WebhookEndpoint {
            id: EndpointId::generate(),
            tenant_id: self.tenant_id,
            url: self.url,
            secret,
            active: true,
            event_patterns,
            created_at: now,
            revoked_at: None,
        })
    }
}

/// Check that `url` is an absolute `http`/`https` URL with a host.
///
/// The raw string is stored and sent as given, so leading or embedded
/// whitespace is rejected even where the URL parser would strip it.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidUrl(url.to_owned());

    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }
    let parsed = url::Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> WebhookSecret {
        WebhookSecret::new("s".repeat(64))
    }

    #[test]
    fn valid_endpoint_builds() {
        let ep = NewEndpoint::new("t1", "https://example.com/hooks", ["bio.*", "order.paid"])
            .into_endpoint(secret(), Utc::now())
            .unwrap();
        assert!(ep.active);
        assert!(ep.revoked_at.is_none());
        assert_eq!(ep.event_patterns.len(), 2);
        assert!(ep.accepts("bio.created"));
        assert!(!ep.accepts("order.refunded"));
    }

    #[test]
    fn duplicate_patterns_are_collapsed() {
        let patterns = NewEndpoint::new("t1", "https://example.com", ["bio.*", "bio.*"])
            .validate()
            .unwrap();
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn inactive_endpoint_accepts_nothing() {
        let mut ep = NewEndpoint::new("t1", "https://example.com", ["*"])
            .into_endpoint(secret(), Utc::now())
            .unwrap();
        ep.active = false;
        assert!(ep.is_subscribed_to("bio.created"));
        assert!(!ep.accepts("bio.created"));
    }

    #[test]
    fn url_validation() {
        for ok in [
            "https://example.com",
            "http://localhost:8080/hook",
            "https://user:pw@hooks.example.com/a?b=c",
            "http://[::1]:9000/x",
        ] {
            assert!(validate_url(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            "",
            "example.com",
            "ftp://example.com",
            "https://",
            "https://exa mple.com",
            "http://:8080",
            "http://example.com:99999/hook",
            "http://exa<mple.com/hook",
            "https://host:abc/x",
            " https://example.com",
        ] {
            assert!(validate_url(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_missing_patterns_and_tenant() {
        let empty: [&str; 0] = [];
        let err = NewEndpoint::new("t1", "https://example.com", empty)
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::NoPatterns);

        let err = NewEndpoint::new("", "https://example.com", ["*"])
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyTenant);
    }
}
