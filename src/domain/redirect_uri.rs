//! Redirect URI value object with exact-match semantics.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::DomainError;

/// Validated absolute redirect URI.
///
/// HTTPS is required except for localhost hosts. Matching is exact string
/// equality: no wildcard, prefix, or trailing-slash normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RedirectUri(String);

impl RedirectUri {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let parsed = Url::parse(raw)
            .map_err(|e| DomainError::InvalidRedirectUri(format!("'{}': {}", raw, e)))?;

        match parsed.scheme() {
            "https" => {}
            "http" => {
                let host = parsed.host_str().ok_or_else(|| {
                    DomainError::InvalidRedirectUri("missing host".to_string())
                })?;
                if host != "localhost" && host != "127.0.0.1" {
                    return Err(DomainError::InvalidRedirectUri(
                        "HTTP redirect URIs only allowed for localhost".to_string(),
                    ));
                }
            }
            other => {
                return Err(DomainError::InvalidRedirectUri(format!(
                    "unsupported scheme '{}'",
                    other
                )));
            }
        }

        if parsed.fragment().is_some() {
            return Err(DomainError::InvalidRedirectUri(
                "must not contain a fragment".to_string(),
            ));
        }

        // Stored exactly as supplied; Url::parse round-trips can normalize,
        // and exact-match comparison must see the registered bytes.
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact-match check against an incoming redirect_uri parameter.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl TryFrom<String> for RedirectUri {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RedirectUri::new(&value)
    }
}

impl From<RedirectUri> for String {
    fn from(value: RedirectUri) -> Self {
        value.0
    }
}

impl std::fmt::Display for RedirectUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_required_for_public_hosts() {
        assert!(RedirectUri::new("https://app.example.com/cb").is_ok());
        assert!(RedirectUri::new("http://app.example.com/cb").is_err());
    }

    #[test]
    fn test_localhost_exempt_from_https() {
        assert!(RedirectUri::new("http://localhost:5173/cb").is_ok());
        assert!(RedirectUri::new("http://127.0.0.1:8080/cb").is_ok());
        assert!(RedirectUri::new("https://localhost:5173/cb").is_ok());
    }

    #[test]
    fn test_relative_uri_rejected() {
        assert!(RedirectUri::new("/callback").is_err());
    }

    #[test]
    fn test_fragment_rejected() {
        assert!(RedirectUri::new("https://app.example.com/cb#frag").is_err());
    }

    #[test]
    fn test_exact_match_only() {
        let uri = RedirectUri::new("https://app.example.com/cb").unwrap();
        assert!(uri.matches("https://app.example.com/cb"));
        assert!(!uri.matches("https://app.example.com/cb/"));
        assert!(!uri.matches("http://app.example.com/cb"));
        assert!(!uri.matches("https://app.example.com/CB"));
    }
}
