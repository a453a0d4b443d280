//! Environment-based configuration types for the tenauth server runtime.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Bridge session cookie lifetime (kept short to bound replay of a stale session)
#[derive(Clone)]
pub struct SessionTtl(chrono::Duration);

/// Bearer access token lifetime issued by /api/auth/login
#[derive(Clone)]
pub struct AccessTokenExpiration(chrono::Duration);

/// Allowed CORS origins, semicolon separated
#[derive(Clone, Default)]
pub struct CorsOrigins(Vec<String>);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    /// External base URL of this deployment, e.g. `https://auth.example.com`
    pub external_base: String,
    /// Login page the authorize endpoint redirects unauthenticated callers to
    pub login_url: String,
    /// Default destination after logout when the caller supplies none
    pub post_logout_redirect: String,
    pub session_ttl: SessionTtl,
    pub access_token_expiration: AccessTokenExpiration,
    pub cors_origins: CorsOrigins,
    pub storage_backend: String,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let external_base = require_env("EXTERNAL_BASE")?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let login_url = default_env("LOGIN_URL", "/login");
        let post_logout_redirect = default_env("POST_LOGOUT_REDIRECT", "/");
        let session_ttl: SessionTtl = default_env("SESSION_TTL", "10m").try_into()?;
        let access_token_expiration: AccessTokenExpiration =
            default_env("ACCESS_TOKEN_EXPIRATION", "1d").try_into()?;
        let cors_origins: CorsOrigins = optional_env("CORS_ORIGINS").try_into()?;
        let storage_backend = default_env("STORAGE_BACKEND", "memory");

        Ok(Self {
            version: version()?,
            http_port,
            external_base,
            login_url,
            post_logout_redirect,
            session_ttl,
            access_token_expiration,
            cors_origins,
            storage_backend,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

fn parse_chrono_duration(value: &str) -> Result<chrono::Duration, ConfigError> {
    let std_duration: Duration = duration_str::parse(value)
        .map_err(|err| ConfigError::DurationParsingFailed(value.to_string(), err.to_string()))?;
    chrono::Duration::from_std(std_duration)
        .map_err(|err| ConfigError::DurationParsingFailed(value.to_string(), err.to_string()))
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for SessionTtl {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_chrono_duration(&value)?))
    }
}

impl AsRef<chrono::Duration> for SessionTtl {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for AccessTokenExpiration {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(parse_chrono_duration(&value)?))
    }
}

impl AsRef<chrono::Duration> for AccessTokenExpiration {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<Option<String>> for CorsOrigins {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
        ))
    }
}

impl AsRef<Vec<String>> for CorsOrigins {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_parses_minutes() {
        let ttl: SessionTtl = "10m".to_string().try_into().unwrap();
        assert_eq!(*ttl.as_ref(), chrono::Duration::minutes(10));
    }

    #[test]
    fn test_http_port_rejects_garbage() {
        let result: Result<HttpPort, _> = "not-a-port".to_string().try_into();
        assert!(result.is_err());
    }

    #[test]
    fn test_cors_origins_split() {
        let origins: CorsOrigins = Some("http://localhost:3001;https://admin.example.com".to_string())
            .try_into()
            .unwrap();
        assert_eq!(origins.as_ref().len(), 2);
    }
}
