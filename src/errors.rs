//! Standardized error types following the `error-tenauth-<domain>-<number>` format.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-tenauth-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-tenauth-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-tenauth-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-tenauth-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a URL value cannot be parsed
    #[error("error-tenauth-config-5 Failed to parse URL '{0}': {1}")]
    UrlParsingFailed(String, String),
}

/// Domain invariant violations raised by value objects and aggregates
#[derive(Debug, Error)]
pub enum DomainError {
    /// Email address is empty, too long, or malformed
    #[error("error-tenauth-domain-1 Invalid email address: {0}")]
    InvalidEmail(String),

    /// Redirect URI is not absolute, not HTTPS, or carries a fragment
    #[error("error-tenauth-domain-2 Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Client invariant violated (redirect URIs, secret presence, PKCE)
    #[error("error-tenauth-domain-3 Invalid client: {0}")]
    InvalidClient(String),

    /// Organization subdomain is malformed
    #[error("error-tenauth-domain-4 Invalid subdomain: {0}")]
    InvalidSubdomain(String),

    /// Uniqueness constraint violated (email, subdomain, client id)
    #[error("error-tenauth-domain-5 Conflict: {0}")]
    Conflict(String),

    /// Password hashing or verification failed
    #[error("error-tenauth-domain-6 Password hashing failed: {0}")]
    PasswordHash(String),

    /// Self-signup is not permitted for the resolved organization
    #[error("error-tenauth-domain-7 Registration not permitted: {0}")]
    SignupNotAllowed(String),

    /// Password fails the minimum strength requirements
    #[error("error-tenauth-domain-8 Invalid password: {0}")]
    InvalidPassword(String),

    /// Organization name is empty or otherwise malformed
    #[error("error-tenauth-domain-9 Invalid organization name: {0}")]
    InvalidOrganizationName(String),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when a lock or connection is unavailable
    #[error("error-tenauth-storage-1 Storage unavailable: {0}")]
    Unavailable(String),

    /// Error when query execution fails
    #[error("error-tenauth-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when a uniqueness constraint is violated by the backing store
    #[error("error-tenauth-storage-3 Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Error when requested resource is not found
    #[error("error-tenauth-storage-4 Not found: {0}")]
    NotFound(String),
}

/// Protocol-engine adapter errors
#[derive(Debug, Error)]
pub enum ProtocolEngineError {
    /// Engine rejected or failed a client synchronization call
    #[error("error-tenauth-engine-1 Client synchronization failed: {0}")]
    ClientSyncFailed(String),

    /// Engine rejected an authorization request
    #[error("error-tenauth-engine-2 Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Engine rejected a token exchange
    #[error("error-tenauth-engine-3 Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Access token presented to userinfo is unknown or expired
    #[error("error-tenauth-engine-4 Invalid access token: {0}")]
    InvalidToken(String),

    /// Engine-internal failure (lock poisoning, state corruption); never
    /// the caller's fault
    #[error("error-tenauth-engine-5 Engine internal error: {0}")]
    Internal(String),
}

/// Client registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Client not found, or owned by a different owner/tenant
    #[error("error-tenauth-registry-1 Client not found: {0}")]
    NotFound(String),

    /// Client id slug generation exhausted its retry budget
    #[error("error-tenauth-registry-2 Unable to allocate a unique client id for '{0}'")]
    ClientIdExhausted(String),

    /// Domain invariant violated while building the client
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Protocol-engine write failed after the domain write; the domain
    /// side has been compensated
    #[error(transparent)]
    Engine(#[from] ProtocolEngineError),
}

/// Authorization bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// returnUrl failed the same-origin /connect/authorize prefix check
    #[error("error-tenauth-bridge-1 Rejected return URL: {0}")]
    OpenRedirect(String),

    /// Target client belongs to a different organization than the caller
    #[error(
        "error-tenauth-bridge-2 Client '{client_id}' belongs to a different organization; \
         an administrator of that organization must authorize it"
    )]
    CrossTenant { client_id: String },

    /// returnUrl named a client that does not exist
    #[error("error-tenauth-bridge-3 Unknown client: {0}")]
    UnknownClient(String),

    /// Session cookie absent, expired, or invalid
    #[error("error-tenauth-bridge-4 No active session")]
    NoSession,

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Boundary error translated to a structured JSON response.
///
/// Cross-tenant and not-found collapse into the same wording for resource
/// lookups; authentication failures never reveal which check failed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    CrossTenant(String),

    #[error("{0}")]
    OpenRedirect(String),

    #[error("{0}")]
    Engine(#[from] ProtocolEngineError),

    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Domain(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::CrossTenant(_) => (StatusCode::BAD_REQUEST, "cross_tenant_client"),
            ApiError::OpenRedirect(_) => (StatusCode::BAD_REQUEST, "invalid_return_url"),
            ApiError::Engine(_) => (StatusCode::BAD_GATEWAY, "protocol_engine_failure"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound,
            StorageError::UniqueViolation(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ApiError::NotFound,
            RegistryError::Domain(e) => ApiError::Domain(e),
            RegistryError::Engine(e) => ApiError::Engine(e),
            RegistryError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::OpenRedirect(msg) => ApiError::OpenRedirect(msg),
            BridgeError::CrossTenant { .. } => ApiError::CrossTenant(err.to_string()),
            BridgeError::UnknownClient(_) => ApiError::NotFound,
            BridgeError::NoSession => ApiError::Unauthorized("No active session".to_string()),
            BridgeError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        let body = json!({
            "error": error_code,
            "error_description": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_hides_cross_tenant_distinction() {
        let absent: ApiError = StorageError::NotFound("client".to_string()).into();
        let foreign: ApiError = RegistryError::NotFound("client".to_string()).into();
        assert_eq!(absent.to_string(), foreign.to_string());
        assert_eq!(absent.status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(foreign.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_engine_failure_is_not_swallowed() {
        let err: ApiError =
            ProtocolEngineError::ClientSyncFailed("unreachable".to_string()).into();
        assert_eq!(err.status_and_code().0, StatusCode::BAD_GATEWAY);
    }
}
