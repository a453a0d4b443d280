//! Protocol-engine contract.
//!
//! The authorization/token endpoints are honored by an external OAuth
//! protocol engine; this module specifies the contract the core upholds
//! when talking to it, plus the in-process engine used by the binary and
//! tests. Client type crosses this boundary as a string; the closed
//! [`crate::domain::ClientType`] enum never leaves the domain as text
//! except through [`client_type_label`].

pub mod memory;

pub use memory::MemoryProtocolEngine;

use async_trait::async_trait;
use base64::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ClientType;
use crate::errors::ProtocolEngineError;

pub type Result<T> = std::result::Result<T, ProtocolEngineError>;

/// Translate the domain client type to the engine's wire form.
pub fn client_type_label(client_type: ClientType) -> &'static str {
    match client_type {
        ClientType::Public => "public",
        ClientType::Confidential => "confidential",
    }
}

/// Client record as the protocol engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineClientRecord {
    pub client_id: String,
    pub display_name: String,
    /// "public" or "confidential"
    pub client_type: String,
    /// Hash of the client secret, present for confidential clients
    pub secret_hash: Option<String>,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    /// Always true for public clients
    pub require_pkce: bool,
}

/// The identity handed to the engine at authorize time. The bridge is
/// responsible for these claims being tenant-correct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Subject (user id)
    pub subject: Uuid,
    pub email: String,
    pub name: String,
    pub organization_id: Uuid,
}

/// Standard OAuth2 authorization request parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Outcome of an authorization request.
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Redirect to the client's redirect URI carrying `code` (+ `state`)
    Redirect(String),
    /// Terminal OAuth error (no trustworthy redirect URI to send it to)
    Error { error: String, description: String },
}

/// Token endpoint parameters for both supported grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenParams {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct EngineTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfoClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub org: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Contract with the external OAuth protocol engine.
///
/// Client writes must be treated as the second half of a dual-write: a
/// failure here is a hard failure of the whole registry operation.
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    /// Create or replace the engine-side client record
    async fn upsert_client(&self, record: &EngineClientRecord) -> Result<()>;

    /// Delete the engine-side client record
    async fn delete_client(&self, client_id: &str) -> Result<()>;

    /// Check whether the engine knows a client id
    async fn client_exists(&self, client_id: &str) -> Result<bool>;

    /// Run the authorization request for an authenticated principal,
    /// emitting an authorization code
    async fn authorize(
        &self,
        params: AuthorizeParams,
        principal: Principal,
    ) -> Result<AuthorizeOutcome>;

    /// Token exchange (authorization_code, refresh_token)
    async fn token(&self, params: TokenParams) -> Result<EngineTokenResponse>;

    /// Resolve the authenticated principal behind an engine access token
    async fn userinfo(&self, access_token: &str) -> Result<UserInfoClaims>;

    /// OpenID Connect discovery document (owned by the engine)
    fn discovery_document(&self, external_base: &str) -> serde_json::Value;
}

/// Generate a secure random token
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_type_translates_at_the_boundary() {
        assert_eq!(client_type_label(ClientType::Public), "public");
        assert_eq!(client_type_label(ClientType::Confidential), "confidential");
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }
}
