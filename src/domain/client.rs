//! OAuth client aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

use super::client_secret::ClientSecret;
use super::redirect_uri::RedirectUri;

/// Closed client type. The engine adapter translates to the engine's
/// string form at the boundary; this enum never leaves the domain as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Public,
    Confidential,
}

/// A registered OAuth application owned by a user within one organization.
///
/// Invariants enforced at construction:
/// - redirect URIs non-empty and duplicate-free
/// - secret present iff the client is confidential
/// - public clients require PKCE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    /// Human-derived slug, globally unique across both stores.
    pub client_id: String,
    pub display_name: String,
    pub client_type: ClientType,
    /// Hash only; the plaintext is returned once at creation.
    pub secret: Option<ClientSecret>,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub redirect_uris: Vec<RedirectUri>,
    pub allowed_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: String,
        display_name: &str,
        client_type: ClientType,
        secret: Option<ClientSecret>,
        owner_id: Uuid,
        organization_id: Uuid,
        redirect_uris: Vec<RedirectUri>,
        allowed_scopes: Vec<String>,
    ) -> Result<Self, DomainError> {
        validate_redirect_uris(&redirect_uris)?;

        match (client_type, &secret) {
            (ClientType::Public, Some(_)) => {
                return Err(DomainError::InvalidClient(
                    "public clients must not carry a secret".to_string(),
                ));
            }
            (ClientType::Confidential, None) => {
                return Err(DomainError::InvalidClient(
                    "confidential clients require a secret".to_string(),
                ));
            }
            _ => {}
        }

        if display_name.trim().is_empty() {
            return Err(DomainError::InvalidClient(
                "display name is empty".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            client_id,
            display_name: display_name.trim().to_string(),
            client_type,
            secret,
            owner_id,
            organization_id,
            redirect_uris,
            allowed_scopes: dedupe_scopes(allowed_scopes),
            created_at: Utc::now(),
        })
    }

    /// PKCE is mandatory for public clients.
    pub fn requires_pkce(&self) -> bool {
        self.client_type == ClientType::Public
    }

    /// Replace the redirect URI set, re-validating the invariants. The
    /// secret and all other state are untouched.
    pub fn set_redirect_uris(&mut self, uris: Vec<RedirectUri>) -> Result<(), DomainError> {
        validate_redirect_uris(&uris)?;
        self.redirect_uris = uris;
        Ok(())
    }

    pub fn set_allowed_scopes(&mut self, scopes: Vec<String>) {
        self.allowed_scopes = dedupe_scopes(scopes);
    }

    pub fn rename(&mut self, display_name: &str) -> Result<(), DomainError> {
        if display_name.trim().is_empty() {
            return Err(DomainError::InvalidClient(
                "display name is empty".to_string(),
            ));
        }
        self.display_name = display_name.trim().to_string();
        Ok(())
    }
}

fn validate_redirect_uris(uris: &[RedirectUri]) -> Result<(), DomainError> {
    if uris.is_empty() {
        return Err(DomainError::InvalidClient(
            "at least one redirect URI is required".to_string(),
        ));
    }
    for (i, uri) in uris.iter().enumerate() {
        if uris[..i].contains(uri) {
            return Err(DomainError::InvalidClient(format!(
                "duplicate redirect URI '{}'",
                uri
            )));
        }
    }
    Ok(())
}

/// Order-preserving scope dedupe.
fn dedupe_scopes(scopes: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(scopes.len());
    for scope in scopes {
        if !seen.contains(&scope) {
            seen.push(scope);
        }
    }
    seen
}
