//! In-process protocol engine.
//!
//! Implements the [`ProtocolEngine`] contract entirely in memory:
//! single-use five-minute authorization codes, exact redirect-URI matching,
//! PKCE S256 verification, and opaque access/refresh tokens. The binary and
//! the integration tests run against this engine; a deployment may swap in
//! an adapter to an external engine instead.

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

use crate::domain::PasswordHasher;
use crate::errors::ProtocolEngineError;

use super::{
    AuthorizeOutcome, AuthorizeParams, EngineClientRecord, EngineTokenResponse, Principal,
    ProtocolEngine, Result, TokenParams, UserInfoClaims, generate_token,
};

const AUTH_CODE_LIFETIME_MINUTES: i64 = 5;
const ACCESS_TOKEN_LIFETIME_HOURS: i64 = 1;
const REFRESH_TOKEN_LIFETIME_DAYS: i64 = 14;

#[derive(Debug, Clone)]
struct EngineAuthCode {
    client_id: String,
    principal: Principal,
    redirect_uri: String,
    scope: Option<String>,
    code_challenge: Option<String>,
    expires_at: DateTime<Utc>,
    used: bool,
}

#[derive(Debug, Clone)]
struct EngineAccessToken {
    principal: Principal,
    scope: Option<String>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct EngineRefreshToken {
    client_id: String,
    principal: Principal,
    scope: Option<String>,
    expires_at: DateTime<Utc>,
}

/// In-memory OAuth protocol engine
#[derive(Default)]
pub struct MemoryProtocolEngine {
    hasher: PasswordHasher,
    clients: Mutex<HashMap<String, EngineClientRecord>>,
    codes: Mutex<HashMap<String, EngineAuthCode>>,
    access_tokens: Mutex<HashMap<String, EngineAccessToken>>,
    refresh_tokens: Mutex<HashMap<String, EngineRefreshToken>>,
}

/// Poisoned locks are an engine defect, not a rejected grant.
fn lock_err(e: impl std::fmt::Display) -> ProtocolEngineError {
    ProtocolEngineError::Internal(format!("Lock error: {}", e))
}

impl MemoryProtocolEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_client(&self, client_id: &str) -> Result<EngineClientRecord> {
        let clients = self.clients.lock().map_err(lock_err)?;
        clients
            .get(client_id)
            .cloned()
            .ok_or_else(|| ProtocolEngineError::AuthorizationFailed("Client not found".to_string()))
    }

    fn authenticate_client(&self, client: &EngineClientRecord, params: &TokenParams) -> Result<()> {
        match client.client_type.as_str() {
            "confidential" => {
                let secret_hash = client.secret_hash.as_deref().ok_or_else(|| {
                    ProtocolEngineError::TokenExchangeFailed(
                        "Confidential client has no secret".to_string(),
                    )
                })?;
                let presented = params.client_secret.as_deref().ok_or_else(|| {
                    ProtocolEngineError::TokenExchangeFailed(
                        "Missing client secret".to_string(),
                    )
                })?;
                if !self.hasher.verify(presented, secret_hash) {
                    return Err(ProtocolEngineError::TokenExchangeFailed(
                        "Invalid client credentials".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn issue_tokens(
        &self,
        client_id: &str,
        principal: Principal,
        scope: Option<String>,
    ) -> Result<EngineTokenResponse> {
        let now = Utc::now();
        let access_token = generate_token();
        let refresh_token = generate_token();

        {
            let mut tokens = self.access_tokens.lock().map_err(lock_err)?;
            tokens.insert(
                access_token.clone(),
                EngineAccessToken {
                    principal: principal.clone(),
                    scope: scope.clone(),
                    expires_at: now + Duration::hours(ACCESS_TOKEN_LIFETIME_HOURS),
                },
            );
        }
        {
            let mut tokens = self.refresh_tokens.lock().map_err(lock_err)?;
            tokens.insert(
                refresh_token.clone(),
                EngineRefreshToken {
                    client_id: client_id.to_string(),
                    principal,
                    scope: scope.clone(),
                    expires_at: now + Duration::days(REFRESH_TOKEN_LIFETIME_DAYS),
                },
            );
        }

        Ok(EngineTokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: (Duration::hours(ACCESS_TOKEN_LIFETIME_HOURS).num_seconds()) as u64,
            refresh_token: Some(refresh_token),
            scope,
        })
    }

    async fn authorization_code_grant(&self, params: TokenParams) -> Result<EngineTokenResponse> {
        let code = params.code.as_deref().ok_or_else(|| {
            ProtocolEngineError::TokenExchangeFailed("Missing authorization code".to_string())
        })?;
        let redirect_uri = params.redirect_uri.as_deref().ok_or_else(|| {
            ProtocolEngineError::TokenExchangeFailed("Missing redirect URI".to_string())
        })?;

        // Consume the code: single use, expiring
        let auth_code = {
            let mut codes = self.codes.lock().map_err(lock_err)?;
            match codes.get_mut(code) {
                Some(stored) if !stored.used && stored.expires_at >= Utc::now() => {
                    stored.used = true;
                    stored.clone()
                }
                _ => {
                    return Err(ProtocolEngineError::TokenExchangeFailed(
                        "Invalid authorization code".to_string(),
                    ));
                }
            }
        };

        if auth_code.redirect_uri != redirect_uri {
            return Err(ProtocolEngineError::TokenExchangeFailed(
                "Redirect URI mismatch".to_string(),
            ));
        }

        let client = self.get_client(&auth_code.client_id)?;
        self.authenticate_client(&client, &params)?;

        if let Some(ref code_challenge) = auth_code.code_challenge {
            let code_verifier = params.code_verifier.as_deref().ok_or_else(|| {
                ProtocolEngineError::TokenExchangeFailed("Missing code verifier".to_string())
            })?;
            if !verify_pkce_s256(code_verifier, code_challenge) {
                return Err(ProtocolEngineError::TokenExchangeFailed(
                    "PKCE verification failed".to_string(),
                ));
            }
        } else if client.require_pkce {
            return Err(ProtocolEngineError::TokenExchangeFailed(
                "PKCE required for this client".to_string(),
            ));
        }

        self.issue_tokens(&auth_code.client_id, auth_code.principal, auth_code.scope)
    }

    async fn refresh_token_grant(&self, params: TokenParams) -> Result<EngineTokenResponse> {
        let refresh_token = params.refresh_token.as_deref().ok_or_else(|| {
            ProtocolEngineError::TokenExchangeFailed("Missing refresh token".to_string())
        })?;

        // Rotate: consume the presented refresh token
        let stored = {
            let mut tokens = self.refresh_tokens.lock().map_err(lock_err)?;
            tokens.remove(refresh_token).ok_or_else(|| {
                ProtocolEngineError::TokenExchangeFailed("Invalid refresh token".to_string())
            })?
        };
        if stored.expires_at < Utc::now() {
            return Err(ProtocolEngineError::TokenExchangeFailed(
                "Refresh token expired".to_string(),
            ));
        }

        let client = self.get_client(&stored.client_id)?;
        self.authenticate_client(&client, &params)?;

        self.issue_tokens(&stored.client_id, stored.principal, stored.scope)
    }
}

#[async_trait]
impl ProtocolEngine for MemoryProtocolEngine {
    async fn upsert_client(&self, record: &EngineClientRecord) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        clients.insert(record.client_id.clone(), record.clone());
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        clients.remove(client_id);
        Ok(())
    }

    async fn client_exists(&self, client_id: &str) -> Result<bool> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients.contains_key(client_id))
    }

    async fn authorize(
        &self,
        params: AuthorizeParams,
        principal: Principal,
    ) -> Result<AuthorizeOutcome> {
        let client = match self.get_client(&params.client_id) {
            Ok(client) => client,
            Err(_) => {
                return Ok(AuthorizeOutcome::Error {
                    error: "invalid_client".to_string(),
                    description: "Client not found".to_string(),
                });
            }
        };

        // Exact match only; no normalization of the candidate
        if !client.redirect_uris.iter().any(|u| u == &params.redirect_uri) {
            return Ok(AuthorizeOutcome::Error {
                error: "invalid_request".to_string(),
                description: "Invalid redirect URI".to_string(),
            });
        }

        if params.response_type != "code" {
            return Ok(AuthorizeOutcome::Error {
                error: "unsupported_response_type".to_string(),
                description: format!("'{}' is not supported", params.response_type),
            });
        }

        if let Some(ref requested) = params.scope {
            let allowed = &client.allowed_scopes;
            if requested
                .split_whitespace()
                .any(|s| !allowed.iter().any(|a| a == s))
            {
                return Ok(AuthorizeOutcome::Error {
                    error: "invalid_scope".to_string(),
                    description: "Requested scope exceeds allowed scope".to_string(),
                });
            }
        }

        if client.require_pkce {
            if params.code_challenge.is_none() {
                return Ok(AuthorizeOutcome::Error {
                    error: "invalid_request".to_string(),
                    description: "PKCE required for this client".to_string(),
                });
            }
            if params.code_challenge_method.as_deref() != Some("S256") {
                return Ok(AuthorizeOutcome::Error {
                    error: "invalid_request".to_string(),
                    description: "code_challenge_method must be S256".to_string(),
                });
            }
        }

        let code = generate_token();
        {
            let mut codes = self.codes.lock().map_err(lock_err)?;
            codes.insert(
                code.clone(),
                EngineAuthCode {
                    client_id: params.client_id.clone(),
                    principal,
                    redirect_uri: params.redirect_uri.clone(),
                    scope: params.scope.clone(),
                    code_challenge: params.code_challenge.clone(),
                    expires_at: Utc::now() + Duration::minutes(AUTH_CODE_LIFETIME_MINUTES),
                    used: false,
                },
            );
        }

        let mut redirect_url = Url::parse(&params.redirect_uri).map_err(|e| {
            ProtocolEngineError::AuthorizationFailed(format!("Invalid redirect URI: {}", e))
        })?;
        redirect_url.query_pairs_mut().append_pair("code", &code);
        if let Some(state) = params.state {
            redirect_url.query_pairs_mut().append_pair("state", &state);
        }

        Ok(AuthorizeOutcome::Redirect(redirect_url.to_string()))
    }

    async fn token(&self, params: TokenParams) -> Result<EngineTokenResponse> {
        match params.grant_type.as_str() {
            "authorization_code" => self.authorization_code_grant(params).await,
            "refresh_token" => self.refresh_token_grant(params).await,
            other => Err(ProtocolEngineError::TokenExchangeFailed(format!(
                "Unsupported grant type '{}'",
                other
            ))),
        }
    }

    async fn userinfo(&self, access_token: &str) -> Result<UserInfoClaims> {
        let tokens = self.access_tokens.lock().map_err(lock_err)?;
        let stored = tokens
            .get(access_token)
            .filter(|t| t.expires_at >= Utc::now())
            .ok_or_else(|| {
                ProtocolEngineError::InvalidToken("Access token not found or expired".to_string())
            })?;

        Ok(UserInfoClaims {
            sub: stored.principal.subject.to_string(),
            email: stored.principal.email.clone(),
            name: stored.principal.name.clone(),
            org: stored.principal.organization_id.to_string(),
            scope: stored.scope.clone(),
        })
    }

    fn discovery_document(&self, external_base: &str) -> serde_json::Value {
        let base = external_base.trim_end_matches('/');
        serde_json::json!({
            "issuer": base,
            "authorization_endpoint": format!("{}/connect/authorize", base),
            "token_endpoint": format!("{}/connect/token", base),
            "userinfo_endpoint": format!("{}/connect/userinfo", base),
            "end_session_endpoint": format!("{}/connect/logout", base),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "code_challenge_methods_supported": ["S256"],
            "subject_types_supported": ["public"],
            "scopes_supported": ["openid", "profile", "email"],
        })
    }
}

/// RFC 7636 S256: BASE64URL(SHA256(verifier)) == challenge
fn verify_pkce_s256(code_verifier: &str, code_challenge: &str) -> bool {
    let digest = Sha256::digest(code_verifier.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(digest) == code_challenge
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal() -> Principal {
        Principal {
            subject: Uuid::new_v4(),
            email: "a@acme.com".to_string(),
            name: "Ada Lovelace".to_string(),
            organization_id: Uuid::new_v4(),
        }
    }

    fn public_client() -> EngineClientRecord {
        EngineClientRecord {
            client_id: "demo".to_string(),
            display_name: "Demo".to_string(),
            client_type: "public".to_string(),
            secret_hash: None,
            redirect_uris: vec!["https://localhost:5173/cb".to_string()],
            allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
            require_pkce: true,
        }
    }

    fn pkce_pair() -> (String, String) {
        let verifier = generate_token();
        let challenge = BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        (verifier, challenge)
    }

    fn authorize_params(challenge: &str) -> AuthorizeParams {
        AuthorizeParams {
            client_id: "demo".to_string(),
            redirect_uri: "https://localhost:5173/cb".to_string(),
            response_type: "code".to_string(),
            scope: Some("openid profile".to_string()),
            state: Some("xyz".to_string()),
            code_challenge: Some(challenge.to_string()),
            code_challenge_method: Some("S256".to_string()),
        }
    }

    #[tokio::test]
    async fn test_full_code_flow_with_pkce() {
        let engine = MemoryProtocolEngine::new();
        engine.upsert_client(&public_client()).await.unwrap();
        let (verifier, challenge) = pkce_pair();

        let outcome = engine
            .authorize(authorize_params(&challenge), principal())
            .await
            .unwrap();
        let redirect = match outcome {
            AuthorizeOutcome::Redirect(url) => url,
            other => panic!("expected redirect, got {:?}", other),
        };
        let parsed = Url::parse(&redirect).unwrap();
        let code = parsed
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();
        assert!(parsed.query_pairs().any(|(k, v)| k == "state" && v == "xyz"));

        let token_response = engine
            .token(TokenParams {
                grant_type: "authorization_code".to_string(),
                code: Some(code.clone()),
                redirect_uri: Some("https://localhost:5173/cb".to_string()),
                code_verifier: Some(verifier),
                refresh_token: None,
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await
            .unwrap();
        assert_eq!(token_response.token_type, "Bearer");

        let claims = engine.userinfo(&token_response.access_token).await.unwrap();
        assert_eq!(claims.email, "a@acme.com");

        // Codes are single use
        let replay = engine
            .token(TokenParams {
                grant_type: "authorization_code".to_string(),
                code: Some(code),
                redirect_uri: Some("https://localhost:5173/cb".to_string()),
                code_verifier: None,
                refresh_token: None,
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await;
        assert!(replay.is_err());
    }

    #[tokio::test]
    async fn test_pkce_required_for_public_clients() {
        let engine = MemoryProtocolEngine::new();
        engine.upsert_client(&public_client()).await.unwrap();

        let mut params = authorize_params("ignored");
        params.code_challenge = None;
        params.code_challenge_method = None;

        let outcome = engine.authorize(params, principal()).await.unwrap();
        assert!(matches!(
            outcome,
            AuthorizeOutcome::Error { ref error, .. } if error == "invalid_request"
        ));
    }

    #[tokio::test]
    async fn test_redirect_uri_exact_match() {
        let engine = MemoryProtocolEngine::new();
        engine.upsert_client(&public_client()).await.unwrap();
        let (_, challenge) = pkce_pair();

        let mut params = authorize_params(&challenge);
        params.redirect_uri = "https://localhost:5173/cb/".to_string();

        let outcome = engine.authorize(params, principal()).await.unwrap();
        assert!(matches!(outcome, AuthorizeOutcome::Error { .. }));
    }

    #[tokio::test]
    async fn test_wrong_verifier_rejected() {
        let engine = MemoryProtocolEngine::new();
        engine.upsert_client(&public_client()).await.unwrap();
        let (_, challenge) = pkce_pair();

        let outcome = engine
            .authorize(authorize_params(&challenge), principal())
            .await
            .unwrap();
        let redirect = match outcome {
            AuthorizeOutcome::Redirect(url) => url,
            other => panic!("expected redirect, got {:?}", other),
        };
        let code = Url::parse(&redirect)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let result = engine
            .token(TokenParams {
                grant_type: "authorization_code".to_string(),
                code: Some(code),
                redirect_uri: Some("https://localhost:5173/cb".to_string()),
                code_verifier: Some("wrong-verifier".to_string()),
                refresh_token: None,
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_refresh_token_rotation() {
        let engine = MemoryProtocolEngine::new();
        engine.upsert_client(&public_client()).await.unwrap();
        let (verifier, challenge) = pkce_pair();

        let outcome = engine
            .authorize(authorize_params(&challenge), principal())
            .await
            .unwrap();
        let AuthorizeOutcome::Redirect(redirect) = outcome else {
            panic!("expected redirect");
        };
        let code = Url::parse(&redirect)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let first = engine
            .token(TokenParams {
                grant_type: "authorization_code".to_string(),
                code: Some(code),
                redirect_uri: Some("https://localhost:5173/cb".to_string()),
                code_verifier: Some(verifier),
                refresh_token: None,
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await
            .unwrap();
        let refresh = first.refresh_token.clone().unwrap();

        let second = engine
            .token(TokenParams {
                grant_type: "refresh_token".to_string(),
                code: None,
                redirect_uri: None,
                code_verifier: None,
                refresh_token: Some(refresh.clone()),
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await
            .unwrap();
        assert_ne!(first.access_token, second.access_token);

        // The consumed refresh token no longer works
        let replay = engine
            .token(TokenParams {
                grant_type: "refresh_token".to_string(),
                code: None,
                redirect_uri: None,
                code_verifier: None,
                refresh_token: Some(refresh),
                client_id: Some("demo".to_string()),
                client_secret: None,
                scope: None,
            })
            .await;
        assert!(replay.is_err());
    }
}
