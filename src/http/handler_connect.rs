//! Handles /connect: the protocol engine's public OAuth surface.
//!
//! The authorize endpoint accepts the bridge cookie session first and a
//! bearer token as a fallback; unauthenticated callers are redirected to
//! the login page with the original request carried in `returnUrl`.

use axum::extract::{Form, OriginalUri, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json as ResponseJson, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::bridge::SESSION_COOKIE;
use crate::engine::{AuthorizeOutcome, AuthorizeParams, Principal, TokenParams};
use crate::errors::{ApiError, ProtocolEngineError};
use crate::http::context::AppState;
use crate::tenant::ResolvedTenant;

/// Resolve the authenticated principal for an authorize request: the
/// bridge cookie session wins, a bearer token is the fallback.
async fn resolve_principal(
    state: &AppState,
    jar: &CookieJar,
    bearer: Option<&str>,
) -> Result<Option<Principal>, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.storage.get_session(cookie.value()).await? {
            return Ok(Some(Principal {
                subject: session.user_id,
                email: session.email,
                name: session.display_name,
                organization_id: session.organization_id,
            }));
        }
    }

    if let Some(token) = bearer {
        if let Some(issued) = state.storage.get_token(token).await? {
            if let Some(user) = state.storage.get_user(issued.user_id).await? {
                return Ok(Some(Principal {
                    subject: user.id,
                    email: user.email.as_str().to_string(),
                    name: user.display_name(),
                    organization_id: user.organization_id,
                }));
            }
        }
    }

    Ok(None)
}

fn bearer_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let header = headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.to_string())
}

/// Redirect an unauthenticated caller to the login page, carrying the
/// original authorize request so the flow can resume after sign-in.
fn login_redirect(state: &AppState, original: &OriginalUri) -> Response {
    let return_url = match original.query() {
        Some(query) => format!("{}?{}", original.path(), query),
        None => original.path().to_string(),
    };
    let location = format!(
        "{}?{}",
        state.config.login_url,
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("returnUrl", &return_url)
            .finish()
    );
    Redirect::to(&location).into_response()
}

async fn run_authorize(
    state: AppState,
    tenant: ResolvedTenant,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    original: OriginalUri,
    params: AuthorizeParams,
) -> Result<Response, ApiError> {
    let bearer = bearer_from_headers(&headers);
    let Some(principal) = resolve_principal(&state, &jar, bearer.as_deref()).await? else {
        return Ok(login_redirect(&state, &original));
    };

    // Same cross-tenant rule the bridge enforces, re-checked here because
    // a cookie session can outlive the establish-session request that
    // created it
    if let Some(client) = state
        .storage
        .get_client_by_client_id(&params.client_id)
        .await?
    {
        let tenant_mismatch = tenant
            .0
            .organization_id()
            .is_some_and(|org| org != client.organization_id);
        if tenant_mismatch || client.organization_id != principal.organization_id {
            return Err(ApiError::CrossTenant(format!(
                "client '{}' belongs to a different organization",
                params.client_id
            )));
        }
    }

    match state.engine.authorize(params, principal).await? {
        AuthorizeOutcome::Redirect(location) => Ok(Redirect::to(&location).into_response()),
        AuthorizeOutcome::Error { error, description } => Ok((
            StatusCode::BAD_REQUEST,
            ResponseJson(json!({
                "error": error,
                "error_description": description
            })),
        )
            .into_response()),
    }
}

/// GET /connect/authorize
pub async fn authorize_get_handler(
    State(state): State<AppState>,
    tenant: ResolvedTenant,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    original: OriginalUri,
    Query(params): Query<AuthorizeParams>,
) -> Result<Response, ApiError> {
    run_authorize(state, tenant, jar, headers, original, params).await
}

/// POST /connect/authorize
pub async fn authorize_post_handler(
    State(state): State<AppState>,
    tenant: ResolvedTenant,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
    original: OriginalUri,
    Form(params): Form<AuthorizeParams>,
) -> Result<Response, ApiError> {
    run_authorize(state, tenant, jar, headers, original, params).await
}

/// POST /connect/token
///
/// Grant failures are the caller's problem, not the engine's: they come
/// back as standard OAuth `invalid_grant`/`invalid_client` bodies rather
/// than gateway errors. Engine-internal failures are the one exception
/// and answer 500.
pub async fn token_handler(
    State(state): State<AppState>,
    Form(params): Form<TokenParams>,
) -> Result<ResponseJson<crate::engine::EngineTokenResponse>, (StatusCode, ResponseJson<Value>)> {
    match state.engine.token(params).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(e @ ProtocolEngineError::Internal(_)) => {
            tracing::error!(error = %e, "token exchange failed inside the engine");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(json!({
                    "error": "server_error",
                    "error_description": "Internal server error"
                })),
            ))
        }
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            ResponseJson(json!({
                "error": "invalid_grant",
                "error_description": e.to_string()
            })),
        )),
    }
}

/// GET|POST /connect/userinfo
pub async fn userinfo_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<ResponseJson<crate::engine::UserInfoClaims>, (StatusCode, ResponseJson<Value>)> {
    let unauthorized = |description: String| {
        (
            StatusCode::UNAUTHORIZED,
            ResponseJson(json!({
                "error": "invalid_token",
                "error_description": description
            })),
        )
    };

    let token = bearer_from_headers(&headers)
        .ok_or_else(|| unauthorized("Missing bearer token".to_string()))?;

    match state.engine.userinfo(&token).await {
        Ok(claims) => Ok(ResponseJson(claims)),
        Err(e @ ProtocolEngineError::Internal(_)) => {
            tracing::error!(error = %e, "userinfo lookup failed inside the engine");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseJson(json!({
                    "error": "server_error",
                    "error_description": "Internal server error"
                })),
            ))
        }
        Err(e) => Err(unauthorized(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogoutParams {
    pub post_logout_redirect_uri: Option<String>,
    pub client_id: Option<String>,
}

/// GET /connect/logout
pub async fn logout_get_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LogoutParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    run_logout(state, jar, params).await
}

/// POST /connect/logout (RP-initiated logout carries form parameters)
pub async fn logout_post_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(params): Form<LogoutParams>,
) -> Result<(CookieJar, Redirect), ApiError> {
    run_logout(state, jar, params).await
}

/// Removes the bridge session and clears the cookie. Relative redirect
/// targets are accepted as-is; an absolute target is honored only when it
/// exactly matches a redirect URI registered by the named client.
/// Anything else falls back to the configured default.
async fn run_logout(
    state: AppState,
    jar: CookieJar,
    params: LogoutParams,
) -> Result<(CookieJar, Redirect), ApiError> {
    let jar = match jar.get(SESSION_COOKIE) {
        Some(cookie) => {
            state.bridge.end_session(cookie.value()).await?;
            jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
        }
        None => jar,
    };

    let target = match params.post_logout_redirect_uri {
        Some(uri) if is_safe_relative(&uri) => uri,
        Some(uri) => {
            let registered = match &params.client_id {
                Some(client_id) => client_registered_uri(&state, client_id, &uri).await?,
                None => false,
            };
            if registered {
                uri
            } else {
                state.config.post_logout_redirect.clone()
            }
        }
        None => state.config.post_logout_redirect.clone(),
    };

    Ok((jar, Redirect::to(&target)))
}

fn is_safe_relative(uri: &str) -> bool {
    uri.starts_with('/') && !uri.starts_with("//") && !uri.contains('\\')
}

/// True when the candidate exactly matches one of the client's registered
/// redirect URIs.
async fn client_registered_uri(
    state: &AppState,
    client_id: &str,
    candidate: &str,
) -> Result<bool, ApiError> {
    Ok(state
        .storage
        .get_client_by_client_id(client_id)
        .await?
        .is_some_and(|client| client.redirect_uris.iter().any(|u| u.matches(candidate))))
}

/// GET /.well-known/openid-configuration
pub async fn openid_configuration_handler(
    State(state): State<AppState>,
) -> ResponseJson<Value> {
    ResponseJson(state.engine.discovery_document(&state.config.external_base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{
        EngineClientRecord, EngineTokenResponse, MemoryProtocolEngine, ProtocolEngine,
        UserInfoClaims,
    };
    use crate::storage::MemoryAuthStorage;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Engine double that fails internally on every protocol call.
    struct PoisonedEngine;

    #[async_trait]
    impl ProtocolEngine for PoisonedEngine {
        async fn upsert_client(&self, _: &EngineClientRecord) -> crate::engine::Result<()> {
            Ok(())
        }
        async fn delete_client(&self, _: &str) -> crate::engine::Result<()> {
            Ok(())
        }
        async fn client_exists(&self, _: &str) -> crate::engine::Result<bool> {
            Ok(false)
        }
        async fn authorize(
            &self,
            _: AuthorizeParams,
            _: Principal,
        ) -> crate::engine::Result<AuthorizeOutcome> {
            Err(ProtocolEngineError::Internal("poisoned".to_string()))
        }
        async fn token(&self, _: TokenParams) -> crate::engine::Result<EngineTokenResponse> {
            Err(ProtocolEngineError::Internal("poisoned".to_string()))
        }
        async fn userinfo(&self, _: &str) -> crate::engine::Result<UserInfoClaims> {
            Err(ProtocolEngineError::Internal("poisoned".to_string()))
        }
        fn discovery_document(&self, _: &str) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    fn app_state(engine: Arc<dyn ProtocolEngine>) -> AppState {
        let config = Arc::new(Config {
            version: "test".to_string(),
            http_port: "8080".to_string().try_into().unwrap(),
            external_base: "https://auth.example.com".to_string(),
            login_url: "/login".to_string(),
            post_logout_redirect: "/".to_string(),
            session_ttl: "10m".to_string().try_into().unwrap(),
            access_token_expiration: "1d".to_string().try_into().unwrap(),
            cors_origins: None::<String>.try_into().unwrap(),
            storage_backend: "memory".to_string(),
        });
        AppState::new(config, Arc::new(MemoryAuthStorage::new()), engine)
    }

    fn code_exchange_params() -> TokenParams {
        TokenParams {
            grant_type: "authorization_code".to_string(),
            code: Some("bogus".to_string()),
            redirect_uri: Some("https://localhost:5173/cb".to_string()),
            code_verifier: None,
            refresh_token: None,
            client_id: Some("demo".to_string()),
            client_secret: None,
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_engine_internal_failure_answers_500() {
        let state = app_state(Arc::new(PoisonedEngine));
        let result = token_handler(State(state), Form(code_exchange_params())).await;
        let (status, body) = result.err().expect("expected an error response");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0["error"], "server_error");
    }

    #[tokio::test]
    async fn test_rejected_grant_answers_invalid_grant() {
        let state = app_state(Arc::new(MemoryProtocolEngine::new()));
        let result = token_handler(State(state), Form(code_exchange_params())).await;
        let (status, body) = result.err().expect("expected an error response");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["error"], "invalid_grant");
    }

    #[test]
    fn test_safe_relative_logout_targets() {
        assert!(is_safe_relative("/goodbye"));
        assert!(!is_safe_relative("//evil.com"));
        assert!(!is_safe_relative("https://evil.com"));
        assert!(!is_safe_relative("/a\\b"));
    }
}
