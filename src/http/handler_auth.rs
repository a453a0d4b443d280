//! Handles /api/auth: registration, login, and bridge session establishment.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::Json as ResponseJson;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::SESSION_COOKIE;
use crate::domain::{Email, Organization, User};
use crate::engine::generate_token;
use crate::errors::{ApiError, DomainError};
use crate::http::context::AppState;
use crate::http::middleware_auth::ExtractedAuth;
use crate::storage::traits::IssuedToken;
use crate::tenant::ResolvedTenant;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Present together with `organization_subdomain` to bootstrap a new
    /// organization; absent to join the resolved tenant.
    pub organization_name: Option<String>,
    pub organization_subdomain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub is_organization_admin: bool,
}

/// POST /api/auth/register
///
/// Two modes: bootstrapping a fresh organization (the registrant becomes
/// its admin), or joining the organization the request resolved to, which
/// requires that organization to allow self-signup.
pub async fn register_handler(
    State(state): State<AppState>,
    tenant: ResolvedTenant,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<RegisterResponse>), ApiError> {
    let email = Email::new(&request.email)?;
    if request.password.len() < 8 {
        return Err(DomainError::InvalidPassword(
            "must be at least 8 characters".to_string(),
        )
        .into());
    }

    // Checked before any write: a duplicate email must not leave behind a
    // freshly created organization squatting its subdomain
    if state
        .storage
        .get_user_by_email(email.as_str())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "email '{}' is already registered",
            email
        )));
    }

    let (organization_id, is_admin) = match (
        &request.organization_name,
        &request.organization_subdomain,
    ) {
        (Some(name), Some(subdomain)) => {
            let (org, event) = Organization::new(name, subdomain)?;
            state.storage.store_organization(&org).await?;
            event.emit();
            (org.id, true)
        }
        (None, None) => {
            let organization_id = tenant
                .0
                .organization_id()
                .ok_or_else(|| ApiError::Unauthorized("No tenant resolved".to_string()))?;
            let org = state
                .storage
                .get_organization(organization_id)
                .await?
                .ok_or(ApiError::NotFound)?;
            if !org.settings.allow_self_signup {
                return Err(DomainError::SignupNotAllowed(format!(
                    "organization '{}' does not allow self-signup",
                    org.subdomain
                ))
                .into());
            }
            (organization_id, false)
        }
        _ => {
            return Err(DomainError::InvalidSubdomain(
                "organization_name and organization_subdomain must be supplied together"
                    .to_string(),
            )
            .into());
        }
    };

    let password_hash = state.hasher.hash(&request.password)?;
    let (user, event) = User::new(
        email,
        password_hash,
        &request.first_name,
        &request.last_name,
        organization_id,
        is_admin,
    );
    state.storage.store_user(&user).await?;
    event.emit();

    Ok((
        StatusCode::CREATED,
        ResponseJson(RegisterResponse {
            user_id: user.id,
            organization_id,
            email: user.email.as_str().to_string(),
            is_organization_admin: is_admin,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub organization_id: Uuid,
}

/// POST /api/auth/login
///
/// Unknown email and wrong password produce the same response so callers
/// cannot probe which addresses exist.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<ResponseJson<LoginResponse>, ApiError> {
    let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

    let normalized = Email::new(&request.email).map_err(|_| invalid())?;
    let mut user = state
        .storage
        .get_user_by_email(normalized.as_str())
        .await?
        .ok_or_else(invalid)?;

    if !state.hasher.verify(&request.password, &user.password_hash) {
        return Err(invalid());
    }

    let now = chrono::Utc::now();
    let event = user.record_login(now);
    state.storage.update_user(&user).await?;
    event.emit();

    let lifetime = *state.config.access_token_expiration.as_ref();
    let token = IssuedToken {
        token: generate_token(),
        user_id: user.id,
        organization_id: user.organization_id,
        created_at: now,
        expires_at: now + lifetime,
    };
    state.storage.store_token(&token).await?;

    Ok(ResponseJson(LoginResponse {
        access_token: token.token,
        token_type: "Bearer".to_string(),
        expires_in: lifetime.num_seconds(),
        organization_id: user.organization_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EstablishSessionRequest {
    #[serde(rename = "returnUrl")]
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub struct EstablishSessionResponse {
    #[serde(rename = "returnUrl")]
    pub return_url: String,
}

/// POST /api/auth/establish-session
///
/// Converts a bearer-authenticated identity into the short-lived cookie
/// session the /connect/authorize handler accepts, then echoes the
/// validated return URL for the caller to navigate to.
pub async fn establish_session_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
    tenant: ResolvedTenant,
    jar: CookieJar,
    Json(request): Json<EstablishSessionRequest>,
) -> Result<(CookieJar, ResponseJson<EstablishSessionResponse>), ApiError> {
    let user = state
        .storage
        .get_user(token.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Token subject no longer exists".to_string()))?;

    let session = state
        .bridge
        .establish_session(&user, &request.return_url, tenant.0)
        .await?;

    let mut cookie = Cookie::new(SESSION_COOKIE, session.session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        ResponseJson(EstablishSessionResponse {
            return_url: request.return_url,
        }),
    ))
}
