//! Bearer authentication extractor for the management API.
//!
//! Validates opaque bearer tokens issued by the login endpoint and hands
//! handlers the stored token record, which carries the user and the
//! organization the token was minted under.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http::request::Parts;
use serde_json::json;

use crate::http::context::AppState;
use crate::storage::traits::IssuedToken;

/// Authenticated bearer token extractor for protected endpoints.
///
/// Rejects with a standard OAuth 2.0 error body when the header is
/// missing, malformed, not a bearer scheme, or names an unknown or
/// expired token.
#[derive(Clone, Debug)]
pub struct ExtractedAuth(pub IssuedToken);

/// Create a standard OAuth 2.0 error response
fn create_oauth_error_response(
    status: StatusCode,
    error: &str,
    error_description: &str,
) -> Response {
    let body = json!({
        "error": error,
        "error_description": error_description
    });

    (status, axum::Json(body)).into_response()
}

impl<S> FromRequestParts<S> for ExtractedAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                create_oauth_error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_request",
                    "Missing Authorization header",
                )
            })?;

        let Some((scheme, token)) = auth_header.split_once(' ') else {
            return Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_request",
                "Invalid Authorization header format",
            ));
        };

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(create_oauth_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_request",
                "Unsupported authorization scheme",
            ));
        }

        let issued = app_state
            .storage
            .get_token(token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "token lookup failed");
                create_oauth_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "Internal server error",
                )
            })?
            .ok_or_else(|| {
                create_oauth_error_response(
                    StatusCode::UNAUTHORIZED,
                    "invalid_token",
                    "Token is invalid or expired",
                )
            })?;

        Ok(ExtractedAuth(issued))
    }
}
