//! Handles /api/clients: owner-scoped OAuth client management.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::Json as ResponseJson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Client, ClientType};
use crate::errors::ApiError;
use crate::http::context::AppState;
use crate::http::middleware_auth::ExtractedAuth;
use crate::registry::{ClientUpdate, NewClient};

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub display_name: String,
    pub client_type: ClientType,
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub display_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub allowed_scopes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: Uuid,
    pub client_id: String,
    pub display_name: String,
    pub client_type: ClientType,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Present exactly once, in the registration response of a
    /// confidential client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl ClientResponse {
    fn from_client(client: Client, client_secret: Option<String>) -> Self {
        Self {
            id: client.id,
            client_id: client.client_id,
            display_name: client.display_name,
            client_type: client.client_type,
            redirect_uris: client
                .redirect_uris
                .iter()
                .map(|u| u.as_str().to_string())
                .collect(),
            allowed_scopes: client.allowed_scopes,
            created_at: client.created_at,
            client_secret,
        }
    }
}

/// POST /api/clients
pub async fn create_client_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, ResponseJson<ClientResponse>), ApiError> {
    let registered = state
        .registry
        .register(
            NewClient {
                display_name: request.display_name,
                client_type: request.client_type,
                redirect_uris: request.redirect_uris,
                allowed_scopes: request.allowed_scopes,
            },
            token.user_id,
            token.organization_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ClientResponse::from_client(
            registered.client,
            registered.plaintext_secret,
        )),
    ))
}

/// GET /api/clients
pub async fn list_clients_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
) -> Result<ResponseJson<Vec<ClientResponse>>, ApiError> {
    let clients = state.registry.list_for_owner(token.user_id).await?;
    Ok(ResponseJson(
        clients
            .into_iter()
            .map(|c| ClientResponse::from_client(c, None))
            .collect(),
    ))
}

/// GET /api/clients/{id}
pub async fn get_client_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ClientResponse>, ApiError> {
    let client = state.registry.get(id, token.user_id).await?;
    Ok(ResponseJson(ClientResponse::from_client(client, None)))
}

/// PUT /api/clients/{id}
pub async fn update_client_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<ResponseJson<ClientResponse>, ApiError> {
    let client = state
        .registry
        .update(
            id,
            token.user_id,
            ClientUpdate {
                display_name: request.display_name,
                redirect_uris: request.redirect_uris,
                allowed_scopes: request.allowed_scopes,
            },
        )
        .await?;
    Ok(ResponseJson(ClientResponse::from_client(client, None)))
}

/// DELETE /api/clients/{id}
pub async fn delete_client_handler(
    State(state): State<AppState>,
    ExtractedAuth(token): ExtractedAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(id, token.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
