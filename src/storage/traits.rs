//! Storage trait definitions for tenants, users, clients, tokens, and
//! bridge sessions.
//!
//! Defines async storage interfaces that can be implemented by various
//! backend providers. Uniqueness constraints (email, subdomain, client id)
//! are enforced here and surface as `StorageError::UniqueViolation`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Client, Organization, User};
use crate::errors::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Opaque bearer token issued by the login use case. The organization id
/// travels with the token so tenant identity survives across calls that
/// carry no header/query/subdomain signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Short-lived cookie session bridging a bearer-authenticated identity
/// into the protocol engine's redirect flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSession {
    pub session_id: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Trait for storing and retrieving organizations
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Store a new organization; fails on subdomain conflict
    async fn store_organization(&self, organization: &Organization) -> Result<()>;

    /// Retrieve an organization by id
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>>;

    /// Retrieve an organization by subdomain
    async fn get_organization_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Organization>>;
}

/// Trait for storing and retrieving users
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Store a new user; fails on email conflict (emails are globally unique)
    async fn store_user(&self, user: &User) -> Result<()>;

    /// Retrieve a user by id
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Retrieve a user by normalized email
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update an existing user
    async fn update_user(&self, user: &User) -> Result<()>;
}

/// Trait for storing and retrieving domain client records.
///
/// This is the internal half of the dual-write registry; the protocol
/// engine holds its own record keyed by the same `client_id`.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a new client; fails on client_id conflict
    async fn store_client(&self, client: &Client) -> Result<()>;

    /// Retrieve a client by its protocol-facing client_id slug
    async fn get_client_by_client_id(&self, client_id: &str) -> Result<Option<Client>>;

    /// Retrieve a client by domain id
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>>;

    /// Update an existing client
    async fn update_client(&self, client: &Client) -> Result<()>;

    /// Delete a client by domain id
    async fn delete_client(&self, id: Uuid) -> Result<()>;

    /// Check whether a client_id slug is taken
    async fn client_id_exists(&self, client_id: &str) -> Result<bool>;

    /// List clients registered by one owner
    async fn list_clients_by_owner(&self, owner_id: Uuid) -> Result<Vec<Client>>;
}

/// Trait for storing bearer tokens issued at login
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a newly issued token
    async fn store_token(&self, token: &IssuedToken) -> Result<()>;

    /// Retrieve a token; expired tokens return None
    async fn get_token(&self, token: &str) -> Result<Option<IssuedToken>>;

    /// Revoke a token
    async fn revoke_token(&self, token: &str) -> Result<()>;
}

/// Trait for storing bridge cookie sessions
#[async_trait]
pub trait BridgeSessionStore: Send + Sync {
    /// Store a new bridge session
    async fn store_session(&self, session: &BridgeSession) -> Result<()>;

    /// Retrieve a session by id; expired sessions return None
    async fn get_session(&self, session_id: &str) -> Result<Option<BridgeSession>>;

    /// Remove a session (logout)
    async fn remove_session(&self, session_id: &str) -> Result<()>;
}

/// Combined storage trait for the whole authorization layer
pub trait AuthStorage:
    OrganizationStore + UserStore + ClientStore + TokenStore + BridgeSessionStore + Send + Sync
{
}
