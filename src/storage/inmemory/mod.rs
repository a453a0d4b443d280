//! In-memory storage implementation
//!
//! Provides in-memory implementations for the authorization-layer storage
//! traits, used by the default backend and by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Client, Organization, User};
use crate::errors::StorageError;
use crate::storage::traits::*;

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation of all authorization-layer stores
#[derive(Default)]
pub struct MemoryAuthStorage {
    organizations: Mutex<HashMap<Uuid, Organization>>,
    users: Mutex<HashMap<Uuid, User>>,
    clients: Mutex<HashMap<Uuid, Client>>,
    tokens: Mutex<HashMap<String, IssuedToken>>,
    sessions: Mutex<HashMap<String, BridgeSession>>,
}

impl MemoryAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable(format!("Lock error: {}", e))
}

#[async_trait]
impl OrganizationStore for MemoryAuthStorage {
    async fn store_organization(&self, organization: &Organization) -> Result<()> {
        let mut orgs = self.organizations.lock().map_err(lock_err)?;
        if orgs
            .values()
            .any(|o| o.subdomain == organization.subdomain && o.id != organization.id)
        {
            return Err(StorageError::UniqueViolation(format!(
                "subdomain '{}' is already registered",
                organization.subdomain
            )));
        }
        orgs.insert(organization.id, organization.clone());
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let orgs = self.organizations.lock().map_err(lock_err)?;
        Ok(orgs.get(&id).cloned())
    }

    async fn get_organization_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Organization>> {
        let orgs = self.organizations.lock().map_err(lock_err)?;
        Ok(orgs.values().find(|o| o.subdomain == subdomain).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryAuthStorage {
    async fn store_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().map_err(lock_err)?;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StorageError::UniqueViolation(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.lock().map_err(lock_err)?;
        Ok(users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().map_err(lock_err)?;
        Ok(users.values().find(|u| u.email.as_str() == email).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().map_err(lock_err)?;
        if !users.contains_key(&user.id) {
            return Err(StorageError::NotFound(format!("user {}", user.id)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl ClientStore for MemoryAuthStorage {
    async fn store_client(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        if clients
            .values()
            .any(|c| c.client_id == client.client_id && c.id != client.id)
        {
            return Err(StorageError::UniqueViolation(format!(
                "client_id '{}' is already registered",
                client.client_id
            )));
        }
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> Result<Option<Client>> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients
            .values()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients.get(&id).cloned())
    }

    async fn update_client(&self, client: &Client) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        if !clients.contains_key(&client.id) {
            return Err(StorageError::NotFound(format!("client {}", client.id)));
        }
        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn delete_client(&self, id: Uuid) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_err)?;
        clients.remove(&id);
        Ok(())
    }

    async fn client_id_exists(&self, client_id: &str) -> Result<bool> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients.values().any(|c| c.client_id == client_id))
    }

    async fn list_clients_by_owner(&self, owner_id: Uuid) -> Result<Vec<Client>> {
        let clients = self.clients.lock().map_err(lock_err)?;
        Ok(clients
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TokenStore for MemoryAuthStorage {
    async fn store_token(&self, token: &IssuedToken) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<IssuedToken>> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        if let Some(stored) = tokens.get(token).cloned() {
            if stored.expires_at < Utc::now() {
                tokens.remove(token);
                return Ok(None);
            }
            Ok(Some(stored))
        } else {
            Ok(None)
        }
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().map_err(lock_err)?;
        tokens.remove(token);
        Ok(())
    }
}

#[async_trait]
impl BridgeSessionStore for MemoryAuthStorage {
    async fn store_session(&self, session: &BridgeSession) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(lock_err)?;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<BridgeSession>> {
        let mut sessions = self.sessions.lock().map_err(lock_err)?;
        if let Some(stored) = sessions.get(session_id).cloned() {
            if stored.expires_at < Utc::now() {
                sessions.remove(session_id);
                return Ok(None);
            }
            Ok(Some(stored))
        } else {
            Ok(None)
        }
    }

    async fn remove_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(lock_err)?;
        sessions.remove(session_id);
        Ok(())
    }
}

impl AuthStorage for MemoryAuthStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Email;
    use chrono::Duration;

    #[tokio::test]
    async fn test_subdomain_uniqueness_enforced() {
        let storage = MemoryAuthStorage::new();
        let (first, _) = Organization::new("Acme", "acme").unwrap();
        let (second, _) = Organization::new("Other Acme", "acme").unwrap();

        storage.store_organization(&first).await.unwrap();
        let result = storage.store_organization(&second).await;
        assert!(matches!(result, Err(StorageError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_email_uniqueness_is_global() {
        let storage = MemoryAuthStorage::new();
        let email = Email::new("a@acme.com").unwrap();
        let (user_a, _) = User::new(
            email.clone(),
            "h1".to_string(),
            "A",
            "One",
            Uuid::new_v4(),
            true,
        );
        // Same email, different organization
        let (user_b, _) = User::new(email, "h2".to_string(), "B", "Two", Uuid::new_v4(), false);

        storage.store_user(&user_a).await.unwrap();
        let result = storage.store_user(&user_b).await;
        assert!(matches!(result, Err(StorageError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_expired_token_returns_none() {
        let storage = MemoryAuthStorage::new();
        let token = IssuedToken {
            token: "tok".to_string(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
        };
        storage.store_token(&token).await.unwrap();
        assert!(storage.get_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_returns_none() {
        let storage = MemoryAuthStorage::new();
        let session = BridgeSession {
            session_id: "sid".to_string(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "a@acme.com".to_string(),
            display_name: "A One".to_string(),
            created_at: Utc::now() - Duration::minutes(20),
            expires_at: Utc::now() - Duration::minutes(10),
        };
        storage.store_session(&session).await.unwrap();
        assert!(storage.get_session("sid").await.unwrap().is_none());
    }
}
