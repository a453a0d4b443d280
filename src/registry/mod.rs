//! Tenant-scoped client registry.
//!
//! One logical register/update/delete/exists operation spanning two stores:
//! the internal domain repository (ownership and tenant metadata) and the
//! protocol engine (what the authorization/token endpoints actually honor).
//! Writes go to the domain store first, then the engine; an engine failure
//! triggers a compensating rollback on the domain side and surfaces as a
//! hard failure of the whole operation.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Client, ClientSecret, ClientType, DomainEvent, PasswordHasher, RedirectUri,
};
use crate::engine::{EngineClientRecord, ProtocolEngine, client_type_label};
use crate::errors::RegistryError;
use crate::storage::traits::ClientStore;

/// Client-id slug collision retry budget. Both stores are consulted on
/// every attempt since either can independently hold the colliding id.
const CLIENT_ID_MAX_ATTEMPTS: usize = 5;

/// Request to register a new OAuth client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub display_name: String,
    pub client_type: ClientType,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub display_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub allowed_scopes: Option<Vec<String>>,
}

/// Registration result. `plaintext_secret` is present exactly once, for
/// confidential clients, and is unrecoverable afterwards.
pub struct RegisteredClient {
    pub client: Client,
    pub plaintext_secret: Option<String>,
}

/// The dual-write client registry.
pub struct ClientRegistry {
    clients: Arc<dyn ClientStore>,
    engine: Arc<dyn ProtocolEngine>,
    hasher: PasswordHasher,
}

impl ClientRegistry {
    pub fn new(
        clients: Arc<dyn ClientStore>,
        engine: Arc<dyn ProtocolEngine>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            clients,
            engine,
            hasher,
        }
    }

    /// Register a new client for `owner_id` within `organization_id`.
    pub async fn register(
        &self,
        request: NewClient,
        owner_id: Uuid,
        organization_id: Uuid,
    ) -> Result<RegisteredClient, RegistryError> {
        let redirect_uris = parse_redirect_uris(&request.redirect_uris)?;

        let (secret, plaintext_secret) = match request.client_type {
            ClientType::Confidential => {
                let generated = ClientSecret::generate(&self.hasher)?;
                (Some(generated.hashed), Some(generated.plaintext))
            }
            ClientType::Public => (None, None),
        };

        let client_id = self.allocate_client_id(&request.display_name).await?;

        let client = Client::new(
            client_id,
            &request.display_name,
            request.client_type,
            secret,
            owner_id,
            organization_id,
            redirect_uris,
            request.allowed_scopes,
        )?;

        // Domain store first, engine second
        self.clients.store_client(&client).await?;
        if let Err(engine_err) = self.engine.upsert_client(&engine_record(&client)).await {
            // Compensate: no client may stay active in one store and
            // absent in the other
            if let Err(compensation_err) = self.clients.delete_client(client.id).await {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %compensation_err,
                    "compensating delete failed after engine write failure"
                );
            }
            return Err(engine_err.into());
        }

        DomainEvent::ClientRegistered {
            client_id: client.client_id.clone(),
            organization_id,
        }
        .emit();

        Ok(RegisteredClient {
            client,
            plaintext_secret,
        })
    }

    /// Update a client owned by `owner_id`. Redirect URIs are applied as a
    /// set difference so unrelated state (notably the secret) survives.
    pub async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: ClientUpdate,
    ) -> Result<Client, RegistryError> {
        let previous = self.get(id, owner_id).await?;
        let mut client = previous.clone();

        if let Some(display_name) = &update.display_name {
            client.rename(display_name)?;
        }
        if let Some(raw_uris) = &update.redirect_uris {
            let incoming = parse_redirect_uris(raw_uris)?;
            client.set_redirect_uris(merge_redirect_uris(&client.redirect_uris, incoming))?;
        }
        if let Some(scopes) = update.allowed_scopes {
            client.set_allowed_scopes(scopes);
        }

        self.clients.update_client(&client).await?;
        if let Err(engine_err) = self.engine.upsert_client(&engine_record(&client)).await {
            // Restore the previous domain record so the stores stay aligned
            if let Err(compensation_err) = self.clients.update_client(&previous).await {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %compensation_err,
                    "compensating restore failed after engine write failure"
                );
            }
            return Err(engine_err.into());
        }

        DomainEvent::ClientUpdated {
            client_id: client.client_id.clone(),
        }
        .emit();

        Ok(client)
    }

    /// Delete a client owned by `owner_id`.
    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), RegistryError> {
        let client = self.get(id, owner_id).await?;

        self.clients.delete_client(id).await?;
        if let Err(engine_err) = self.engine.delete_client(&client.client_id).await {
            if let Err(compensation_err) = self.clients.store_client(&client).await {
                tracing::error!(
                    client_id = %client.client_id,
                    error = %compensation_err,
                    "compensating restore failed after engine delete failure"
                );
            }
            return Err(engine_err.into());
        }

        DomainEvent::ClientDeleted {
            client_id: client.client_id,
        }
        .emit();

        Ok(())
    }

    /// Check whether a client id is known to either store.
    pub async fn exists(&self, client_id: &str) -> Result<bool, RegistryError> {
        if self.clients.client_id_exists(client_id).await? {
            return Ok(true);
        }
        Ok(self.engine.client_exists(client_id).await?)
    }

    /// Fetch a client scoped by owner. A client owned by someone else is
    /// reported as not found, never as forbidden.
    pub async fn get(&self, id: Uuid, owner_id: Uuid) -> Result<Client, RegistryError> {
        match self.clients.get_client(id).await? {
            Some(client) if client.owner_id == owner_id => Ok(client),
            _ => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Fetch a client scoped by tenant; same opacity rule as [`Self::get`].
    pub async fn get_for_tenant(
        &self,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Client, RegistryError> {
        match self.clients.get_client(id).await? {
            Some(client) if client.organization_id == organization_id => Ok(client),
            _ => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Client>, RegistryError> {
        Ok(self.clients.list_clients_by_owner(owner_id).await?)
    }

    /// Derive a unique client id from the display name, retrying with a
    /// random suffix while either store reports a collision.
    async fn allocate_client_id(&self, display_name: &str) -> Result<String, RegistryError> {
        let base = slugify(display_name);
        let mut candidate = base.clone();

        for _ in 0..CLIENT_ID_MAX_ATTEMPTS {
            if !self.exists(&candidate).await? {
                return Ok(candidate);
            }
            candidate = format!("{}-{}", base, random_suffix());
        }

        Err(RegistryError::ClientIdExhausted(display_name.to_string()))
    }
}

fn parse_redirect_uris(raw: &[String]) -> Result<Vec<RedirectUri>, RegistryError> {
    raw.iter()
        .map(|u| RedirectUri::new(u))
        .collect::<Result<Vec<_>, _>>()
        .map_err(RegistryError::from)
}

/// Set-difference merge: keep current URIs still present in the incoming
/// list (original order), append newly added ones, drop the rest.
fn merge_redirect_uris(current: &[RedirectUri], incoming: Vec<RedirectUri>) -> Vec<RedirectUri> {
    let mut merged: Vec<RedirectUri> = current
        .iter()
        .filter(|uri| incoming.contains(uri))
        .cloned()
        .collect();
    for uri in incoming {
        if !merged.contains(&uri) {
            merged.push(uri);
        }
    }
    merged
}

fn engine_record(client: &Client) -> EngineClientRecord {
    EngineClientRecord {
        client_id: client.client_id.clone(),
        display_name: client.display_name.clone(),
        client_type: client_type_label(client.client_type).to_string(),
        secret_hash: client.secret.as_ref().map(|s| s.hash().to_string()),
        redirect_uris: client
            .redirect_uris
            .iter()
            .map(|u| u.as_str().to_string())
            .collect(),
        allowed_scopes: client.allowed_scopes.clone(),
        require_pkce: client.requires_pkce(),
    }
}

/// Lowercase, spaces/underscores to hyphens, strip everything outside
/// `[a-z0-9-]`, collapse runs of hyphens.
fn slugify(display_name: &str) -> String {
    let mut slug = String::with_capacity(display_name.len());
    let mut last_hyphen = true; // suppress leading hyphen
    for c in display_name.to_lowercase().chars() {
        let mapped = match c {
            ' ' | '_' => Some('-'),
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => Some(c),
            '-' => Some('-'),
            _ => None,
        };
        if let Some(c) = mapped {
            if c == '-' {
                if !last_hyphen {
                    slug.push('-');
                    last_hyphen = true;
                }
            } else {
                slug.push(c);
                last_hyphen = false;
            }
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "client".to_string()
    } else {
        slug
    }
}

/// 8 hex characters of a fresh random identifier
fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
