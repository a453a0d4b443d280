//! Authorization bridge.
//!
//! The API surface authenticates with bearer tokens while the protocol
//! engine's authorize flow is cookie/redirect based. The bridge converts a
//! bearer-authenticated identity into a short-lived cookie session that the
//! `/connect/authorize` handler accepts, guarding the `returnUrl` the
//! caller supplies against open redirects and cross-tenant clients.

use std::sync::Arc;

use crate::domain::User;
use crate::engine::generate_token;
use crate::errors::BridgeError;
use crate::storage::traits::{AuthStorage, BridgeSession};
use crate::tenant::TenantResolution;

/// Name of the bridge session cookie
pub const SESSION_COOKIE: &str = "tenauth_session";

pub struct AuthorizationBridge {
    storage: Arc<dyn AuthStorage>,
    session_ttl: chrono::Duration,
}

impl AuthorizationBridge {
    pub fn new(storage: Arc<dyn AuthStorage>, session_ttl: chrono::Duration) -> Self {
        Self {
            storage,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        self.session_ttl
    }

    /// Establish a cookie session for a bearer-authenticated user.
    ///
    /// The return URL must pass the open-redirect guard, the client it
    /// names must exist, and when the request resolved to a tenant, the
    /// client must belong to that tenant.
    pub async fn establish_session(
        &self,
        user: &User,
        return_url: &str,
        tenant: TenantResolution,
    ) -> Result<BridgeSession, BridgeError> {
        let client_id = validate_return_url(return_url)?;

        let client = self
            .storage
            .get_client_by_client_id(&client_id)
            .await?
            .ok_or_else(|| BridgeError::UnknownClient(client_id.clone()))?;

        // Cross-tenant guard: a user from one organization must not be able
        // to complete an authorize flow against another organization's
        // client, even with a valid token
        if let Some(organization_id) = tenant.organization_id() {
            if client.organization_id != organization_id {
                return Err(BridgeError::CrossTenant { client_id });
            }
        }
        if client.organization_id != user.organization_id {
            return Err(BridgeError::CrossTenant { client_id });
        }

        let now = chrono::Utc::now();
        let session = BridgeSession {
            session_id: generate_token(),
            user_id: user.id,
            organization_id: user.organization_id,
            email: user.email.as_str().to_string(),
            display_name: user.display_name(),
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.storage.store_session(&session).await?;

        tracing::debug!(
            user_id = %user.id,
            client_id = %client_id,
            "bridge session established"
        );

        Ok(session)
    }

    /// Look up an active session. Expired or unknown ids yield `NoSession`.
    pub async fn session(&self, session_id: &str) -> Result<BridgeSession, BridgeError> {
        self.storage
            .get_session(session_id)
            .await?
            .ok_or(BridgeError::NoSession)
    }

    /// Remove a session (logout). Removing an unknown session is not an
    /// error.
    pub async fn end_session(&self, session_id: &str) -> Result<(), BridgeError> {
        self.storage.remove_session(session_id).await?;
        Ok(())
    }
}

/// Open-redirect guard. The only acceptable return URL is a relative path
/// into this deployment's own authorize endpoint. Absolute URLs,
/// scheme-relative `//host` forms, and backslash obfuscation are all
/// rejected. Returns the `client_id` named by the URL.
pub fn validate_return_url(return_url: &str) -> Result<String, BridgeError> {
    if return_url.contains('\\') {
        return Err(BridgeError::OpenRedirect(return_url.to_string()));
    }
    if return_url.starts_with("//") {
        return Err(BridgeError::OpenRedirect(return_url.to_string()));
    }
    // The prefix must end at a path or query boundary so siblings like
    // /connect/authorizefoo do not slip through
    match return_url.strip_prefix("/connect/authorize") {
        Some(rest) if rest.is_empty() || rest.starts_with('?') || rest.starts_with('/') => {}
        _ => return Err(BridgeError::OpenRedirect(return_url.to_string())),
    }

    let client_id = return_url
        .split_once('?')
        .and_then(|(_, query)| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "client_id")
                .map(|(_, value)| value.to_string())
        })
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::OpenRedirect(return_url.to_string()))?;

    Ok(client_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Client, ClientType, Email, Organization, RedirectUri};
    use crate::storage::MemoryAuthStorage;
    use crate::storage::traits::{ClientStore, OrganizationStore, UserStore};
    use uuid::Uuid;

    async fn seed_world(storage: &MemoryAuthStorage) -> (User, Client, Uuid) {
        let (org, _) = Organization::new("Acme", "acme").unwrap();
        storage.store_organization(&org).await.unwrap();

        let (user, _) = User::new(
            Email::new("a@acme.com").unwrap(),
            "hash".to_string(),
            "Ada",
            "Admin",
            org.id,
            true,
        );
        storage.store_user(&user).await.unwrap();

        let client = Client::new(
            "demo".to_string(),
            "Demo",
            ClientType::Public,
            None,
            user.id,
            org.id,
            vec![RedirectUri::new("https://localhost:5173/cb").unwrap()],
            vec!["openid".to_string()],
        )
        .unwrap();
        storage.store_client(&client).await.unwrap();

        (user, client, org.id)
    }

    #[test]
    fn test_return_url_guard_rejects_escapes() {
        for bad in [
            "https://evil.com/connect/authorize?client_id=demo",
            "//evil.com/connect/authorize?client_id=demo",
            "/admin",
            "/connect/authorize\\..?client_id=demo",
            "/connect/authorize",
            "/connect/authorizefoo?client_id=demo",
        ] {
            assert!(
                matches!(validate_return_url(bad), Err(BridgeError::OpenRedirect(_))),
                "expected rejection: {bad}"
            );
        }
    }

    #[test]
    fn test_return_url_guard_accepts_authorize_path() {
        let client_id =
            validate_return_url("/connect/authorize?client_id=demo&response_type=code").unwrap();
        assert_eq!(client_id, "demo");
    }

    #[tokio::test]
    async fn test_establish_session_sets_ttl() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let (user, _, org_id) = seed_world(&storage).await;
        let bridge = AuthorizationBridge::new(storage.clone(), chrono::Duration::minutes(10));

        let session = bridge
            .establish_session(
                &user,
                "/connect/authorize?client_id=demo",
                TenantResolution::Resolved(org_id),
            )
            .await
            .unwrap();

        assert_eq!(session.expires_at - session.created_at, chrono::Duration::minutes(10));
        assert_eq!(
            bridge.session(&session.session_id).await.unwrap().user_id,
            user.id
        );
    }

    #[tokio::test]
    async fn test_cross_tenant_client_rejected() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let (user, _, _) = seed_world(&storage).await;

        let (other_org, _) = Organization::new("Globex", "globex").unwrap();
        storage.store_organization(&other_org).await.unwrap();

        let bridge = AuthorizationBridge::new(storage.clone(), chrono::Duration::minutes(10));
        let result = bridge
            .establish_session(
                &user,
                "/connect/authorize?client_id=demo",
                TenantResolution::Resolved(other_org.id),
            )
            .await;

        assert!(matches!(result, Err(BridgeError::CrossTenant { .. })));
    }

    #[tokio::test]
    async fn test_unknown_client_rejected() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let (user, _, org_id) = seed_world(&storage).await;
        let bridge = AuthorizationBridge::new(storage.clone(), chrono::Duration::minutes(10));

        let result = bridge
            .establish_session(
                &user,
                "/connect/authorize?client_id=ghost",
                TenantResolution::Resolved(org_id),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::UnknownClient(_))));
    }

    #[tokio::test]
    async fn test_ended_session_stops_resolving() {
        let storage = Arc::new(MemoryAuthStorage::new());
        let (user, _, org_id) = seed_world(&storage).await;
        let bridge = AuthorizationBridge::new(storage.clone(), chrono::Duration::minutes(10));

        let session = bridge
            .establish_session(
                &user,
                "/connect/authorize?client_id=demo",
                TenantResolution::Resolved(org_id),
            )
            .await
            .unwrap();

        bridge.end_session(&session.session_id).await.unwrap();
        assert!(matches!(
            bridge.session(&session.session_id).await,
            Err(BridgeError::NoSession)
        ));
    }
}
