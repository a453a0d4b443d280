//! Tenant resolution.
//!
//! Derives the active organization for a request from, in strict precedence
//! order: the `X-Tenant` header, the `tenant` query parameter, the host
//! subdomain, and finally the `org` claim carried by the caller's bearer
//! token. A present higher-priority signal that fails lookup terminates
//! resolution as `Unresolved` rather than falling through.

use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;
use uuid::Uuid;

use crate::errors::StorageError;
use crate::http::context::AppState;
use crate::storage::traits::OrganizationStore;

/// Outcome of tenant resolution. Absence is not an error at this layer;
/// callers decide whether an unresolved tenant is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantResolution {
    Resolved(Uuid),
    Unresolved,
}

impl TenantResolution {
    pub fn organization_id(&self) -> Option<Uuid> {
        match self {
            TenantResolution::Resolved(id) => Some(*id),
            TenantResolution::Unresolved => None,
        }
    }
}

/// Raw tenant signals extracted from one request.
#[derive(Debug, Clone, Default)]
pub struct TenantSignals {
    /// `X-Tenant` header value
    pub header: Option<String>,
    /// `tenant` query parameter
    pub query: Option<String>,
    /// Request host, port stripped
    pub host: Option<String>,
    /// `org` claim from an authenticated bearer token
    pub token_org: Option<Uuid>,
}

impl TenantSignals {
    /// Extract header/query/host signals from request parts. The bearer
    /// claim is filled in separately by callers that authenticated the
    /// request.
    pub fn from_parts(parts: &Parts) -> Self {
        let header = parts
            .headers
            .get("x-tenant")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let query = parts.uri.query().and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "tenant")
                .map(|(_, value)| value.to_string())
        });

        let host = parts
            .headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());

        Self {
            header,
            query,
            host,
            token_org: None,
        }
    }

    pub fn with_token_org(mut self, token_org: Option<Uuid>) -> Self {
        self.token_org = token_org;
        self
    }
}

/// Resolve the active organization for a request.
///
/// Each signal is consulted in precedence order; the first *present* signal
/// decides the outcome. Only active organizations resolve.
pub async fn resolve_tenant(
    signals: &TenantSignals,
    orgs: &dyn OrganizationStore,
) -> Result<TenantResolution, StorageError> {
    if let Some(value) = &signals.header {
        return lookup_identifier(value, orgs).await;
    }

    if let Some(value) = &signals.query {
        return lookup_identifier(value, orgs).await;
    }

    if let Some(subdomain) = host_subdomain(signals.host.as_deref()) {
        return lookup_active(orgs.get_organization_by_subdomain(&subdomain).await?);
    }

    if let Some(org_id) = signals.token_org {
        return lookup_active(orgs.get_organization(org_id).await?);
    }

    Ok(TenantResolution::Unresolved)
}

/// Header and query values are tried as a UUID first, then as a subdomain.
async fn lookup_identifier(
    value: &str,
    orgs: &dyn OrganizationStore,
) -> Result<TenantResolution, StorageError> {
    let found = if let Ok(id) = Uuid::parse_str(value) {
        orgs.get_organization(id).await?
    } else {
        orgs.get_organization_by_subdomain(&value.to_lowercase())
            .await?
    };
    lookup_active(found)
}

fn lookup_active(
    org: Option<crate::domain::Organization>,
) -> Result<TenantResolution, StorageError> {
    match org {
        Some(org) if org.is_active => Ok(TenantResolution::Resolved(org.id)),
        _ => Ok(TenantResolution::Unresolved),
    }
}

/// A host yields a subdomain signal only with at least three dot-separated
/// labels (`acme.auth.example.com` -> `acme`).
fn host_subdomain(host: Option<&str>) -> Option<String> {
    let host = host?;
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 3 && !labels[0].is_empty() {
        Some(labels[0].to_lowercase())
    } else {
        None
    }
}

/// Extractor resolving the tenant for a request, including the bearer
/// `org` claim when an Authorization header is present and valid. Never
/// rejects: absence of a tenant is a normal outcome.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedTenant(pub TenantResolution);

impl<S> FromRequestParts<S> for ResolvedTenant
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = crate::errors::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token_org = match bearer_token(parts) {
            Some(token) => app_state
                .storage
                .get_token(&token)
                .await?
                .map(|t| t.organization_id),
            None => None,
        };

        let signals = TenantSignals::from_parts(parts).with_token_org(token_org);
        let resolution = resolve_tenant(&signals, app_state.storage.as_ref()).await?;
        Ok(ResolvedTenant(resolution))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Organization;
    use crate::storage::MemoryAuthStorage;

    async fn seed_org(storage: &MemoryAuthStorage, subdomain: &str, active: bool) -> Uuid {
        let (mut org, _) = Organization::new("Org", subdomain).unwrap();
        org.is_active = active;
        storage.store_organization(&org).await.unwrap();
        org.id
    }

    #[tokio::test]
    async fn test_header_wins_over_query() {
        let storage = MemoryAuthStorage::new();
        let acme = seed_org(&storage, "acme", true).await;
        let _other = seed_org(&storage, "other", true).await;

        let signals = TenantSignals {
            header: Some("acme".to_string()),
            query: Some("other".to_string()),
            host: None,
            token_org: None,
        };
        let resolution = resolve_tenant(&signals, &storage).await.unwrap();
        assert_eq!(resolution, TenantResolution::Resolved(acme));
    }

    #[tokio::test]
    async fn test_failed_header_lookup_does_not_fall_through() {
        let storage = MemoryAuthStorage::new();
        let _other = seed_org(&storage, "other", true).await;

        let signals = TenantSignals {
            header: Some("missing".to_string()),
            query: Some("other".to_string()),
            host: None,
            token_org: None,
        };
        let resolution = resolve_tenant(&signals, &storage).await.unwrap();
        assert_eq!(resolution, TenantResolution::Unresolved);
    }

    #[tokio::test]
    async fn test_header_accepts_uuid_form() {
        let storage = MemoryAuthStorage::new();
        let acme = seed_org(&storage, "acme", true).await;

        let signals = TenantSignals {
            header: Some(acme.to_string()),
            query: None,
            host: None,
            token_org: None,
        };
        let resolution = resolve_tenant(&signals, &storage).await.unwrap();
        assert_eq!(resolution, TenantResolution::Resolved(acme));
    }

    #[tokio::test]
    async fn test_host_subdomain_requires_three_labels() {
        let storage = MemoryAuthStorage::new();
        let acme = seed_org(&storage, "acme", true).await;

        let with_subdomain = TenantSignals {
            host: Some("acme.auth.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_tenant(&with_subdomain, &storage).await.unwrap(),
            TenantResolution::Resolved(acme)
        );

        let bare = TenantSignals {
            host: Some("example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_tenant(&bare, &storage).await.unwrap(),
            TenantResolution::Unresolved
        );
    }

    #[tokio::test]
    async fn test_token_claim_is_last_resort() {
        let storage = MemoryAuthStorage::new();
        let acme = seed_org(&storage, "acme", true).await;

        let signals = TenantSignals {
            token_org: Some(acme),
            ..Default::default()
        };
        assert_eq!(
            resolve_tenant(&signals, &storage).await.unwrap(),
            TenantResolution::Resolved(acme)
        );
    }

    #[tokio::test]
    async fn test_inactive_organization_does_not_resolve() {
        let storage = MemoryAuthStorage::new();
        let dormant = seed_org(&storage, "dormant", false).await;

        let signals = TenantSignals {
            header: Some("dormant".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_tenant(&signals, &storage).await.unwrap(),
            TenantResolution::Unresolved
        );

        let by_token = TenantSignals {
            token_org: Some(dormant),
            ..Default::default()
        };
        assert_eq!(
            resolve_tenant(&by_token, &storage).await.unwrap(),
            TenantResolution::Unresolved
        );
    }
}
