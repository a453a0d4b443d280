//! Domain events collected by aggregates and drained by the use cases.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Events emitted by the user, client, and organization aggregates.
///
/// Use cases drain these after a successful store write and surface them
/// through `tracing`; they never drive control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    OrganizationCreated {
        organization_id: Uuid,
        subdomain: String,
    },
    UserRegistered {
        user_id: Uuid,
        organization_id: Uuid,
    },
    UserAuthenticated {
        user_id: Uuid,
        organization_id: Uuid,
        at: DateTime<Utc>,
    },
    ClientRegistered {
        client_id: String,
        organization_id: Uuid,
    },
    ClientUpdated {
        client_id: String,
    },
    ClientDeleted {
        client_id: String,
    },
}

impl DomainEvent {
    /// Log the event at info level with structured fields.
    pub fn emit(&self) {
        match self {
            DomainEvent::OrganizationCreated {
                organization_id,
                subdomain,
            } => {
                tracing::info!(%organization_id, %subdomain, "organization created");
            }
            DomainEvent::UserRegistered {
                user_id,
                organization_id,
            } => {
                tracing::info!(%user_id, %organization_id, "user registered");
            }
            DomainEvent::UserAuthenticated {
                user_id,
                organization_id,
                at,
            } => {
                tracing::info!(%user_id, %organization_id, %at, "user authenticated");
            }
            DomainEvent::ClientRegistered {
                client_id,
                organization_id,
            } => {
                tracing::info!(%client_id, %organization_id, "client registered");
            }
            DomainEvent::ClientUpdated { client_id } => {
                tracing::info!(%client_id, "client updated");
            }
            DomainEvent::ClientDeleted { client_id } => {
                tracing::info!(%client_id, "client deleted");
            }
        }
    }
}
