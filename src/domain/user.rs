//! User aggregate. Email is globally unique; the owning organization is
//! fixed at creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::email::Email;
use super::events::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Owning organization; immutable after creation.
    pub organization_id: Uuid,
    pub is_organization_admin: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        email: Email,
        password_hash: String,
        first_name: &str,
        last_name: &str,
        organization_id: Uuid,
        is_organization_admin: bool,
    ) -> (Self, DomainEvent) {
        let user = Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            organization_id,
            is_organization_admin,
            created_at: Utc::now(),
            last_login_at: None,
        };
        let event = DomainEvent::UserRegistered {
            user_id: user.id,
            organization_id,
        };
        (user, event)
    }

    /// The only mutable profile fields.
    pub fn rename(&mut self, first_name: &str, last_name: &str) {
        self.first_name = first_name.trim().to_string();
        self.last_name = last_name.trim().to_string();
    }

    /// Record a successful authentication.
    pub fn record_login(&mut self, at: DateTime<Utc>) -> DomainEvent {
        self.last_login_at = Some(at);
        DomainEvent::UserAuthenticated {
            user_id: self.id,
            organization_id: self.organization_id,
            at,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let email = Email::new("a@acme.com").unwrap();
        User::new(email, "hash".to_string(), "Ada", "Lovelace", Uuid::new_v4(), true).0
    }

    #[test]
    fn test_new_user_has_no_login_timestamp() {
        let user = sample_user();
        assert!(user.last_login_at.is_none());
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_record_login_emits_event() {
        let mut user = sample_user();
        let now = Utc::now();
        let event = user.record_login(now);
        assert_eq!(user.last_login_at, Some(now));
        assert!(matches!(event, DomainEvent::UserAuthenticated { at, .. } if at == now));
    }
}
