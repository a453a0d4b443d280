//! Organization aggregate: the tenant isolation boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

use super::events::DomainEvent;

/// Typed view over the opaque organization settings blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default)]
    pub allow_self_signup: bool,
    /// Any additional settings pass through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for OrganizationSettings {
    fn default() -> Self {
        Self {
            allow_self_signup: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// An organization owns users and OAuth clients. Subdomains are globally
/// unique and lowercase; the backing store enforces the uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub billing_plan: String,
    pub settings: OrganizationSettings,
}

impl Organization {
    /// Create a new organization, validating the subdomain shape.
    pub fn new(name: &str, subdomain: &str) -> Result<(Self, DomainEvent), DomainError> {
        let subdomain = validate_subdomain(subdomain)?;
        if name.trim().is_empty() {
            return Err(DomainError::InvalidOrganizationName(
                "value is empty".to_string(),
            ));
        }

        let org = Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            subdomain: subdomain.clone(),
            custom_domain: None,
            is_active: true,
            created_at: Utc::now(),
            billing_plan: "free".to_string(),
            settings: OrganizationSettings::default(),
        };
        let event = DomainEvent::OrganizationCreated {
            organization_id: org.id,
            subdomain,
        };
        Ok((org, event))
    }
}

/// Lowercase, `[a-z0-9-]`, no leading/trailing hyphen, 1..=63 chars.
fn validate_subdomain(raw: &str) -> Result<String, DomainError> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() || normalized.len() > 63 {
        return Err(DomainError::InvalidSubdomain(
            "must be 1-63 characters".to_string(),
        ));
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DomainError::InvalidSubdomain(format!(
            "'{}' contains characters outside [a-z0-9-]",
            normalized
        )));
    }
    if normalized.starts_with('-') || normalized.ends_with('-') {
        return Err(DomainError::InvalidSubdomain(
            "must not start or end with a hyphen".to_string(),
        ));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization_defaults() {
        let (org, event) = Organization::new("Acme Corp", "Acme").unwrap();
        assert_eq!(org.subdomain, "acme");
        assert!(org.is_active);
        assert!(!org.settings.allow_self_signup);
        assert!(matches!(event, DomainEvent::OrganizationCreated { .. }));
    }

    #[test]
    fn test_empty_name_rejected_as_name_error() {
        let result = Organization::new("   ", "acme");
        assert!(matches!(
            result,
            Err(DomainError::InvalidOrganizationName(_))
        ));
    }

    #[test]
    fn test_subdomain_rejects_invalid_characters() {
        assert!(Organization::new("Acme", "acme corp").is_err());
        assert!(Organization::new("Acme", "acme.corp").is_err());
        assert!(Organization::new("Acme", "-acme").is_err());
        assert!(Organization::new("Acme", "").is_err());
    }

    #[test]
    fn test_settings_roundtrip_preserves_unknown_keys() {
        let settings: OrganizationSettings = serde_json::from_value(serde_json::json!({
            "allow_self_signup": true,
            "theme": "dark"
        }))
        .unwrap();
        assert!(settings.allow_self_signup);
        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["theme"], "dark");
    }
}
