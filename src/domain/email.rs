//! Email value object: normalized lowercase, RFC-shaped, length bounded.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Maximum length per RFC 5321 (path limits minus angle brackets)
const MAX_EMAIL_LENGTH: usize = 254;

/// Self-validating email address. Construction is the validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Normalize and validate a raw email string.
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(DomainError::InvalidEmail("value is empty".to_string()));
        }
        if normalized.len() > MAX_EMAIL_LENGTH {
            return Err(DomainError::InvalidEmail(format!(
                "value exceeds {} characters",
                MAX_EMAIL_LENGTH
            )));
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(DomainError::InvalidEmail("missing '@'".to_string()));
        };
        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::InvalidEmail(
                "empty local part or domain".to_string(),
            ));
        }
        if domain.contains('@') {
            return Err(DomainError::InvalidEmail("multiple '@'".to_string()));
        }
        // Domain must be dotted with non-empty labels
        if !domain.contains('.') || domain.split('.').any(|label| label.is_empty()) {
            return Err(DomainError::InvalidEmail(format!(
                "'{}' is not a valid domain",
                domain
            )));
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidEmail(
                "contains whitespace".to_string(),
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Email::new(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
