//! Domain aggregates, value objects, and domain events for the
//! tenant-isolated client registry.

pub mod client;
pub mod client_secret;
pub mod email;
pub mod events;
pub mod organization;
pub mod password;
pub mod redirect_uri;
pub mod user;

pub use client::{Client, ClientType};
pub use client_secret::{ClientSecret, GeneratedSecret};
pub use email::Email;
pub use events::DomainEvent;
pub use organization::{Organization, OrganizationSettings};
pub use password::PasswordHasher;
pub use redirect_uri::RedirectUri;
pub use user::User;
