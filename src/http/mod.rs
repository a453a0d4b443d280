//! Axum HTTP server handlers and middleware for the management API and
//! the /connect protocol surface.

pub mod context;
mod handler_auth;
mod handler_clients;
mod handler_connect;
pub mod middleware_auth;
pub mod server;

pub use context::AppState;
pub use server::build_router;
