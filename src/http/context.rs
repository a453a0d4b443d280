//! Application state shared across request handlers.

use std::sync::Arc;

use crate::bridge::AuthorizationBridge;
use crate::config::Config;
use crate::domain::PasswordHasher;
use crate::engine::ProtocolEngine;
use crate::registry::ClientRegistry;
use crate::storage::AuthStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Storage for organizations, users, clients, tokens, and sessions
    pub storage: Arc<dyn AuthStorage>,
    /// Dual-write client registry (domain store + protocol engine)
    pub registry: Arc<ClientRegistry>,
    /// Bearer-to-cookie authorization bridge
    pub bridge: Arc<AuthorizationBridge>,
    /// OAuth protocol engine honoring the /connect endpoints
    pub engine: Arc<dyn ProtocolEngine>,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub fn new(config: Arc<Config>, storage: Arc<dyn AuthStorage>, engine: Arc<dyn ProtocolEngine>) -> Self {
        let hasher = PasswordHasher::new();
        let registry = Arc::new(ClientRegistry::new(
            storage.clone(),
            engine.clone(),
            hasher.clone(),
        ));
        let bridge = Arc::new(AuthorizationBridge::new(
            storage.clone(),
            *config.session_ttl.as_ref(),
        ));
        Self {
            config,
            storage,
            registry,
            bridge,
            engine,
            hasher,
        }
    }
}
