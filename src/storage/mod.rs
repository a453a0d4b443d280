//! Trait-based storage abstractions with an in-memory backend.

pub mod inmemory;
pub mod traits;

pub use inmemory::MemoryAuthStorage;
pub use traits::*;

use crate::errors::StorageError;
use std::sync::Arc;

/// Storage backend configuration and factory
#[derive(Clone)]
pub enum StorageBackend {
    Memory,
}

/// Parse the configured backend name
pub fn parse_storage_backend(value: &str) -> std::result::Result<StorageBackend, StorageError> {
    match value {
        "memory" | "" => Ok(StorageBackend::Memory),
        other => Err(StorageError::Unavailable(format!(
            "Unknown storage backend: {}",
            other
        ))),
    }
}

/// Create a storage backend based on configuration
pub fn create_storage_backend(
    backend: StorageBackend,
) -> std::result::Result<Arc<dyn AuthStorage>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryAuthStorage::new())),
    }
}
