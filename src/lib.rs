//! Multi-tenant OAuth 2.1 authorization layer.
//!
//! Wraps an OAuth protocol engine with tenant-isolated organizations,
//! users, and client registrations, plus the bearer-to-cookie bridge that
//! lets API-authenticated users complete browser authorization flows.

pub mod bridge;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod http;
pub mod registry;
pub mod storage;
pub mod tenant;
