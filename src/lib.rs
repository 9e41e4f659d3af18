//! Access-control core: session issuance and validation, role-based
//! permission resolution with caching, and a request-rate guard for
//! authentication endpoints.
//!
//! The durable store is the source of truth and is reached through the
//! pluggable async [`Store`] traits; the session cache, role cache, and
//! permission cache in front of it are best-effort accelerators with
//! independent keys and invalidation triggers. Every ambiguous state, such
//! as a decode error or a failed role lookup, resolves to denial, never to
//! implicit allow.
//!
//! # Examples
//!
//! Wiring the gate over the in-memory store (enable `memory-store`):
//! ```no_run
//! use authgate::{AuthConfig, AuthGate, Permission, UserId};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use authgate::MemoryStore;
//! # futures::executor::block_on(async {
//! let store = MemoryStore::new();
//! let gate = AuthGate::connect(store, AuthConfig::new("secret")).await.unwrap();
//! let session = gate.sign_in(UserId::new("user_1").unwrap()).await.unwrap();
//! let permission = Permission::new("users:read:own").unwrap();
//! let _ = gate.check(&session.access_token, Some(&permission), true).await;
//! # });
//! # }
//! ```
#![forbid(unsafe_code)]

mod config;
mod error;
mod events;
mod gate;
mod permission;
mod rate_limit;
mod resolver;
mod role;
mod role_cache;
mod session;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::config::AuthConfig;
pub use crate::error::{Error, Result, StoreError};
pub use crate::events::{RoleEvent, RoleObserver};
pub use crate::gate::{AuthGate, AuthenticatedUser, Decision, GateOutcome};
pub use crate::permission::{DefaultPermissionValidator, Permission, PermissionValidator, WILDCARD};
pub use crate::rate_limit::RateLimiter;
pub use crate::resolver::RoleResolver;
pub use crate::role::{NewRole, Role, RoleUpdate};
pub use crate::role_cache::RoleCache;
pub use crate::session::{Session, SessionManager};
pub use crate::store::{RoleStore, SessionStore, Store};
pub use crate::types::{RoleId, RoleName, SessionId, UserId};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
