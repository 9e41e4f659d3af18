use crate::error::StoreError;
use crate::role::{NewRole, Role, RoleUpdate};
use crate::session::Session;
use crate::types::{RoleId, SessionId, UserId};
use async_trait::async_trait;

/// Store interface for durable session records.
///
/// The store is the source of truth; the in-memory session cache in front of
/// it is best-effort and may transiently diverge.
#[async_trait]
pub trait SessionStore {
    /// Persists a newly issued session.
    async fn insert_session(&self, session: &Session) -> std::result::Result<(), StoreError>;

    /// Loads a non-expired session by id. Absence is a normal negative result.
    async fn load_session(
        &self,
        id: &SessionId,
    ) -> std::result::Result<Option<Session>, StoreError>;

    /// Deletes a session by id.
    async fn delete_session(&self, id: &SessionId) -> std::result::Result<(), StoreError>;

    /// Deletes every session owned by a user.
    async fn delete_user_sessions(&self, user: &UserId) -> std::result::Result<(), StoreError>;
}

/// Store interface for role definitions and user-role assignments.
#[async_trait]
pub trait RoleStore {
    /// Loads all role definitions, used to seed the resolver at startup.
    async fn load_roles(&self) -> std::result::Result<Vec<Role>, StoreError>;

    /// Persists a new role and returns the store-assigned id.
    async fn insert_role(&self, role: &NewRole) -> std::result::Result<RoleId, StoreError>;

    /// Persists a partial role update; absent fields keep their values.
    async fn update_role(&self, update: &RoleUpdate) -> std::result::Result<(), StoreError>;

    /// Deletes a role definition.
    async fn delete_role(&self, id: RoleId) -> std::result::Result<(), StoreError>;

    /// Returns the roles assigned to a user.
    async fn user_roles(&self, user: &UserId) -> std::result::Result<Vec<Role>, StoreError>;
}

/// Composite store trait.
pub trait Store: SessionStore + RoleStore + Send + Sync {}

impl<T> Store for T where T: SessionStore + RoleStore + Send + Sync {}
