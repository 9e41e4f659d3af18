use crate::error::StoreError;
use crate::role::{NewRole, Role, RoleUpdate};
use crate::session::Session;
use crate::store::{RoleStore, SessionStore};
use crate::types::{RoleId, SessionId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

/// In-memory store implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: RwLock<HashMap<SessionId, Session>>,
    roles: RwLock<HashMap<RoleId, Role>>,
    assignments: RwLock<HashMap<UserId, Vec<RoleId>>>,
    next_role_id: Mutex<i64>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a role definition directly, returning its assigned id.
    pub fn seed_role(&self, role: NewRole) -> RoleId {
        let id = self.next_role_id();
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        guard.insert(id, role.into_role(id));
        id
    }

    /// Assigns a role to a user.
    pub fn assign_role(&self, user: UserId, role: RoleId) {
        let mut guard = self.inner.assignments.write().expect("poisoned lock");
        guard.entry(user).or_default().push(role);
    }

    /// Removes a role assignment from a user.
    pub fn unassign_role(&self, user: &UserId, role: RoleId) {
        let mut guard = self.inner.assignments.write().expect("poisoned lock");
        if let Some(roles) = guard.get_mut(user) {
            roles.retain(|assigned| *assigned != role);
        }
    }

    fn next_role_id(&self) -> RoleId {
        let mut guard = self.inner.next_role_id.lock().expect("poisoned lock");
        *guard += 1;
        RoleId::new(*guard)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.sessions.write().expect("poisoned lock");
        guard.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(
        &self,
        id: &SessionId,
    ) -> std::result::Result<Option<Session>, StoreError> {
        let guard = self.inner.sessions.read().expect("poisoned lock");
        Ok(guard
            .get(id)
            .filter(|session| session.expires_at > SystemTime::now())
            .cloned())
    }

    async fn delete_session(&self, id: &SessionId) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.sessions.write().expect("poisoned lock");
        guard.remove(id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user: &UserId) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.sessions.write().expect("poisoned lock");
        guard.retain(|_, session| &session.user_id != user);
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn load_roles(&self) -> std::result::Result<Vec<Role>, StoreError> {
        let guard = self.inner.roles.read().expect("poisoned lock");
        Ok(guard.values().cloned().collect())
    }

    async fn insert_role(&self, role: &NewRole) -> std::result::Result<RoleId, StoreError> {
        let id = self.next_role_id();
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        guard.insert(id, role.clone().into_role(id));
        Ok(id)
    }

    async fn update_role(&self, update: &RoleUpdate) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        if let Some(role) = guard.get_mut(&update.id) {
            update.apply_to(role);
        }
        Ok(())
    }

    async fn delete_role(&self, id: RoleId) -> std::result::Result<(), StoreError> {
        let mut guard = self.inner.roles.write().expect("poisoned lock");
        guard.remove(&id);
        Ok(())
    }

    async fn user_roles(&self, user: &UserId) -> std::result::Result<Vec<Role>, StoreError> {
        let assignments = self.inner.assignments.read().expect("poisoned lock");
        let roles = self.inner.roles.read().expect("poisoned lock");
        Ok(assignments
            .get(user)
            .map(|ids| ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;
    use crate::types::RoleName;
    use futures::executor::block_on;
    use std::collections::HashSet;

    #[test]
    fn memory_store_should_support_basic_flow() {
        let store = MemoryStore::new();
        let user = UserId::new("user_1").unwrap();
        let role = store.seed_role(NewRole {
            name: RoleName::new("member").unwrap(),
            permissions: HashSet::from([Permission::try_from("users:read:own").unwrap()]),
            inherits: Vec::new(),
            description: String::new(),
        });
        store.assign_role(user.clone(), role);

        let roles = block_on(store.user_roles(&user)).unwrap();

        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id, role);
    }

    #[test]
    fn unassign_removes_only_that_role() {
        let store = MemoryStore::new();
        let user = UserId::new("user_1").unwrap();
        let first = store.seed_role(NewRole {
            name: RoleName::new("member").unwrap(),
            permissions: HashSet::new(),
            inherits: Vec::new(),
            description: String::new(),
        });
        let second = store.seed_role(NewRole {
            name: RoleName::new("editor").unwrap(),
            permissions: HashSet::new(),
            inherits: Vec::new(),
            description: String::new(),
        });
        store.assign_role(user.clone(), first);
        store.assign_role(user.clone(), second);

        store.unassign_role(&user, first);

        let roles = block_on(store.user_roles(&user)).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].id, second);
    }
}
