use crate::error::{Error, Result};
use crate::events::{RoleEvent, RoleObserver};
use crate::permission::Permission;
use crate::role::{NewRole, Role, RoleUpdate};
use crate::store::RoleStore;
use crate::types::RoleId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Role-based permission resolver.
///
/// Holds the full role graph in memory (seeded from the store, kept current
/// by the mutation operations) and caches resolved effective-permission sets
/// per role id. Every mutation persists through the store first, then updates
/// the in-memory graph, drops the permission cache, and notifies registered
/// observers.
pub struct RoleResolver<S> {
    store: S,
    roles: RwLock<HashMap<RoleId, Role>>,
    permission_cache: RwLock<PermissionCache>,
    observers: RwLock<Vec<RoleObserver>>,
}

/// Cached effective-permission sets, tagged with an invalidation generation.
///
/// The generation is bumped on every clear. A set resolved against an older
/// generation must not be inserted: the graph it was computed from is gone.
#[derive(Default)]
struct PermissionCache {
    entries: HashMap<RoleId, Arc<HashSet<Permission>>>,
    generation: u64,
}

impl<S> RoleResolver<S>
where
    S: RoleStore + Send + Sync,
{
    /// Creates a resolver seeded with the store's role definitions.
    pub async fn load(store: S) -> Result<Self> {
        let roles = store.load_roles().await.map_err(Error::from)?;
        Ok(Self::with_roles(store, roles))
    }

    /// Creates a resolver from an already-loaded role list.
    pub fn with_roles(store: S, roles: Vec<Role>) -> Self {
        Self {
            store,
            roles: RwLock::new(roles.into_iter().map(|role| (role.id, role)).collect()),
            permission_cache: RwLock::new(PermissionCache::default()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Registers an observer invoked synchronously on every role mutation.
    pub fn on_role_changed(&self, observer: impl Fn(&RoleEvent) + Send + Sync + 'static) {
        let mut guard = self.observers.write().expect("poisoned lock");
        guard.push(Box::new(observer));
    }

    /// Returns a role definition by id.
    pub fn role(&self, id: RoleId) -> Option<Role> {
        let guard = self.roles.read().expect("poisoned lock");
        guard.get(&id).cloned()
    }

    /// Returns whether a role grants `required`, via the full wildcard or the
    /// exact permission token.
    pub fn has_permission(&self, role: RoleId, required: &Permission) -> bool {
        self.effective_permissions(role)
            .iter()
            .any(|granted| granted.grants(required))
    }

    /// Resolves the effective permission set for a role: its own permissions
    /// unioned with those of every transitively inherited role.
    ///
    /// Inherited roles are looked up by name among all known roles. A visited
    /// set keyed by role id guarantees termination on cyclic or
    /// self-referential inheritance graphs. The result is cached until the
    /// next role mutation; a set resolved concurrently with a mutation is
    /// returned to the caller but never cached.
    pub fn effective_permissions(&self, role: RoleId) -> Arc<HashSet<Permission>> {
        let generation = {
            let cache = self.permission_cache.read().expect("poisoned lock");
            if let Some(cached) = cache.entries.get(&role) {
                return Arc::clone(cached);
            }
            cache.generation
        };

        let resolved = {
            let roles = self.roles.read().expect("poisoned lock");
            let mut visited = HashSet::new();
            let mut permissions = HashSet::new();
            collect_permissions(&roles, role, &mut visited, &mut permissions);
            Arc::new(permissions)
        };

        self.cache_resolution(role, generation, Arc::clone(&resolved));
        resolved
    }

    /// Persists a new role, adds it to the in-memory graph, and emits
    /// [`RoleEvent::Created`].
    pub async fn create_role(&self, data: NewRole) -> Result<RoleId> {
        let id = self
            .store
            .insert_role(&data)
            .await
            .map_err(Error::RoleCreation)?;
        let role = data.into_role(id);
        self.roles
            .write()
            .expect("poisoned lock")
            .insert(id, role.clone());
        tracing::info!(role = %id, name = %role.name, "role created");
        self.emit(RoleEvent::Created(role));
        Ok(id)
    }

    /// Persists a partial role update, merges it over the in-memory entry,
    /// and emits [`RoleEvent::Updated`].
    pub async fn update_role(&self, update: RoleUpdate) -> Result<()> {
        self.store
            .update_role(&update)
            .await
            .map_err(|source| Error::RoleUpdate {
                id: update.id,
                source,
            })?;

        let merged = {
            let mut roles = self.roles.write().expect("poisoned lock");
            roles.get_mut(&update.id).map(|role| {
                update.apply_to(role);
                role.clone()
            })
        };

        if let Some(role) = merged {
            tracing::info!(role = %role.id, "role updated");
            self.emit(RoleEvent::Updated(role));
        }
        Ok(())
    }

    /// Persists a role deletion, removes the in-memory entry, and emits
    /// [`RoleEvent::Deleted`].
    pub async fn delete_role(&self, id: RoleId) -> Result<()> {
        self.store
            .delete_role(id)
            .await
            .map_err(|source| Error::RoleDeletion { id, source })?;
        self.roles.write().expect("poisoned lock").remove(&id);
        tracing::info!(role = %id, "role deleted");
        self.emit(RoleEvent::Deleted(id));
        Ok(())
    }

    /// Drops every cached effective-permission set.
    pub fn clear_permission_cache(&self) {
        let mut cache = self.permission_cache.write().expect("poisoned lock");
        cache.generation += 1;
        cache.entries.clear();
    }

    fn cache_resolution(&self, role: RoleId, generation: u64, resolved: Arc<HashSet<Permission>>) {
        let mut cache = self.permission_cache.write().expect("poisoned lock");
        // A mutation may have invalidated the cache while this set was being
        // resolved; inserting it now would pin a stale grant.
        if cache.generation == generation {
            cache.entries.insert(role, resolved);
        }
    }

    fn emit(&self, event: RoleEvent) {
        // The resolver consumes its own events before anyone else does.
        self.clear_permission_cache();
        let observers = self.observers.read().expect("poisoned lock");
        for observer in observers.iter() {
            observer(&event);
        }
    }
}

fn collect_permissions(
    roles: &HashMap<RoleId, Role>,
    id: RoleId,
    visited: &mut HashSet<RoleId>,
    permissions: &mut HashSet<Permission>,
) {
    if !visited.insert(id) {
        return;
    }
    let Some(role) = roles.get(&id) else {
        // Unknown role ids resolve to the empty set.
        return;
    };
    permissions.extend(role.permissions.iter().cloned());
    for parent_name in &role.inherits {
        // Inherited names that match no known role are skipped.
        if let Some(parent) = roles.values().find(|candidate| &candidate.name == parent_name) {
            collect_permissions(roles, parent.id, visited, permissions);
        }
    }
}
