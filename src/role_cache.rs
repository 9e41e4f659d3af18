use crate::events::RoleEvent;
use crate::role::Role;
use crate::types::{RoleId, UserId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-user cache of resolved role lists.
///
/// Entries expire after a fixed TTL. Wire [`handle_event`] to a
/// [`RoleResolver`] observer so role mutations evict stale entries: an update
/// evicts only users holding the updated role, while create/delete clear the
/// whole cache because any cached list might reference an inheritance chain
/// whose membership changed.
///
/// [`handle_event`]: RoleCache::handle_event
/// [`RoleResolver`]: crate::RoleResolver
#[derive(Debug)]
pub struct RoleCache {
    entries: Mutex<HashMap<UserId, CacheEntry>>,
    ttl: Duration,
}

#[derive(Debug)]
struct CacheEntry {
    roles: Vec<Role>,
    cached_at: Instant,
}

impl RoleCache {
    /// Creates a cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the cached role list for a user, evicting it if expired.
    pub fn get(&self, user: &UserId) -> Option<Vec<Role>> {
        let mut guard = self.entries.lock().expect("poisoned lock");
        let entry = guard.get(user)?;
        if entry.cached_at.elapsed() > self.ttl {
            guard.remove(user);
            return None;
        }
        Some(entry.roles.clone())
    }

    /// Caches a user's resolved role list.
    pub fn set(&self, user: UserId, roles: Vec<Role>) {
        let mut guard = self.entries.lock().expect("poisoned lock");
        guard.insert(
            user,
            CacheEntry {
                roles,
                cached_at: Instant::now(),
            },
        );
    }

    /// Evicts a single user's entry.
    pub fn invalidate(&self, user: &UserId) {
        let mut guard = self.entries.lock().expect("poisoned lock");
        guard.remove(user);
    }

    /// Evicts every entry whose role list contains `role`.
    ///
    /// Linear over cached users; fine for a single node. A secondary index
    /// keyed by role id would avoid the scan.
    pub fn invalidate_role(&self, role: RoleId) {
        let mut guard = self.entries.lock().expect("poisoned lock");
        guard.retain(|_, entry| !entry.roles.iter().any(|cached| cached.id == role));
    }

    /// Evicts everything.
    pub fn invalidate_all(&self) {
        let mut guard = self.entries.lock().expect("poisoned lock");
        guard.clear();
    }

    /// Applies a role-mutation event to the cache.
    pub fn handle_event(&self, event: &RoleEvent) {
        match event {
            RoleEvent::Updated(role) => self.invalidate_role(role.id),
            RoleEvent::Created(_) | RoleEvent::Deleted(_) => self.invalidate_all(),
        }
    }
}
