use crate::config::AuthConfig;
use crate::error::Result;
use crate::permission::Permission;
use crate::rate_limit::RateLimiter;
use crate::resolver::RoleResolver;
use crate::role::Role;
use crate::role_cache::RoleCache;
use crate::session::{Session, SessionManager};
use crate::store::Store;
use crate::types::{SessionId, UserId};
use std::sync::Arc;

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

/// Result of running a request through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Authenticated and, where required, authorized.
    Allowed(AuthenticatedUser),
    /// No valid session; maps to 401.
    Unauthenticated,
    /// Valid session but the required permission is missing; maps to 403.
    Forbidden,
}

/// Resolved identity attached to an authenticated request.
///
/// A user with zero roles is authenticated but holds no permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

/// Per-request composition of session validation, rate limiting, role
/// loading, and permission resolution.
///
/// The gate owns nothing durable; it wires the session manager, role
/// resolver, role cache, and rate limiter together and fails closed on every
/// ambiguous path.
pub struct AuthGate<S> {
    store: S,
    sessions: Arc<SessionManager<S>>,
    resolver: Arc<RoleResolver<S>>,
    role_cache: Arc<RoleCache>,
    rate_limiter: Arc<RateLimiter>,
}

impl<S> AuthGate<S>
where
    S: Store + Clone,
{
    /// Builds a fully wired gate over a store.
    ///
    /// Seeds the resolver from the store and registers the role cache as an
    /// observer so role mutations evict stale per-user entries.
    pub async fn connect(store: S, config: AuthConfig) -> Result<Self> {
        let resolver = Arc::new(RoleResolver::load(store.clone()).await?);
        let role_cache = Arc::new(RoleCache::new(config.role_cache_ttl));
        let observer_cache = Arc::clone(&role_cache);
        resolver.on_role_changed(move |event| observer_cache.handle_event(event));

        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_attempts,
        ));
        let sessions = Arc::new(SessionManager::new(store.clone(), config));

        Ok(Self {
            store,
            sessions,
            resolver,
            role_cache,
            rate_limiter,
        })
    }

    /// The session manager, for sign-in/sign-out wiring.
    pub fn sessions(&self) -> &Arc<SessionManager<S>> {
        &self.sessions
    }

    /// The role resolver, for role administration.
    pub fn resolver(&self) -> &Arc<RoleResolver<S>> {
        &self.resolver
    }

    /// The role cache.
    pub fn role_cache(&self) -> &Arc<RoleCache> {
        &self.role_cache
    }

    /// The rate limiter, shared with credential-check endpoints.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Issues a session for a user who passed the credential check.
    pub async fn sign_in(&self, user_id: UserId) -> Result<Session> {
        self.sessions.create_session(user_id).await
    }

    /// Revokes the session behind a presented token, if it validates.
    pub async fn sign_out(&self, token: &str) -> Result<Option<SessionId>> {
        let Some(session) = self.sessions.validate_session(token).await else {
            return Ok(None);
        };
        self.sessions.delete_session(&session.id).await?;
        Ok(Some(session.id))
    }

    /// Authenticates a presented token and resolves the user's roles.
    ///
    /// Returns `None` on rate-limit breach, invalid/revoked token, or a role
    /// lookup failure, all of which deny access.
    pub async fn authenticate(
        &self,
        token: &str,
        should_rate_limit: bool,
    ) -> Option<AuthenticatedUser> {
        if should_rate_limit && !self.rate_limiter.check_limit(&format!("validate:{token}")) {
            return None;
        }

        let session = self.sessions.validate_session(token).await?;
        let roles = self.user_roles(&session.user_id).await?;
        Some(AuthenticatedUser {
            user_id: session.user_id,
            roles,
        })
    }

    /// Checks whether any of the user's roles grants `required`.
    pub fn authorize(&self, user: &AuthenticatedUser, required: &Permission) -> Decision {
        let allowed = user
            .roles
            .iter()
            .any(|role| self.resolver.has_permission(role.id, required));
        if allowed {
            Decision::Allow
        } else {
            tracing::info!(
                user = %user.user_id,
                permission = %required,
                "authorization denied"
            );
            Decision::Deny
        }
    }

    /// Full per-request check: authenticate, then authorize when a
    /// permission is required.
    ///
    /// `required = None` authenticates without any permission check.
    pub async fn check(
        &self,
        token: &str,
        required: Option<&Permission>,
        should_rate_limit: bool,
    ) -> GateOutcome {
        let Some(user) = self.authenticate(token, should_rate_limit).await else {
            return GateOutcome::Unauthenticated;
        };
        if let Some(required) = required
            && self.authorize(&user, required) == Decision::Deny
        {
            return GateOutcome::Forbidden;
        }
        GateOutcome::Allowed(user)
    }

    async fn user_roles(&self, user: &UserId) -> Option<Vec<Role>> {
        if let Some(roles) = self.role_cache.get(user) {
            return Some(roles);
        }
        match self.store.user_roles(user).await {
            Ok(roles) => {
                self.role_cache.set(user.clone(), roles.clone());
                Some(roles)
            }
            Err(err) => {
                tracing::warn!(user = %user, error = %err, "role lookup failed; denying");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::role::{NewRole, RoleUpdate};
    use crate::types::{RoleId, RoleName};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default, Clone)]
    struct TestStore {
        inner: Arc<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        sessions: Mutex<HashMap<SessionId, Session>>,
        roles: Mutex<HashMap<RoleId, Role>>,
        assignments: Mutex<HashMap<UserId, Vec<RoleId>>>,
        next_role_id: Mutex<i64>,
        fail_role_reads: Mutex<bool>,
    }

    impl TestStore {
        fn seed_role(&self, name: &str, permissions: &[&str], inherits: &[&str]) -> RoleId {
            let mut next = self.inner.next_role_id.lock().unwrap();
            *next += 1;
            let id = RoleId::new(*next);
            let role = Role {
                id,
                name: RoleName::new(name).unwrap(),
                permissions: permissions
                    .iter()
                    .map(|p| Permission::try_from(*p).unwrap())
                    .collect(),
                inherits: inherits.iter().map(|n| RoleName::new(n).unwrap()).collect(),
                description: String::new(),
            };
            self.inner.roles.lock().unwrap().insert(id, role);
            id
        }

        fn assign(&self, user: &str, role: RoleId) {
            self.inner
                .assignments
                .lock()
                .unwrap()
                .entry(UserId::new(user).unwrap())
                .or_default()
                .push(role);
        }

        fn fail_role_reads(&self, on: bool) {
            *self.inner.fail_role_reads.lock().unwrap() = on;
        }
    }

    #[async_trait]
    impl crate::store::SessionStore for TestStore {
        async fn insert_session(
            &self,
            session: &Session,
        ) -> std::result::Result<(), StoreError> {
            self.inner
                .sessions
                .lock()
                .unwrap()
                .insert(session.id.clone(), session.clone());
            Ok(())
        }

        async fn load_session(
            &self,
            id: &SessionId,
        ) -> std::result::Result<Option<Session>, StoreError> {
            Ok(self.inner.sessions.lock().unwrap().get(id).cloned())
        }

        async fn delete_session(&self, id: &SessionId) -> std::result::Result<(), StoreError> {
            self.inner.sessions.lock().unwrap().remove(id);
            Ok(())
        }

        async fn delete_user_sessions(
            &self,
            user: &UserId,
        ) -> std::result::Result<(), StoreError> {
            self.inner
                .sessions
                .lock()
                .unwrap()
                .retain(|_, session| &session.user_id != user);
            Ok(())
        }
    }

    #[async_trait]
    impl crate::store::RoleStore for TestStore {
        async fn load_roles(&self) -> std::result::Result<Vec<Role>, StoreError> {
            Ok(self.inner.roles.lock().unwrap().values().cloned().collect())
        }

        async fn insert_role(&self, role: &NewRole) -> std::result::Result<RoleId, StoreError> {
            let mut next = self.inner.next_role_id.lock().unwrap();
            *next += 1;
            let id = RoleId::new(*next);
            self.inner
                .roles
                .lock()
                .unwrap()
                .insert(id, role.clone().into_role(id));
            Ok(id)
        }

        async fn update_role(&self, update: &RoleUpdate) -> std::result::Result<(), StoreError> {
            if let Some(role) = self.inner.roles.lock().unwrap().get_mut(&update.id) {
                update.apply_to(role);
            }
            Ok(())
        }

        async fn delete_role(&self, id: RoleId) -> std::result::Result<(), StoreError> {
            self.inner.roles.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn user_roles(&self, user: &UserId) -> std::result::Result<Vec<Role>, StoreError> {
            if *self.inner.fail_role_reads.lock().unwrap() {
                return Err("role read failed".into());
            }
            let assignments = self.inner.assignments.lock().unwrap();
            let roles = self.inner.roles.lock().unwrap();
            Ok(assignments
                .get(user)
                .map(|ids| ids.iter().filter_map(|id| roles.get(id).cloned()).collect())
                .unwrap_or_default())
        }
    }

    fn perm(value: &str) -> Permission {
        Permission::try_from(value).unwrap()
    }

    fn gate_over(store: TestStore) -> AuthGate<TestStore> {
        block_on(AuthGate::connect(store, AuthConfig::new("test-secret"))).unwrap()
    }

    #[test]
    fn authenticated_user_with_granting_role_is_allowed() {
        let store = TestStore::default();
        let role = store.seed_role("member", &["users:read:own"], &[]);
        store.assign("alice", role);
        let gate = gate_over(store);

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        let outcome = block_on(gate.check(
            &session.access_token,
            Some(&perm("users:read:own")),
            true,
        ));

        assert!(matches!(outcome, GateOutcome::Allowed(user) if user.user_id.as_str() == "alice"));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let store = TestStore::default();
        let role = store.seed_role("member", &["users:read:own"], &[]);
        store.assign("alice", role);
        let gate = gate_over(store);

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        let outcome = block_on(gate.check(
            &session.access_token,
            Some(&perm("monitoring:read:any")),
            true,
        ));

        assert_eq!(outcome, GateOutcome::Forbidden);
    }

    #[test]
    fn garbage_token_is_unauthenticated() {
        let gate = gate_over(TestStore::default());

        let outcome = block_on(gate.check("not-a-token", None, true));

        assert_eq!(outcome, GateOutcome::Unauthenticated);
    }

    #[test]
    fn zero_roles_authenticates_but_holds_no_permissions() {
        let store = TestStore::default();
        let gate = gate_over(store);

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();

        let public = block_on(gate.check(&session.access_token, None, true));
        assert!(matches!(public, GateOutcome::Allowed(user) if user.roles.is_empty()));

        let guarded = block_on(gate.check(
            &session.access_token,
            Some(&perm("users:read:own")),
            true,
        ));
        assert_eq!(guarded, GateOutcome::Forbidden);
    }

    #[test]
    fn role_lookup_failure_fails_closed() {
        let store = TestStore::default();
        let gate = gate_over(store.clone());

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        store.fail_role_reads(true);

        let outcome = block_on(gate.check(&session.access_token, None, true));

        assert_eq!(outcome, GateOutcome::Unauthenticated);
    }

    #[test]
    fn cached_roles_survive_a_store_outage() {
        let store = TestStore::default();
        let role = store.seed_role("member", &["users:read:own"], &[]);
        store.assign("alice", role);
        let gate = gate_over(store.clone());

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        let warm = block_on(gate.authenticate(&session.access_token, false)).unwrap();
        assert_eq!(warm.roles.len(), 1);

        // Within the TTL the cached role list keeps serving requests.
        store.fail_role_reads(true);
        let cached = block_on(gate.authenticate(&session.access_token, false)).unwrap();
        assert_eq!(cached.roles.len(), 1);
    }

    #[test]
    fn permission_grant_through_inheritance() {
        let store = TestStore::default();
        store.seed_role("viewer", &["posts:read:any"], &[]);
        let editor = store.seed_role("editor", &["posts:update:any"], &["viewer"]);
        store.assign("bob", editor);
        let gate = gate_over(store);

        let session = block_on(gate.sign_in(UserId::new("bob").unwrap())).unwrap();
        let outcome = block_on(gate.check(
            &session.access_token,
            Some(&perm("posts:read:any")),
            true,
        ));

        assert!(matches!(outcome, GateOutcome::Allowed(_)));
    }

    #[test]
    fn role_update_through_resolver_evicts_cached_role_lists() {
        let store = TestStore::default();
        let role = store.seed_role("member", &["users:read:own"], &[]);
        store.assign("alice", role);
        let gate = gate_over(store.clone());

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        let warm = block_on(gate.authenticate(&session.access_token, false)).unwrap();
        assert!(gate.role_cache().get(&warm.user_id).is_some());

        block_on(gate.resolver().update_role(RoleUpdate {
            id: role,
            permissions: Some(HashSet::from([perm("posts:read:any")])),
            ..RoleUpdate::for_role(role)
        }))
        .unwrap();

        assert!(gate.role_cache().get(&warm.user_id).is_none());
    }

    #[test]
    fn sign_out_revokes_the_session() {
        let store = TestStore::default();
        let gate = gate_over(store);

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();
        let revoked = block_on(gate.sign_out(&session.access_token)).unwrap();
        assert_eq!(revoked, Some(session.id));

        let outcome = block_on(gate.check(&session.access_token, None, true));
        assert_eq!(outcome, GateOutcome::Unauthenticated);
    }

    #[test]
    fn rate_limit_breach_rejects_validation() {
        let store = TestStore::default();
        let config =
            AuthConfig::new("test-secret").with_rate_limit(Duration::from_secs(300), 2);
        let gate = block_on(AuthGate::connect(store, config)).unwrap();

        let session = block_on(gate.sign_in(UserId::new("alice").unwrap())).unwrap();

        assert!(block_on(gate.authenticate(&session.access_token, true)).is_some());
        assert!(block_on(gate.authenticate(&session.access_token, true)).is_some());
        assert!(block_on(gate.authenticate(&session.access_token, true)).is_none());
        // Opting out of rate limiting skips the counter entirely.
        assert!(block_on(gate.authenticate(&session.access_token, false)).is_some());
    }
}
