use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{SessionId, UserId};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Server-tracked record binding a signed access token to a user.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// Opaque high-entropy session id.
    pub id: SessionId,
    /// Owning user.
    pub user_id: UserId,
    /// Signed access token embedding the user and session ids.
    pub access_token: String,
    /// Wall-clock expiry, derived from the same lifetime as the token's
    /// `exp` claim.
    pub expires_at: SystemTime,
}

impl Session {
    /// Remaining lifetime relative to `now`, zero once expired.
    pub fn remaining_lifetime(&self, now: SystemTime) -> Duration {
        self.expires_at
            .duration_since(now)
            .unwrap_or(Duration::ZERO)
    }
}

/// Claims embedded in a signed access token.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct AccessClaims {
    /// User id.
    sub: String,
    /// Session id.
    sid: String,
    iat: u64,
    exp: u64,
}

/// Issues, validates, and revokes signed session tokens.
///
/// Sessions live in a write-through in-memory cache in front of the durable
/// store. The cache is best-effort and the store is the source of truth:
/// creation writes the cache optimistically before persisting, and deletion
/// removes the cache entry before the durable delete, so a write failure can
/// leave the two transiently diverged. Callers should sweep expired entries
/// periodically via [`sweep_expired`].
///
/// [`sweep_expired`]: SessionManager::sweep_expired
pub struct SessionManager<S> {
    store: S,
    config: AuthConfig,
    cache: Mutex<HashMap<SessionId, Session>>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl<S> SessionManager<S>
where
    S: SessionStore + Send + Sync,
{
    /// Creates a manager over the given store.
    pub fn new(store: S, config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.token_secret);
        let decoding_key = DecodingKey::from_secret(&config.token_secret);
        let mut validation = Validation::new(config.token_algorithm);
        validation.leeway = 0;

        Self {
            store,
            config,
            cache: Mutex::new(HashMap::new()),
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issues a session for a user who already passed the credential check.
    ///
    /// The cache is written before the durable insert; on a persistence
    /// failure the call returns [`Error::SessionPersist`] and the cached
    /// entry stays in place.
    pub async fn create_session(&self, user_id: UserId) -> Result<Session> {
        let session_id = SessionId::from_string(random_hex(self.config.token_length));
        let now = SystemTime::now();
        let lifetime = Duration::from_secs(self.config.token_expiration_mins * 60);
        let access_token = self.sign_token(&user_id, &session_id, now, lifetime)?;

        let session = Session {
            id: session_id.clone(),
            user_id,
            access_token,
            expires_at: now + lifetime,
        };

        self.cache
            .lock()
            .expect("poisoned lock")
            .insert(session_id, session.clone());

        self.store
            .insert_session(&session)
            .await
            .map_err(Error::SessionPersist)?;

        tracing::debug!(session = %session.id, user = %session.user_id, "session created");
        Ok(session)
    }

    /// Looks a session up by id, cache first.
    ///
    /// A miss queries the store for a non-expired record and repopulates the
    /// cache. `Ok(None)` covers absent and expired sessions; `Err` is a store
    /// failure.
    pub async fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        if let Some(session) = self.cache.lock().expect("poisoned lock").get(id) {
            return Ok(Some(session.clone()));
        }

        let Some(session) = self.store.load_session(id).await.map_err(Error::from)? else {
            return Ok(None);
        };

        self.cache
            .lock()
            .expect("poisoned lock")
            .insert(session.id.clone(), session.clone());
        Ok(Some(session))
    }

    /// Validates a signed token and returns the live session it refers to.
    ///
    /// A valid signature alone is not enough: the referenced session must
    /// exist server-side, belong to the token's user, and store exactly this
    /// token string. Any failure, including a store error during lookup,
    /// yields `None`; validation fails closed.
    pub async fn validate_session(&self, token: &str) -> Option<Session> {
        let claims = match decode::<AccessClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(err) => {
                tracing::debug!(error = %err, "access token rejected");
                return None;
            }
        };

        let session_id = SessionId::from_string(claims.sid);
        let session = match self.get_session(&session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!(session = %session_id, "token refers to no live session");
                return None;
            }
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "session lookup failed; denying");
                return None;
            }
        };

        let matches = session.user_id.as_str() == claims.sub && session.access_token == token;
        if !matches {
            tracing::warn!(session = %session_id, "token claims do not match stored session");
            return None;
        }
        Some(session)
    }

    /// Revokes a single session.
    ///
    /// Cache removal happens first, so the user is treated as logged out
    /// locally even when the durable delete fails; that failure is surfaced
    /// as [`Error::SessionDeletion`] and not retried.
    pub async fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.cache.lock().expect("poisoned lock").remove(id);
        self.store.delete_session(id).await.map_err(|source| {
            tracing::error!(session = %id, error = %source, "durable session delete failed");
            Error::SessionDeletion(source)
        })?;
        tracing::debug!(session = %id, "session deleted");
        Ok(())
    }

    /// Revokes every session owned by a user ("log out everywhere").
    pub async fn delete_all_user_sessions(&self, user_id: &UserId) -> Result<()> {
        self.cache
            .lock()
            .expect("poisoned lock")
            .retain(|_, session| &session.user_id != user_id);
        self.store
            .delete_user_sessions(user_id)
            .await
            .map_err(|source| {
                tracing::error!(user = %user_id, error = %source, "durable session purge failed");
                Error::SessionDeletion(source)
            })?;
        tracing::debug!(user = %user_id, "all user sessions deleted");
        Ok(())
    }

    /// Drops expired entries from the in-memory cache.
    ///
    /// Call this on the interval given by
    /// [`AuthConfig::cache_cleanup_interval`].
    pub fn sweep_expired(&self) {
        let now = SystemTime::now();
        self.cache
            .lock()
            .expect("poisoned lock")
            .retain(|_, session| session.expires_at > now);
    }

    /// Number of sessions currently cached.
    pub fn cached_sessions(&self) -> usize {
        self.cache.lock().expect("poisoned lock").len()
    }

    fn sign_token(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        now: SystemTime,
        lifetime: Duration,
    ) -> Result<String> {
        let issued_at = now
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        let claims = AccessClaims {
            sub: user_id.as_str().to_string(),
            sid: session_id.as_str().to_string(),
            iat: issued_at,
            exp: issued_at + lifetime.as_secs(),
        };
        encode(
            &Header::new(self.config.token_algorithm),
            &claims,
            &self.encoding_key,
        )
        .map_err(Error::TokenSigning)
    }
}

fn random_hex(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
