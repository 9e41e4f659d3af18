//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::SystemTime;

use crate::gate::{AuthGate, AuthenticatedUser, Decision};
use crate::permission::Permission;
use crate::session::Session;

use ::axum::body::Body;
use ::axum::http::header::COOKIE;
use ::axum::http::{HeaderMap, Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Cookie carrying the session access token.
pub const SESSION_COOKIE: &str = "auth-at-app";

/// Extracts the session token from the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some(token) = pair.trim().strip_prefix(SESSION_COOKIE) {
                if let Some(token) = token.strip_prefix('=')
                    && !token.is_empty()
                {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// Builds the `Set-Cookie` value for a freshly issued session.
///
/// HttpOnly and SameSite=Strict always; `Secure` when `secure` is set
/// (production). Max-Age is the token's remaining lifetime at issuance.
pub fn session_cookie(session: &Session, secure: bool) -> String {
    let max_age = session.remaining_lifetime(SystemTime::now()).as_secs();
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict",
        session.access_token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds the `Set-Cookie` value that clears the session cookie on sign-out.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict")
}

/// Middleware layer that authenticates requests from the session cookie and
/// attaches [`AuthenticatedUser`] to request extensions.
#[derive(Clone)]
pub struct SessionLayer<S> {
    gate: Arc<AuthGate<S>>,
    rate_limit: bool,
}

impl<S> SessionLayer<S> {
    /// Creates a new session layer.
    pub fn new(gate: Arc<AuthGate<S>>) -> Self {
        Self {
            gate,
            rate_limit: true,
        }
    }

    /// Enables or disables the per-token rate-limit check.
    pub fn rate_limit(mut self, on: bool) -> Self {
        self.rate_limit = on;
        self
    }
}

impl<S, Inner> Layer<Inner> for SessionLayer<S> {
    type Service = SessionService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        SessionService {
            inner,
            gate: self.gate.clone(),
            rate_limit: self.rate_limit,
        }
    }
}

/// Middleware service that rejects unauthenticated requests with 401.
#[derive(Clone)]
pub struct SessionService<Inner, S> {
    inner: Inner,
    gate: Arc<AuthGate<S>>,
    rate_limit: bool,
}

impl<Inner, S> Service<Request<Body>> for SessionService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + Clone + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = self.gate.clone();
        let rate_limit = self.rate_limit;

        Box::pin(async move {
            let Some(token) = session_token(req.headers()) else {
                return Ok((StatusCode::UNAUTHORIZED, "unauthorized").into_response());
            };

            match gate.authenticate(&token, rate_limit).await {
                Some(user) => {
                    req.extensions_mut().insert(user);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                None => Ok((StatusCode::UNAUTHORIZED, "unauthorized").into_response()),
            }
        })
    }
}

/// Middleware layer that enforces a permission on an authenticated request.
///
/// `permission = None` requires authentication only, no permission check.
#[derive(Clone)]
pub struct PermissionLayer<S> {
    gate: Arc<AuthGate<S>>,
    permission: Option<Permission>,
}

impl<S> PermissionLayer<S> {
    /// Creates a layer requiring the given permission.
    pub fn new(gate: Arc<AuthGate<S>>, permission: Permission) -> Self {
        Self {
            gate,
            permission: Some(permission),
        }
    }

    /// Creates a layer that only requires authentication.
    pub fn authenticated_only(gate: Arc<AuthGate<S>>) -> Self {
        Self {
            gate,
            permission: None,
        }
    }
}

impl<S, Inner> Layer<Inner> for PermissionLayer<S> {
    type Service = PermissionService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        PermissionService {
            inner,
            gate: self.gate.clone(),
            permission: self.permission.clone(),
        }
    }
}

/// Middleware service that returns 401 without an authenticated user and 403
/// when the required permission is missing.
#[derive(Clone)]
pub struct PermissionService<Inner, S> {
    inner: Inner,
    gate: Arc<AuthGate<S>>,
    permission: Option<Permission>,
}

impl<Inner, S> Service<Request<Body>> for PermissionService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + Clone + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = self.gate.clone();
        let permission = self.permission.clone();

        Box::pin(async move {
            let user = req.extensions().get::<AuthenticatedUser>().cloned();
            let Some(user) = user else {
                return Ok((StatusCode::UNAUTHORIZED, "unauthorized").into_response());
            };

            if let Some(permission) = &permission
                && gate.authorize(&user, permission) == Decision::Deny
            {
                return Ok((StatusCode::FORBIDDEN, "forbidden").into_response());
            }

            poll_fn(|cx| inner.poll_ready(cx)).await?;
            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionId, UserId};
    use ::axum::http::HeaderValue;
    use std::time::{Duration, SystemTime};

    fn session(lifetime: Duration) -> Session {
        Session {
            id: SessionId::from_string("abc123".to_string()),
            user_id: UserId::new("alice").unwrap(),
            access_token: "header.payload.signature".to_string(),
            expires_at: SystemTime::now() + lifetime,
        }
    }

    #[test]
    fn session_token_reads_the_auth_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; auth-at-app=tok123; lang=en"),
        );

        assert_eq!(session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn session_token_ignores_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));

        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn session_token_rejects_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("auth-at-app="));

        assert!(session_token(&headers).is_none());
    }

    #[test]
    fn cookie_carries_contractual_attributes() {
        let cookie = session_cookie(&session(Duration::from_secs(1800)), true);

        assert!(cookie.starts_with("auth-at-app=header.payload.signature;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Max-Age=1800") || cookie.contains("Max-Age=1799"));
    }

    #[test]
    fn cookie_omits_secure_outside_production() {
        let cookie = session_cookie(&session(Duration::from_secs(60)), false);

        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie();

        assert!(cookie.starts_with("auth-at-app=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
