use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Serialize;
use std::collections::HashMap;

pub const SESSION_COOKIE: &str = "deepsearch.session-token";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    pub name: String,
}

/// A resolved session. A session without a user is not authorized to chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: Option<SessionUser>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the session carried by a request, if any
    async fn session(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Checks a bearer token or session cookie against a fixed set of user tokens
#[derive(Debug, Default, Clone)]
pub struct TokenAuthenticator {
    users_by_token: HashMap<String, String>,
}

impl TokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user<N: Into<String>, T: Into<String>>(mut self, name: N, token: T) -> Self {
        self.users_by_token.insert(token.into(), name.into());
        self
    }

    /// Parse `name:token` pairs separated by commas. Malformed entries are skipped.
    pub fn from_users(users: &str) -> Self {
        let mut authenticator = Self::new();
        for entry in users.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((name, token)) if !name.is_empty() && !token.is_empty() => {
                    authenticator = authenticator.with_user(name.trim(), token.trim());
                }
                _ => tracing::warn!("ignoring malformed user entry"),
            }
        }
        if authenticator.users_by_token.is_empty() {
            tracing::warn!("no users configured, every chat request will be rejected");
        }
        authenticator
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let token = bearer_token(headers).or_else(|| session_cookie(headers))?;
        let user = self
            .users_by_token
            .get(token)
            .map(|name| SessionUser { name: name.clone() });
        Some(Session { user })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}
