// auth/session.rs - Session token transport (cookie or bearer header)
//
// Resolution never fails: anything short of a valid signed token is an
// anonymous caller.

use axum::http::{header, HeaderMap};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{SecurityConfig, MAX_JWT_EXPIRY_HOURS};

use super::{validate_jwt, Claims};

/// Who the caller is, as established by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// Session token from the named cookie, falling back to `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    cookie_value(headers, cookie_name).or_else(|| bearer_token(headers))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub fn resolve_identity(headers: &HeaderMap, security: &SecurityConfig) -> Option<Identity> {
    let token = session_token(headers, &security.session_cookie)?;
    match validate_jwt(&token, &security.jwt_secret) {
        Ok(claims) => Some(Identity::from(claims)),
        Err(e) => {
            tracing::debug!("Ignoring session token: {}", e);
            None
        }
    }
}

/// `Set-Cookie` value that stores a session token.
pub fn session_cookie(security: &SecurityConfig, token: &str) -> String {
    let max_age = security.jwt_expiry_hours.min(MAX_JWT_EXPIRY_HOURS) * 3600;
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        security.session_cookie, token, max_age
    );
    if security.require_https {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie(security: &SecurityConfig) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", security.session_cookie);
    if security.require_https {
        cookie.push_str("; Secure");
    }
    cookie
}
