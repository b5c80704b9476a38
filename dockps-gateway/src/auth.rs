//! User authentication
//!
//! Sessions are issued elsewhere as HS256 JWTs. The gateway only verifies
//! them, from the session cookie or an `Authorization: Bearer` header.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    #[serde(default)]
    pub identity_id: Option<String>,
    pub exp: i64,
}

#[derive(Clone)]
pub struct AuthManager {
    cookie_name: Arc<str>,
    decoding_key: DecodingKey,
}

impl AuthManager {
    pub fn new(secret: &str, cookie_name: &str) -> Self {
        Self {
            cookie_name: Arc::from(cookie_name),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    pub fn extract_token_from_cookie<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header
            .split(';')
            .filter_map(|cookie| cookie.trim().split_once('='))
            .find(|(name, value)| *name == &*self.cookie_name && !value.is_empty())
            .map(|(_, value)| value)
    }

    pub fn extract_token_from_header<'a>(&self, auth_header: &'a str) -> Option<&'a str> {
        auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Resolve the user behind a request
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| self.extract_token_from_cookie(value));

        let token = from_cookie
            .or_else(|| {
                headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| self.extract_token_from_header(value))
            })
            .ok_or(ApiError::Unauthorized)?;

        let claims = self.verify_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            ApiError::Unauthorized
        })?;

        tracing::debug!(
            user_id = %claims.user_id,
            identity_id = claims.identity_id.as_deref().unwrap_or("-"),
            "Authenticated request"
        );

        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthManager: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthManager::from_ref(state).authenticate(&parts.headers)
    }
}
