//! Shared-key authentication
//!
//! Every request must carry the agent key in `x-auth-key`. Both sides are
//! hashed before comparison so the check runs in constant time regardless of
//! the provided key's length.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dockps_core::AUTH_KEY_HEADER;
use sha2::{Digest, Sha256};

use crate::api::AppState;
use crate::api::error::ApiError;

pub struct AuthKey {
    digest: Vec<u8>,
}

impl AuthKey {
    pub fn new(key: &str) -> Self {
        Self {
            digest: Sha256::digest(key.as_bytes()).to_vec(),
        }
    }

    pub fn verify(&self, provided: &[u8]) -> bool {
        let provided = Sha256::digest(provided);
        constant_time_eq(&self.digest, provided.as_slice())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Reject requests without a valid `x-auth-key`
pub async fn require_auth_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = req
        .headers()
        .get(AUTH_KEY_HEADER)
        .is_some_and(|key| state.auth.verify(key.as_bytes()));

    if !authorized {
        tracing::debug!(path = %req.uri().path(), "Rejected request without a valid auth key");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let key = AuthKey::new("docker_ps_abc");
        assert!(key.verify(b"docker_ps_abc"));
        assert!(!key.verify(b"docker_ps_abd"));
        assert!(!key.verify(b"docker_ps_abc "));
        assert!(!key.verify(b""));
    }
}
