use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::warn;

use crate::errors::IntelError;

/// Decides whether a request may trigger a lookup.
pub trait AuthVerifier: Send + Sync {
    fn verify(&self, headers: &HeaderMap) -> Result<(), IntelError>;
}

/// Accepts `Authorization: Bearer <token>` for any configured token.
/// With no tokens configured every request is allowed.
pub struct BearerTokenVerifier {
    tokens: Vec<String>,
}

impl BearerTokenVerifier {
    pub fn new(tokens: Vec<String>) -> Self {
        if tokens.is_empty() {
            warn!("No AUTH_TOKENS configured, /domain-info is open to unauthenticated requests");
        }
        Self { tokens }
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl AuthVerifier for BearerTokenVerifier {
    fn verify(&self, headers: &HeaderMap) -> Result<(), IntelError> {
        if self.is_open() {
            return Ok(());
        }

        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| IntelError::Unauthorized("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| IntelError::Unauthorized("Malformed Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| IntelError::Unauthorized("Expected a Bearer token".to_string()))?;

        if self.tokens.iter().any(|known| known == token) {
            Ok(())
        } else {
            Err(IntelError::Unauthorized("Invalid token".to_string()))
        }
    }
}
