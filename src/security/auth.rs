//! Request authentication.
//!
//! The credential check itself is pluggable through [`Authenticator`]; the
//! middleware only runs it and attaches the resulting [`Principal`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AuthConfig;
use crate::http::error::ApiError;

/// Identity attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

/// Verifies request credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError>;
}

/// Accepts `Authorization: Bearer <key>` for any configured key.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashSet<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.api_keys.iter().cloned())
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

        let key = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Unsupported authorization scheme".to_string()))?;

        if self.keys.contains(key) {
            Ok(Principal {
                id: format!("key:{}", key.chars().take(8).collect::<String>()),
            })
        } else {
            Err(ApiError::Unauthorized("Invalid API key".to_string()))
        }
    }
}

/// Middleware that rejects unauthenticated requests.
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()).await {
        Ok(principal) => {
            tracing::debug!(principal = %principal.id, "Request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
