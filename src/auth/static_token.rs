//! Static bearer token authentication.

use crate::error::{AuthError, Result};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

/// Static bearer token provider.
///
/// The simplest strategy: a token issued out of band, presented as
/// `Authorization: Bearer <token>` on every request until the process restarts.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: SecretString,
    logical_cluster: String,
    identity_pool_id: String,
}

impl StaticTokenProvider {
    /// Create a static token provider.
    ///
    /// The token must be non-empty and representable as an HTTP header value.
    pub fn new(
        token: impl Into<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::invalid_config("bearer.auth.token must not be empty"));
        }
        if HeaderValue::from_str(&format!("Bearer {token}")).is_err() {
            return Err(AuthError::invalid_config(
                "bearer.auth.token contains characters not allowed in an HTTP header",
            ));
        }
        Ok(Self {
            token: SecretString::from(token),
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
        })
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    pub fn logical_cluster(&self) -> &str {
        &self.logical_cluster
    }

    pub fn identity_pool_id(&self) -> &str {
        &self.identity_pool_id
    }
}
