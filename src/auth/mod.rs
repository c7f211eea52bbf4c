//! Authentication header sources for schema registry requests.
//!
//! A registry request needs three values: the `Authorization` header, the
//! logical cluster id and the identity pool id. [`AuthHeaderSource`] resolves
//! them from exactly one of three strategies:
//!
//! - [`StaticTokenProvider`]: a fixed bearer token
//! - [`ClientCredentialsProvider`]: an OAuth 2.0 client credentials token,
//!   cached and refreshed on demand
//! - a caller-supplied [`AuthenticationHeaderProvider`]

pub mod client_credentials;
pub mod clock;
pub mod static_token;

pub use client_credentials::ClientCredentialsProvider;
pub use clock::{Clock, ManualClock, SystemClock};
pub use static_token::StaticTokenProvider;

use crate::config::BearerAuthConfig;
use crate::error::{AuthError, BoxError, Result};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Caller-supplied authentication logic.
///
/// Implementations are shared across every task issuing requests through the
/// same client, so they must be safe to call concurrently. The header value is
/// sent as-is: implementations are responsible for any `Bearer ` prefix.
#[async_trait::async_trait]
pub trait AuthenticationHeaderProvider: Send + Sync {
    /// Returns the full `Authorization` header value.
    async fn authentication_header(&self) -> std::result::Result<String, BoxError>;

    /// Returns the registry logical cluster id.
    async fn logical_cluster(&self) -> std::result::Result<String, BoxError>;

    /// Returns the identity pool id.
    async fn identity_pool_id(&self) -> std::result::Result<String, BoxError>;
}

/// Which strategy supplies credentials.
///
/// Parsed from the registry property values `STATIC_TOKEN`, `OAUTHBEARER`
/// and `CUSTOM` (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum CredentialsSourceKind {
    #[default]
    StaticToken,
    OAuthBearer,
    Custom,
}

impl CredentialsSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticToken => "STATIC_TOKEN",
            Self::OAuthBearer => "OAUTHBEARER",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for CredentialsSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialsSourceKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STATIC_TOKEN" => Ok(Self::StaticToken),
            "OAUTHBEARER" => Ok(Self::OAuthBearer),
            "CUSTOM" => Ok(Self::Custom),
            other => Err(AuthError::invalid_config(format!(
                "unrecognized bearer.auth.credentials.source {other:?}, expected STATIC_TOKEN, OAUTHBEARER or CUSTOM"
            ))),
        }
    }
}

impl TryFrom<String> for CredentialsSourceKind {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CredentialsSourceKind> for &'static str {
    fn from(kind: CredentialsSourceKind) -> Self {
        kind.as_str()
    }
}

/// Resolves authentication and routing values for each outgoing request.
///
/// The strategy is fixed at construction. Clone it or wrap it in an `Arc` to
/// share between tasks; the OAuth token cache is shared either way.
#[derive(Clone)]
pub enum AuthHeaderSource {
    StaticToken(StaticTokenProvider),
    OAuthBearer(ClientCredentialsProvider),
    Custom(Arc<dyn AuthenticationHeaderProvider>),
}

impl AuthHeaderSource {
    /// Build the source selected by `config`, validating it eagerly.
    ///
    /// `http` is used for OAuth token requests.
    pub fn from_config(config: &BearerAuthConfig, http: reqwest::Client) -> Result<Self> {
        match config.credentials_source {
            CredentialsSourceKind::StaticToken => {
                let token = config
                    .token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string())
                    .unwrap_or_default();
                Ok(Self::StaticToken(StaticTokenProvider::new(
                    token,
                    config.logical_cluster.clone(),
                    config.identity_pool_id.clone(),
                )?))
            }
            CredentialsSourceKind::OAuthBearer => {
                let secret = config
                    .client_secret
                    .as_ref()
                    .map(|s| s.expose_secret().to_string())
                    .unwrap_or_default();
                let provider = ClientCredentialsProvider::new(
                    config.issuer_endpoint_url.as_deref().unwrap_or_default(),
                    config.client_id.clone().unwrap_or_default(),
                    secret,
                    config.scopes.clone(),
                    config.logical_cluster.clone(),
                    config.identity_pool_id.clone(),
                )?
                .with_http_client(http)
                .with_refresh_skew(config.token_refresh_skew)
                .with_fetch_timeout(config.token_fetch_timeout)?;
                Ok(Self::OAuthBearer(provider))
            }
            CredentialsSourceKind::Custom => config
                .authentication_header_provider
                .clone()
                .map(Self::Custom)
                .ok_or_else(|| {
                    AuthError::invalid_config(
                        "bearer.auth.credentials.source is CUSTOM but no authentication header provider was supplied",
                    )
                }),
        }
    }

    /// Wrap a caller-supplied provider.
    pub fn custom(provider: impl AuthenticationHeaderProvider + 'static) -> Self {
        Self::Custom(Arc::new(provider))
    }

    pub fn kind(&self) -> CredentialsSourceKind {
        match self {
            Self::StaticToken(_) => CredentialsSourceKind::StaticToken,
            Self::OAuthBearer(_) => CredentialsSourceKind::OAuthBearer,
            Self::Custom(_) => CredentialsSourceKind::Custom,
        }
    }

    /// Returns the `Authorization` header value.
    pub async fn authorization_header(&self) -> Result<String> {
        self.authorization_header_with_cancel(&CancellationToken::new())
            .await
    }

    /// Returns the `Authorization` header value, aborting a token refresh
    /// started by this call when `cancel` fires.
    ///
    /// Only the OAuth strategy performs network I/O. A custom provider's call
    /// is abandoned on cancellation and reported as [`AuthError::Cancelled`].
    pub async fn authorization_header_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match self {
            Self::StaticToken(p) => Ok(p.authorization_header()),
            Self::OAuthBearer(p) => p.authorization_header_with_cancel(cancel).await,
            Self::Custom(p) => {
                tokio::select! {
                    header = p.authentication_header() => header.map_err(provider_failed),
                    _ = cancel.cancelled() => Err(AuthError::Cancelled),
                }
            }
        }
    }

    pub async fn logical_cluster(&self) -> Result<String> {
        match self {
            Self::StaticToken(p) => Ok(p.logical_cluster().to_string()),
            Self::OAuthBearer(p) => Ok(p.logical_cluster().to_string()),
            Self::Custom(p) => p.logical_cluster().await.map_err(provider_failed),
        }
    }

    pub async fn identity_pool_id(&self) -> Result<String> {
        match self {
            Self::StaticToken(p) => Ok(p.identity_pool_id().to_string()),
            Self::OAuthBearer(p) => Ok(p.identity_pool_id().to_string()),
            Self::Custom(p) => p.identity_pool_id().await.map_err(provider_failed),
        }
    }
}

fn provider_failed(error: BoxError) -> AuthError {
    tracing::warn!(target: "schema_registry_auth::auth", %error, "authentication header provider failed");
    AuthError::provider_failed(error)
}

impl fmt::Debug for AuthHeaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticToken(p) => f.debug_tuple("StaticToken").field(p).finish(),
            Self::OAuthBearer(p) => f.debug_tuple("OAuthBearer").field(p).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials_source() {
        assert_eq!(
            "STATIC_TOKEN".parse::<CredentialsSourceKind>().unwrap(),
            CredentialsSourceKind::StaticToken
        );
        assert_eq!(
            "oauthbearer".parse::<CredentialsSourceKind>().unwrap(),
            CredentialsSourceKind::OAuthBearer
        );
        assert_eq!(
            " Custom ".parse::<CredentialsSourceKind>().unwrap(),
            CredentialsSourceKind::Custom
        );
        assert!(matches!(
            "SASL_INHERIT".parse::<CredentialsSourceKind>(),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_credentials_source_serde() {
        let kind: CredentialsSourceKind = serde_json::from_str("\"OAUTHBEARER\"").unwrap();
        assert_eq!(kind, CredentialsSourceKind::OAuthBearer);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"OAUTHBEARER\"");
        assert!(serde_json::from_str::<CredentialsSourceKind>("\"BASIC\"").is_err());
    }

    #[test]
    fn test_from_config_static() {
        let config = BearerAuthConfig::static_token("token", "lsrc-abcd", "pool-1234");
        let source = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap();
        assert_eq!(source.kind(), CredentialsSourceKind::StaticToken);
    }

    #[test]
    fn test_from_config_static_without_token() {
        let config = BearerAuthConfig::default();
        let err = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_config_custom_without_provider() {
        let config = BearerAuthConfig {
            credentials_source: CredentialsSourceKind::Custom,
            ..Default::default()
        };
        let err = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap_err();
        assert!(err.to_string().contains("no authentication header provider"));
    }

    #[tokio::test]
    async fn test_static_source_resolves_all_values() {
        let config = BearerAuthConfig::static_token("token", "lsrc-abcd", "pool-1234");
        let source = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap();
        assert_eq!(source.authorization_header().await.unwrap(), "Bearer token");
        assert_eq!(source.logical_cluster().await.unwrap(), "lsrc-abcd");
        assert_eq!(source.identity_pool_id().await.unwrap(), "pool-1234");
    }
}
