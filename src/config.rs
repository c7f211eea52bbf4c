//! Registry client and bearer authentication configuration.
//!
//! Configuration can be built in code, deserialized with serde, or read from
//! the registry's flat `bearer.auth.*` property keys via
//! [`BearerAuthConfig::from_properties`].

use crate::auth::client_credentials::{DEFAULT_FETCH_TIMEOUT, DEFAULT_REFRESH_SKEW};
use crate::auth::{AuthenticationHeaderProvider, CredentialsSourceKind};
use crate::error::{AuthError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout for registry calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connect timeout for registry calls.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Property keys understood by [`BearerAuthConfig::from_properties`].
pub mod keys {
    pub const CREDENTIALS_SOURCE: &str = "bearer.auth.credentials.source";
    pub const TOKEN: &str = "bearer.auth.token";
    pub const ISSUER_ENDPOINT_URL: &str = "bearer.auth.issuer.endpoint.url";
    pub const CLIENT_ID: &str = "bearer.auth.client.id";
    pub const CLIENT_SECRET: &str = "bearer.auth.client.secret";
    pub const SCOPE: &str = "bearer.auth.scope";
    pub const LOGICAL_CLUSTER: &str = "bearer.auth.logical.cluster";
    pub const IDENTITY_POOL_ID: &str = "bearer.auth.identity.pool.id";
    pub const TOKEN_REFRESH_SKEW_SECS: &str = "bearer.auth.token.refresh.skew.seconds";
    pub const TOKEN_FETCH_TIMEOUT_SECS: &str = "bearer.auth.token.fetch.timeout.seconds";
}

/// Bearer authentication settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BearerAuthConfig {
    pub credentials_source: CredentialsSourceKind,
    /// Static bearer token.
    #[serde(deserialize_with = "secret_serde::deserialize")]
    pub token: Option<SecretString>,
    pub issuer_endpoint_url: Option<String>,
    pub client_id: Option<String>,
    #[serde(deserialize_with = "secret_serde::deserialize")]
    pub client_secret: Option<SecretString>,
    pub scopes: Vec<String>,
    pub logical_cluster: String,
    pub identity_pool_id: String,
    #[serde(deserialize_with = "duration_secs_serde::deserialize")]
    pub token_refresh_skew: Duration,
    #[serde(deserialize_with = "duration_secs_serde::deserialize")]
    pub token_fetch_timeout: Duration,
    /// Provider used when `credentials_source` is `CUSTOM`.
    #[serde(skip)]
    pub authentication_header_provider: Option<Arc<dyn AuthenticationHeaderProvider>>,
}

impl Default for BearerAuthConfig {
    fn default() -> Self {
        Self {
            credentials_source: CredentialsSourceKind::default(),
            token: None,
            issuer_endpoint_url: None,
            client_id: None,
            client_secret: None,
            scopes: Vec::new(),
            logical_cluster: String::new(),
            identity_pool_id: String::new(),
            token_refresh_skew: DEFAULT_REFRESH_SKEW,
            token_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            authentication_header_provider: None,
        }
    }
}

impl BearerAuthConfig {
    /// Static bearer token configuration.
    pub fn static_token(
        token: impl Into<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            credentials_source: CredentialsSourceKind::StaticToken,
            token: Some(SecretString::from(token.into())),
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
            ..Default::default()
        }
    }

    /// OAuth client credentials configuration.
    pub fn oauth_bearer(
        issuer_endpoint_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self {
            credentials_source: CredentialsSourceKind::OAuthBearer,
            issuer_endpoint_url: Some(issuer_endpoint_url.into()),
            client_id: Some(client_id.into()),
            client_secret: Some(SecretString::from(client_secret.into())),
            scopes,
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
            ..Default::default()
        }
    }

    /// Custom provider configuration.
    pub fn custom(provider: Arc<dyn AuthenticationHeaderProvider>) -> Self {
        Self {
            credentials_source: CredentialsSourceKind::Custom,
            authentication_header_provider: Some(provider),
            ..Default::default()
        }
    }

    pub fn with_token_refresh_skew(mut self, skew: Duration) -> Self {
        self.token_refresh_skew = skew;
        self
    }

    pub fn with_token_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.token_fetch_timeout = timeout;
        self
    }

    /// Read settings from registry property keys (see [`keys`]).
    ///
    /// A missing `bearer.auth.credentials.source` selects `STATIC_TOKEN`.
    /// Scopes may be separated by commas or whitespace. Keys outside the
    /// `bearer.auth.` namespace are ignored.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            properties
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(source) = get(keys::CREDENTIALS_SOURCE) {
            config.credentials_source = source.parse()?;
        }
        config.token = get(keys::TOKEN).map(|t| SecretString::from(t.to_string()));
        config.issuer_endpoint_url = get(keys::ISSUER_ENDPOINT_URL).map(str::to_string);
        config.client_id = get(keys::CLIENT_ID).map(str::to_string);
        config.client_secret = get(keys::CLIENT_SECRET).map(|s| SecretString::from(s.to_string()));
        config.scopes = get(keys::SCOPE)
            .map(|s| {
                s.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|scope| !scope.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        config.logical_cluster = get(keys::LOGICAL_CLUSTER).unwrap_or_default().to_string();
        config.identity_pool_id = get(keys::IDENTITY_POOL_ID).unwrap_or_default().to_string();
        if let Some(secs) = get(keys::TOKEN_REFRESH_SKEW_SECS) {
            config.token_refresh_skew = parse_secs(keys::TOKEN_REFRESH_SKEW_SECS, secs)?;
        }
        if let Some(secs) = get(keys::TOKEN_FETCH_TIMEOUT_SECS) {
            config.token_fetch_timeout = parse_secs(keys::TOKEN_FETCH_TIMEOUT_SECS, secs)?;
            if config.token_fetch_timeout.is_zero() {
                return Err(AuthError::invalid_config(format!(
                    "{} must be greater than zero",
                    keys::TOKEN_FETCH_TIMEOUT_SECS
                )));
            }
        }
        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| AuthError::invalid_config(format!("{key} must be a whole number of seconds: {e}")))
}

impl fmt::Debug for BearerAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthConfig")
            .field("credentials_source", &self.credentials_source)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("issuer_endpoint_url", &self.issuer_endpoint_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("logical_cluster", &self.logical_cluster)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("token_refresh_skew", &self.token_refresh_skew)
            .field("token_fetch_timeout", &self.token_fetch_timeout)
            .field(
                "authentication_header_provider",
                &self.authentication_header_provider.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

/// Schema registry client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryClientConfig {
    /// Registry base URL, e.g. `https://psrc-1234.us-east-1.aws.confluent.cloud`.
    pub url: String,
    #[serde(default = "default_request_timeout", deserialize_with = "duration_secs_serde::deserialize")]
    pub request_timeout: Duration,
    #[serde(default = "default_connect_timeout", deserialize_with = "duration_secs_serde::deserialize")]
    pub connect_timeout: Duration,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub bearer_auth: Option<BearerAuthConfig>,
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl RegistryClientConfig {
    /// Configuration without authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: None,
            bearer_auth: None,
        }
    }

    /// Configuration using a static bearer token.
    pub fn with_bearer_authentication(
        url: impl Into<String>,
        token: impl Into<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Self {
        Self::new(url).with_bearer_auth(BearerAuthConfig::static_token(
            token,
            logical_cluster,
            identity_pool_id,
        ))
    }

    pub fn with_bearer_auth(mut self, bearer_auth: BearerAuthConfig) -> Self {
        self.bearer_auth = Some(bearer_auth);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Check the settings that do not depend on the auth strategy.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(AuthError::invalid_config("registry url must not be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(AuthError::invalid_config("request timeout must be greater than zero"));
        }
        if let Some(auth) = &self.bearer_auth
            && auth.token_fetch_timeout.is_zero()
        {
            return Err(AuthError::invalid_config(
                "token fetch timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

mod duration_secs_serde {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod secret_serde {
    use secrecy::SecretString;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.is_empty()).map(SecretString::from))
    }
}
