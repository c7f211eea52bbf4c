//! Registry REST wrapper.
//!
//! [`RestService`] owns the HTTP client and the authentication header source
//! and attaches the resolved headers to every request it builds. It does not
//! model registry resources; callers choose the method and path.

use crate::auth::AuthHeaderSource;
use crate::config::RegistryClientConfig;
use crate::error::ClientError;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use std::sync::Arc;
use url::Url;

/// Header carrying the registry logical cluster id.
pub const TARGET_SR_CLUSTER_HEADER: &str = "target-sr-cluster";
/// Header carrying the identity pool id.
pub const IDENTITY_POOL_ID_HEADER: &str = "Confluent-Identity-Pool-Id";

const DEFAULT_USER_AGENT: &str = concat!("schema-registry-auth/", env!("CARGO_PKG_VERSION"));

/// An authenticated HTTP client bound to one registry.
#[derive(Debug, Clone)]
pub struct RestService {
    base_url: Url,
    http: reqwest::Client,
    auth: Option<Arc<AuthHeaderSource>>,
}

impl RestService {
    /// Build the HTTP client and authentication source from `config`.
    ///
    /// All configuration errors surface here, before any request is made.
    pub fn new(config: RegistryClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = parse_base_url(&config.url)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        let auth = config
            .bearer_auth
            .as_ref()
            .map(|bearer| AuthHeaderSource::from_config(bearer, http.clone()))
            .transpose()?
            .map(Arc::new);

        tracing::debug!(
            target: "schema_registry_auth::http",
            url = %base_url,
            credentials_source = ?auth.as_ref().map(|a| a.kind()),
            "registry client configured"
        );

        Ok(Self {
            base_url,
            http,
            auth,
        })
    }

    /// Use an already-built authentication source and HTTP client.
    pub fn with_source(
        url: &str,
        http: reqwest::Client,
        auth: Arc<AuthHeaderSource>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(url)?,
            http,
            auth: Some(auth),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth_source(&self) -> Option<&Arc<AuthHeaderSource>> {
        self.auth.as_ref()
    }

    /// Start a request against `path`, relative to the registry base URL.
    ///
    /// The returned builder carries no credentials until passed to
    /// [`authorize`](Self::authorize) or [`send`](Self::send).
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))?;
        Ok(self.http.request(method, url))
    }

    /// Attach `Authorization`, identity pool and logical cluster headers.
    ///
    /// Empty identity pool or logical cluster values are left out.
    pub async fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let Some(auth) = &self.auth else {
            return Ok(builder);
        };

        let header = auth.authorization_header().await?;
        let mut builder = builder.header(AUTHORIZATION, header_value("authorization", &header)?);

        let identity_pool_id = auth.identity_pool_id().await?;
        if !identity_pool_id.is_empty() {
            builder = builder.header(
                HeaderName::from_static("confluent-identity-pool-id"),
                header_value(IDENTITY_POOL_ID_HEADER, &identity_pool_id)?,
            );
        }

        let logical_cluster = auth.logical_cluster().await?;
        if !logical_cluster.is_empty() {
            builder = builder.header(
                HeaderName::from_static(TARGET_SR_CLUSTER_HEADER),
                header_value(TARGET_SR_CLUSTER_HEADER, &logical_cluster)?,
            );
        }

        Ok(builder)
    }

    /// Authorize and send `builder`. Non-success statuses become [`ClientError::Status`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let builder = self.authorize(builder).await?;
        let response = builder.send().await.inspect_err(|e| {
            tracing::debug!(target: "schema_registry_auth::http", err = %e, "request error");
        })?;

        let status = response.status();
        tracing::debug!(
            target: "schema_registry_auth::http",
            url = %response.url(),
            status = status.as_u16(),
            "response received"
        );
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(response)
    }
}

fn parse_base_url(url: &str) -> Result<Url, ClientError> {
    let mut base = Url::parse(url.trim()).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))?;
    // `Url::join` replaces the last path segment unless the base ends with '/'.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BearerAuthConfig;
    use crate::error::AuthError;

    #[test]
    fn test_base_url_joins_paths() {
        let service = RestService::new(RegistryClientConfig::new(
            "https://psrc-1234.us-east-1.aws.confluent.cloud/registry",
        ))
        .unwrap();
        let request = service
            .request(Method::GET, "/subjects")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://psrc-1234.us-east-1.aws.confluent.cloud/registry/subjects"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = RestService::new(RegistryClientConfig::new("psrc-1234")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[test]
    fn test_invalid_auth_config_rejected_at_construction() {
        let config = RegistryClientConfig::new("https://psrc-1234.example.com").with_bearer_auth(
            BearerAuthConfig::oauth_bearer(
                "https://idp.example.com/token",
                "",
                "secret",
                vec![],
                "lsrc-abcd",
                "pool-1234",
            ),
        );
        let err = RestService::new(config).unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_authorize_without_auth_is_noop() {
        let service = RestService::new(RegistryClientConfig::new("https://psrc-1234.example.com")).unwrap();
        let builder = service.request(Method::GET, "subjects").unwrap();
        let request = service.authorize(builder).await.unwrap().build().unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_authorize_static_token_headers() {
        let service = RestService::new(RegistryClientConfig::with_bearer_authentication(
            "https://psrc-1234.example.com",
            "token",
            "lsrc-abcd",
            "pool-1234",
        ))
        .unwrap();
        let builder = service.request(Method::GET, "subjects").unwrap();
        let request = service.authorize(builder).await.unwrap().build().unwrap();
        let headers = request.headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer token");
        assert_eq!(headers.get(TARGET_SR_CLUSTER_HEADER).unwrap(), "lsrc-abcd");
        assert_eq!(headers.get(IDENTITY_POOL_ID_HEADER).unwrap(), "pool-1234");
    }

    #[tokio::test]
    async fn test_authorize_omits_empty_identity_pool() {
        let service = RestService::new(RegistryClientConfig::with_bearer_authentication(
            "https://psrc-1234.example.com",
            "token",
            "lsrc-abcd",
            "",
        ))
        .unwrap();
        let builder = service.request(Method::GET, "subjects").unwrap();
        let request = service.authorize(builder).await.unwrap().build().unwrap();
        assert!(request.headers().get(IDENTITY_POOL_ID_HEADER).is_none());
        assert_eq!(request.headers().get(TARGET_SR_CLUSTER_HEADER).unwrap(), "lsrc-abcd");
    }
}
