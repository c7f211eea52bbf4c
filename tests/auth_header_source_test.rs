use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use schema_registry_auth::prelude::*;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, thiserror::Error)]
#[error("credential vault unavailable")]
struct VaultUnavailable;

/// Records how often each method is called.
#[derive(Default)]
struct CountingProvider {
    fail_header: bool,
    header_calls: AtomicUsize,
    cluster_calls: AtomicUsize,
    pool_calls: AtomicUsize,
}

#[async_trait::async_trait]
impl AuthenticationHeaderProvider for CountingProvider {
    async fn authentication_header(&self) -> Result<String, BoxError> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_header {
            return Err(Box::new(VaultUnavailable));
        }
        Ok("customToken".to_string())
    }

    async fn logical_cluster(&self) -> Result<String, BoxError> {
        self.cluster_calls.fetch_add(1, Ordering::SeqCst);
        Ok("lsrc-1".to_string())
    }

    async fn identity_pool_id(&self) -> Result<String, BoxError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        Ok("pool-1".to_string())
    }
}

/// Never answers within a test's lifetime.
struct StalledProvider;

#[async_trait::async_trait]
impl AuthenticationHeaderProvider for StalledProvider {
    async fn authentication_header(&self) -> Result<String, BoxError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("late".to_string())
    }

    async fn logical_cluster(&self) -> Result<String, BoxError> {
        Ok(String::new())
    }

    async fn identity_pool_id(&self) -> Result<String, BoxError> {
        Ok(String::new())
    }
}

#[tokio::test]
async fn static_token_header_is_bearer_prefixed() {
    for token in ["token", "dGVzdA==", "a.b.c"] {
        let source = AuthHeaderSource::from_config(
            &BearerAuthConfig::static_token(token, "lsrc-abcd", "pool-1234"),
            reqwest::Client::new(),
        )
        .unwrap();
        for _ in 0..3 {
            assert_eq!(
                source.authorization_header().await.unwrap(),
                format!("Bearer {token}")
            );
        }
    }
}

#[tokio::test]
async fn custom_provider_values_are_returned_unmodified() {
    let provider = Arc::new(CountingProvider::default());
    let source = AuthHeaderSource::Custom(provider.clone());

    assert_eq!(source.kind(), CredentialsSourceKind::Custom);
    assert_eq!(source.authorization_header().await.unwrap(), "customToken");
    assert_eq!(source.logical_cluster().await.unwrap(), "lsrc-1");
    assert_eq!(source.identity_pool_id().await.unwrap(), "pool-1");
}

#[tokio::test]
async fn custom_provider_is_not_cached() {
    let provider = Arc::new(CountingProvider::default());
    let source = AuthHeaderSource::Custom(provider.clone());

    for _ in 0..3 {
        source.authorization_header().await.unwrap();
    }
    assert_eq!(provider.header_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn custom_provider_failure_is_provider_failed() {
    let provider = Arc::new(CountingProvider {
        fail_header: true,
        ..Default::default()
    });
    let source = AuthHeaderSource::Custom(provider.clone());

    let err = source.authorization_header().await.unwrap_err();
    assert!(matches!(err, AuthError::ProviderFailed(_)));
    assert!(
        err.provider_error()
            .and_then(|e| e.downcast_ref::<VaultUnavailable>())
            .is_some()
    );

    assert_eq!(provider.header_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.cluster_calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.pool_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn custom_source_from_config() {
    let provider: Arc<dyn AuthenticationHeaderProvider> = Arc::new(CountingProvider::default());
    let source =
        AuthHeaderSource::from_config(&BearerAuthConfig::custom(provider), reqwest::Client::new())
            .unwrap();
    assert_eq!(source.authorization_header().await.unwrap(), "customToken");
}

#[tokio::test]
async fn oauth_source_from_config_resolves_static_routing_values() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "abc",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = BearerAuthConfig::oauth_bearer(
        format!("{}/token", server.uri()),
        "client-id",
        "client-secret",
        vec!["schema_registry".to_string()],
        "lsrc-abcd",
        "pool-1234",
    );
    let source = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap();

    assert_eq!(source.kind(), CredentialsSourceKind::OAuthBearer);
    assert_eq!(source.logical_cluster().await.unwrap(), "lsrc-abcd");
    assert_eq!(source.identity_pool_id().await.unwrap(), "pool-1234");
    assert!(server.received_requests().await.unwrap().is_empty());

    assert_eq!(source.authorization_header().await.unwrap(), "Bearer abc");
    assert_eq!(source.authorization_header().await.unwrap(), "Bearer abc");
}

#[tokio::test]
async fn oauth_source_rejects_missing_fields_eagerly() {
    let mut config = BearerAuthConfig::oauth_bearer(
        "https://idp.example.com/token",
        "client-id",
        "client-secret",
        vec![],
        "lsrc-abcd",
        "pool-1234",
    );
    config.client_secret = None;
    let err = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap_err();
    assert!(matches!(err, AuthError::InvalidConfig(_)));

    config.issuer_endpoint_url = None;
    let err = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap_err();
    assert!(matches!(err, AuthError::InvalidConfig(_)));
}

#[tokio::test]
async fn static_token_that_cannot_be_a_header_value_is_rejected() {
    // Non-empty, but a line break would split the Authorization header.
    let err = AuthHeaderSource::from_config(
        &BearerAuthConfig::static_token("abc\nX-Injected: 1", "lsrc-abcd", "pool-1234"),
        reqwest::Client::new(),
    )
    .unwrap_err();
    assert!(matches!(err, AuthError::InvalidConfig(_)));
}

#[tokio::test]
async fn oauth_source_rejects_zero_fetch_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = BearerAuthConfig::oauth_bearer(
        format!("{}/token", server.uri()),
        "client-id",
        "client-secret",
        vec![],
        "lsrc-abcd",
        "pool-1234",
    )
    .with_token_fetch_timeout(Duration::ZERO);
    let err = AuthHeaderSource::from_config(&config, reqwest::Client::new()).unwrap_err();
    assert!(matches!(err, AuthError::InvalidConfig(_)));
}

#[tokio::test]
async fn cancelled_custom_provider_call_is_not_a_provider_failure() {
    let source = AuthHeaderSource::custom(StalledProvider);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = source
        .authorization_header_with_cancel(&cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Cancelled));
    assert!(err.provider_error().is_none());
}
