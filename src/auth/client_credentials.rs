//! OAuth 2.0 client credentials authentication.
//!
//! The provider exchanges a client id and secret for an access token at the
//! issuer's token endpoint, caches the token in memory and fetches a new one
//! on demand once the cached one is within the refresh skew of its expiry.
//!
//! Concurrent callers that find the token expired coalesce onto a single
//! in-flight request: the first one installs a shared refresh future, the rest
//! await it and observe the same outcome. Only one token request is ever in
//! flight per provider.

use super::clock::{Clock, SystemClock};
use crate::error::{AuthError, Result, TokenFetchError};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long before expiry a cached token stops being used.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(10);
/// Upper bound on a single token request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const GRANT_TYPE: &str = "client_credentials";

/// Token endpoint parameters that never change after construction.
struct TokenEndpoint {
    url: Url,
    client_id: String,
    client_secret: SecretString,
    scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "expires_in_serde::deserialize")]
    expires_in: Option<i64>,
}

/// Some issuers send `expires_in` as a numeric string.
mod expires_in_serde {
    use serde::{Deserialize, Deserializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lifetime {
        Seconds(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Lifetime>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Lifetime::Seconds(secs)) => Ok(Some(secs)),
            Some(Lifetime::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid expires_in {text:?}: {e}"))),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: SecretString,
    /// `None` when the issuer did not report a lifetime.
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(skew)
                .is_some_and(|deadline| now < deadline),
            None => true,
        }
    }

    fn header(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<CachedToken>>>;

struct Flight {
    id: u64,
    future: SharedFetch,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TokenState {
    cached: Option<CachedToken>,
    in_flight: Option<Flight>,
    next_flight_id: u64,
}

/// OAuth 2.0 client credentials authentication provider.
///
/// Cheap to clone; clones share the token cache and the in-flight refresh.
#[derive(Clone)]
pub struct ClientCredentialsProvider {
    endpoint: Arc<TokenEndpoint>,
    logical_cluster: String,
    identity_pool_id: String,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    refresh_skew: Duration,
    fetch_timeout: Duration,
    state: Arc<Mutex<TokenState>>,
}

impl ClientCredentialsProvider {
    /// Creates a new client credentials provider.
    ///
    /// Rejects an empty or unparsable issuer URL and an empty client id or
    /// secret. An empty scope list is valid and means no scope restriction.
    /// No network access happens here.
    pub fn new(
        issuer_endpoint_url: impl AsRef<str>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
        logical_cluster: impl Into<String>,
        identity_pool_id: impl Into<String>,
    ) -> Result<Self> {
        let issuer = issuer_endpoint_url.as_ref().trim();
        if issuer.is_empty() {
            return Err(AuthError::invalid_config(
                "bearer.auth.issuer.endpoint.url must not be empty",
            ));
        }
        let url = Url::parse(issuer).map_err(|e| {
            AuthError::invalid_config(format!(
                "bearer.auth.issuer.endpoint.url is not a valid URL: {e}"
            ))
        })?;
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(AuthError::invalid_config("bearer.auth.client.id must not be empty"));
        }
        let client_secret = client_secret.into();
        if client_secret.is_empty() {
            return Err(AuthError::invalid_config(
                "bearer.auth.client.secret must not be empty",
            ));
        }

        Ok(Self {
            endpoint: Arc::new(TokenEndpoint {
                url,
                client_id,
                client_secret: SecretString::from(client_secret),
                scopes: scopes.into_iter().filter(|s| !s.is_empty()).collect(),
            }),
            logical_cluster: logical_cluster.into(),
            identity_pool_id: identity_pool_id.into(),
            http: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
            refresh_skew: DEFAULT_REFRESH_SKEW,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            state: Arc::new(Mutex::new(TokenState::default())),
        })
    }

    /// Use a shared HTTP client for token requests.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replace the time source used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Bound each token request. A zero timeout could never yield a token and
    /// is rejected.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(AuthError::invalid_config(
                "token fetch timeout must be greater than zero",
            ));
        }
        self.fetch_timeout = timeout;
        Ok(self)
    }

    pub fn issuer_endpoint_url(&self) -> &str {
        self.endpoint.url.as_str()
    }

    pub fn client_id(&self) -> &str {
        &self.endpoint.client_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.endpoint.scopes
    }

    pub fn logical_cluster(&self) -> &str {
        &self.logical_cluster
    }

    pub fn identity_pool_id(&self) -> &str {
        &self.identity_pool_id
    }

    /// Returns `Bearer <access token>`, fetching a token if the cache is cold or stale.
    pub async fn authorization_header(&self) -> Result<String> {
        self.authorization_header_with_cancel(&CancellationToken::new())
            .await
    }

    /// Like [`authorization_header`](Self::authorization_header), observing `cancel`.
    ///
    /// If this call starts the refresh, cancelling `cancel` (or dropping the
    /// returned future) aborts the token request, and every caller waiting on
    /// it fails with [`TokenFetchError::Cancelled`]. If this call only waits on
    /// a refresh started elsewhere, cancelling stops the wait and leaves the
    /// refresh running for the others.
    pub async fn authorization_header_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let (future, initiator_guard) = {
            let mut state = self.lock_state();
            let now = self.clock.now();
            let skew = self.skew();
            if let Some(token) = state.cached.as_ref()
                && token.is_valid(now, skew)
            {
                tracing::trace!(target: "schema_registry_auth::auth", "using cached access token");
                return Ok(token.header());
            }

            let waiting = state
                .in_flight
                .as_ref()
                .filter(|flight| !flight.cancel.is_cancelled())
                .map(|flight| (flight.id, flight.future.clone()));
            match waiting {
                Some((id, future)) => {
                    tracing::debug!(target: "schema_registry_auth::auth", flight = id, "waiting for in-flight token refresh");
                    (future, None)
                }
                None => {
                    let flight_cancel = cancel.child_token();
                    let future = self.start_flight(&mut state, flight_cancel.clone());
                    (future, Some(flight_cancel.drop_guard()))
                }
            }
        };

        let result = tokio::select! {
            result = future => result,
            _ = cancel.cancelled() => Err(TokenFetchError::Cancelled.into()),
        };

        // The refresh ran to completion; nothing left to abort.
        if let Some(guard) = initiator_guard {
            guard.disarm();
        }

        result.map(|token| token.header())
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub fn invalidate(&self) {
        self.lock_state().cached = None;
    }

    fn start_flight(&self, state: &mut TokenState, cancel: CancellationToken) -> SharedFetch {
        let id = state.next_flight_id;
        state.next_flight_id += 1;

        let endpoint = Arc::clone(&self.endpoint);
        let http = self.http.clone();
        let clock = Arc::clone(&self.clock);
        let shared_state = Arc::clone(&self.state);
        let fetch_timeout = self.fetch_timeout;
        let flight_cancel = cancel.clone();

        tracing::debug!(
            target: "schema_registry_auth::auth",
            flight = id,
            issuer = %endpoint.url,
            client_id = %endpoint.client_id,
            "refreshing access token"
        );

        let future = async move {
            let outcome = tokio::select! {
                _ = flight_cancel.cancelled() => Err(TokenFetchError::Cancelled),
                fetched = tokio::time::timeout(fetch_timeout, request_token(&http, &endpoint)) => {
                    fetched.unwrap_or_else(|_| Err(TokenFetchError::Timeout(fetch_timeout)))
                }
            };

            let mut state = shared_state.lock().unwrap_or_else(|e| e.into_inner());
            if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
                state.in_flight = None;
            }
            match outcome {
                Ok(response) => {
                    let now = clock.now();
                    let token = CachedToken {
                        access_token: SecretString::from(response.access_token),
                        expires_at: response
                            .expires_in
                            .and_then(chrono::Duration::try_seconds)
                            .and_then(|lifetime| now.checked_add_signed(lifetime)),
                    };
                    tracing::info!(
                        target: "schema_registry_auth::auth",
                        flight = id,
                        token_type = response.token_type.as_deref().unwrap_or("unspecified"),
                        expires_at = ?token.expires_at,
                        "access token refreshed"
                    );
                    state.cached = Some(token.clone());
                    Ok(token)
                }
                Err(error) => {
                    tracing::warn!(target: "schema_registry_auth::auth", flight = id, %error, "access token refresh failed");
                    Err(AuthError::from(error))
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(Flight {
            id,
            future: future.clone(),
            cancel,
        });
        future
    }

    fn skew(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.refresh_skew).unwrap_or(chrono::Duration::MAX)
    }

    fn lock_state(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for ClientCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsProvider")
            .field("issuer_endpoint_url", &self.endpoint.url.as_str())
            .field("client_id", &self.endpoint.client_id)
            .field("scopes", &self.endpoint.scopes)
            .field("logical_cluster", &self.logical_cluster)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("refresh_skew", &self.refresh_skew)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

/// Perform the client credentials grant.
async fn request_token(
    http: &reqwest::Client,
    endpoint: &TokenEndpoint,
) -> std::result::Result<TokenResponse, TokenFetchError> {
    let scope = endpoint.scopes.join(" ");
    let mut form = vec![
        ("grant_type", GRANT_TYPE),
        ("client_id", endpoint.client_id.as_str()),
        ("client_secret", endpoint.client_secret.expose_secret()),
    ];
    if !scope.is_empty() {
        form.push(("scope", scope.as_str()));
    }

    let response = http
        .post(endpoint.url.clone())
        .header(ACCEPT, "application/json")
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TokenFetchError::Status { status, body });
    }

    let body = response.text().await?;
    let token: TokenResponse =
        serde_json::from_str(&body).map_err(|e| TokenFetchError::Decode(e.to_string()))?;
    if token.access_token.is_empty() {
        return Err(TokenFetchError::Decode(
            "access_token is empty".to_string(),
        ));
    }
    Ok(token)
}
