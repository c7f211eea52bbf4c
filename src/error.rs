//! Error Handling Module
//!
//! Errors are split in two layers:
//! - [`AuthError`] for everything the authentication header source produces
//! - [`ClientError`] for the registry REST wrapper, which wraps `AuthError`
//!
//! Every error type here is `Clone`. A single token refresh is shared by all
//! concurrent callers, and each of them receives the same error value.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by custom authentication header providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while building or querying an authentication header source.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The configuration is unusable. Raised at construction time only.
    #[error("invalid bearer auth configuration: {0}")]
    InvalidConfig(String),

    /// The OAuth token endpoint could not produce a token.
    #[error("token fetch failed: {0}")]
    TokenFetchFailed(#[source] Arc<TokenFetchError>),

    /// A custom authentication header provider returned an error.
    #[error("authentication header provider failed: {0}")]
    ProviderFailed(#[source] Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// The caller cancelled while a custom provider was still resolving the header.
    #[error("authentication header resolution cancelled")]
    Cancelled,
}

impl AuthError {
    /// Shorthand for [`AuthError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Wraps a custom provider failure, keeping the original error as the source.
    pub fn provider_failed(error: BoxError) -> Self {
        Self::ProviderFailed(Arc::from(error))
    }

    /// Returns the token fetch cause, if this is a fetch failure.
    pub fn token_fetch_error(&self) -> Option<&TokenFetchError> {
        match self {
            Self::TokenFetchFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Returns the original custom provider error, if this is a provider failure.
    pub fn provider_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::ProviderFailed(e) => Some(&**e),
            _ => None,
        }
    }

    /// Whether the failing request may be retried as a whole.
    ///
    /// Configuration errors are permanent; everything else is per-request.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidConfig(_))
    }
}

impl From<TokenFetchError> for AuthError {
    fn from(error: TokenFetchError) -> Self {
        Self::TokenFetchFailed(Arc::new(error))
    }
}

/// Causes of a failed OAuth client-credentials token request.
#[derive(Debug, Error)]
pub enum TokenFetchError {
    /// The request could not be sent or the response body could not be read.
    #[error("token endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response did not contain a usable access token.
    #[error("failed to decode token response: {0}")]
    Decode(String),

    /// The refresh did not finish within the configured fetch timeout.
    #[error("token fetch timed out after {0:?}")]
    Timeout(Duration),

    /// The refresh was aborted by its initiating caller.
    #[error("token fetch cancelled")]
    Cancelled,
}

/// Errors returned by [`crate::client::RestService`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Resolving authentication headers failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The registry URL or request path is not a valid URL.
    #[error("invalid registry url: {0}")]
    InvalidUrl(String),

    /// A resolved value cannot be carried in an HTTP header.
    #[error("invalid value for header {name}")]
    InvalidHeader { name: &'static str },

    /// Transport level failure talking to the registry.
    #[error("registry request failed: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(Arc::new(error))
    }
}

/// A convenient alias for results of authentication operations.
pub type Result<T, E = AuthError> = std::result::Result<T, E>;
