//! # schema-registry-auth
//!
//! Bearer authentication for schema registry clients.
//!
//! Multi-tenant registries expect three values on every request: an
//! `Authorization` header, the logical cluster id and the identity pool id.
//! This crate resolves them from one of three credential sources:
//!
//! - **Static token** - a bearer token issued out of band
//! - **OAuth bearer** - an OAuth 2.0 client credentials token, cached and
//!   refreshed on demand with at most one token request in flight
//! - **Custom** - any type implementing [`AuthenticationHeaderProvider`]
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use schema_registry_auth::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistryClientConfig::new("https://psrc-1234.us-east-1.aws.confluent.cloud")
//!     .with_bearer_auth(BearerAuthConfig::oauth_bearer(
//!         "https://idp.example.com/oauth2/token",
//!         "client-id",
//!         "client-secret",
//!         vec!["schema_registry".to_string()],
//!         "lsrc-abcd",
//!         "pool-1234",
//!     ));
//! let service = RestService::new(config)?;
//!
//! let request = service.request(reqwest::Method::GET, "subjects")?;
//! let subjects: Vec<String> = service.send(request).await?.json().await?;
//! println!("{subjects:?}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use auth::{
    AuthHeaderSource, AuthenticationHeaderProvider, ClientCredentialsProvider,
    CredentialsSourceKind, StaticTokenProvider,
};
pub use client::RestService;
pub use config::{BearerAuthConfig, RegistryClientConfig};
pub use error::{AuthError, BoxError, ClientError, Result, TokenFetchError};

/// Commonly used types.
pub mod prelude {
    pub use crate::auth::{
        AuthHeaderSource, AuthenticationHeaderProvider, ClientCredentialsProvider,
        CredentialsSourceKind, StaticTokenProvider,
    };
    pub use crate::client::RestService;
    pub use crate::config::{BearerAuthConfig, RegistryClientConfig};
    pub use crate::error::{AuthError, BoxError, ClientError, TokenFetchError};
}
