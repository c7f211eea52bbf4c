//! Bearer Authentication Example
//!
//! Lists registry subjects three times, once per credentials source:
//! a static token, OAuth client credentials, and a custom header provider.
//!
//! Run with:
//! ```bash
//! RUST_LOG=schema_registry_auth=debug cargo run --example bearer_authentication
//! ```

use schema_registry_auth::prelude::*;
use std::sync::Arc;

const SR_URL: &str = "https://psrc-1234.us-east-1.aws.confluent.cloud";
const TOKEN_URL: &str = "https://your-idp.example.com/oauth2/token";
const CLIENT_ID: &str = "your-client-id";
const CLIENT_SECRET: &str = "your-client-secret";
const IDENTITY_POOL_ID: &str = "pool-1234";
const LOGICAL_CLUSTER: &str = "lsrc-abcd";

/// A provider that hands out a fixed token.
struct CustomHeaderProvider {
    token: String,
    logical_cluster: String,
    identity_pool_id: String,
}

#[async_trait::async_trait]
impl AuthenticationHeaderProvider for CustomHeaderProvider {
    async fn authentication_header(&self) -> Result<String, BoxError> {
        Ok(format!("Bearer {}", self.token))
    }

    async fn logical_cluster(&self) -> Result<String, BoxError> {
        Ok(self.logical_cluster.clone())
    }

    async fn identity_pool_id(&self) -> Result<String, BoxError> {
        Ok(self.identity_pool_id.clone())
    }
}

async fn list_subjects(service: &RestService) -> Result<Vec<String>, ClientError> {
    let request = service.request(reqwest::Method::GET, "subjects")?;
    let response = service.send(request).await?;
    Ok(response.json().await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "schema_registry_auth=info".into()),
        )
        .init();

    // Static token
    let static_client = RestService::new(RegistryClientConfig::with_bearer_authentication(
        SR_URL,
        "token",
        LOGICAL_CLUSTER,
        IDENTITY_POOL_ID,
    ))?;
    match list_subjects(&static_client).await {
        Ok(subjects) => println!("Static token subjects: {subjects:?}"),
        Err(e) => {
            println!("Error fetching subjects: {e}");
            return Ok(());
        }
    }

    // OAuth client credentials
    let oauth_client = RestService::new(RegistryClientConfig::new(SR_URL).with_bearer_auth(
        BearerAuthConfig::oauth_bearer(
            TOKEN_URL,
            CLIENT_ID,
            CLIENT_SECRET,
            vec!["schema_registry".to_string()],
            LOGICAL_CLUSTER,
            IDENTITY_POOL_ID,
        ),
    ))?;
    match list_subjects(&oauth_client).await {
        Ok(subjects) => println!("OAuthBearer subjects: {subjects:?}"),
        Err(e) => {
            println!("Error fetching subjects: {e}");
            return Ok(());
        }
    }

    // Custom
    let custom_client = RestService::new(RegistryClientConfig::new(SR_URL).with_bearer_auth(
        BearerAuthConfig::custom(Arc::new(CustomHeaderProvider {
            token: "customToken".to_string(),
            logical_cluster: LOGICAL_CLUSTER.to_string(),
            identity_pool_id: IDENTITY_POOL_ID.to_string(),
        })),
    ))?;
    match list_subjects(&custom_client).await {
        Ok(subjects) => println!("Custom provider subjects: {subjects:?}"),
        Err(e) => println!("Error fetching subjects: {e}"),
    }

    Ok(())
}
