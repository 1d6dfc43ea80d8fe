//! Key-management service clients for orgvault.
//!
//! Every organization data key is wrapped by a master key that never leaves
//! the KMS. This crate exposes one [`KmsClient`] trait with a struct per
//! provider:
//! - AWS KMS via the official SDK
//! - Google Cloud KMS and Azure Key Vault via their REST APIs
//! - A local static-key provider for development and tests
//!
//! The provider is picked at startup from [`KmsConfig`].

pub mod aws;
pub mod azure;
pub mod client;
pub mod config;
pub mod error;
pub mod gcp;
pub mod local;
mod rest;

pub use aws::AwsKmsClient;
pub use azure::AzureKmsClient;
pub use client::{DATA_KEY_SIZE, GeneratedKey, KmsClient};
pub use config::{KmsConfig, KmsProvider};
pub use error::{KmsError, KmsResult};
pub use gcp::GcpKmsClient;
pub use local::LocalKmsClient;

use std::sync::Arc;
use tracing::info;

/// Builds the client selected by `config.provider`.
pub async fn connect(config: &KmsConfig) -> KmsResult<Arc<dyn KmsClient>> {
    config.validate()?;

    let client: Arc<dyn KmsClient> = match config.provider {
        KmsProvider::Aws => Arc::new(AwsKmsClient::connect(config).await?),
        KmsProvider::Gcp => Arc::new(GcpKmsClient::new(config)?),
        KmsProvider::Azure => Arc::new(AzureKmsClient::new(config)?),
        KmsProvider::Local => Arc::new(LocalKmsClient::from_config(config)?),
    };

    info!(provider = %client.provider(), key_id = %client.key_id(), "KMS client ready");
    Ok(client)
}
