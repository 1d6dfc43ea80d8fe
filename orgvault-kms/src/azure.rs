//! Azure Key Vault key wrapping over its REST API.

use crate::client::KmsClient;
use crate::config::{KmsConfig, KmsProvider};
use crate::error::{KmsError, KmsOperation, KmsResult};
use crate::rest::{build_http_client, post_json};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroizing;

const API_VERSION: &str = "7.4";
const WRAP_ALGORITHM: &str = "RSA-OAEP-256";

#[derive(Serialize)]
struct KeyOperationRequest<'a> {
    alg: &'a str,
    value: String,
}

#[derive(Deserialize)]
struct KeyOperationResult {
    value: String,
}

/// Key Vault client using `wrapkey` / `unwrapkey` on a key URL.
pub struct AzureKmsClient {
    client: Client,
    key_url: String,
    access_token: String,
}

impl AzureKmsClient {
    pub fn new(config: &KmsConfig) -> KmsResult<Self> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| KmsError::Config("azure provider needs an access token".into()))?;

        Ok(Self {
            client: build_http_client(Duration::from_secs(config.request_timeout_secs))?,
            key_url: config.key_id.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    async fn key_operation(
        &self,
        operation: &str,
        value: &[u8],
        op: KmsOperation,
    ) -> KmsResult<Vec<u8>> {
        let url = format!("{}/{operation}?api-version={API_VERSION}", self.key_url);
        let request = KeyOperationRequest {
            alg: WRAP_ALGORITHM,
            value: URL_SAFE_NO_PAD.encode(value),
        };
        let resp: KeyOperationResult =
            post_json(&self.client, &url, &self.access_token, &request, op).await?;

        // Key Vault emits unpadded base64url, but tolerate padding.
        URL_SAFE_NO_PAD
            .decode(resp.value.trim_end_matches('='))
            .map_err(|e| KmsError::Provider(format!("{operation} returned invalid base64url: {e}")))
    }
}

#[async_trait]
impl KmsClient for AzureKmsClient {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Azure
    }

    fn key_id(&self) -> &str {
        &self.key_url
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        self.key_operation("wrapkey", plaintext, KmsOperation::Wrap)
            .await
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        self.key_operation("unwrapkey", wrapped, KmsOperation::Unwrap)
            .await
            .map(Zeroizing::new)
    }
}
