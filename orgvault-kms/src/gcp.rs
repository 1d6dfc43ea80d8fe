//! Google Cloud KMS over its REST API.

use crate::client::KmsClient;
use crate::config::{KmsConfig, KmsProvider};
use crate::error::{KmsError, KmsOperation, KmsResult};
use crate::rest::{build_http_client, post_json};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Serialize)]
struct EncryptRequest {
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Serialize)]
struct DecryptRequest {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Cloud KMS client calling `{name}:encrypt` and `{name}:decrypt`.
pub struct GcpKmsClient {
    client: Client,
    endpoint: String,
    key_name: String,
    access_token: String,
}

impl GcpKmsClient {
    pub fn new(config: &KmsConfig) -> KmsResult<Self> {
        let access_token = config
            .access_token
            .clone()
            .ok_or_else(|| KmsError::Config("gcp provider needs an access token".into()))?;

        Ok(Self {
            client: build_http_client(Duration::from_secs(config.request_timeout_secs))?,
            endpoint: config.gcp_endpoint().to_string(),
            key_name: config.key_id.trim_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, verb: &str) -> String {
        format!("{}/{}:{verb}", self.endpoint, self.key_name)
    }
}

#[async_trait]
impl KmsClient for GcpKmsClient {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Gcp
    }

    fn key_id(&self) -> &str {
        &self.key_name
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let request = EncryptRequest {
            plaintext: STANDARD.encode(plaintext),
        };
        let resp: EncryptResponse = post_json(
            &self.client,
            &self.url("encrypt"),
            &self.access_token,
            &request,
            KmsOperation::Wrap,
        )
        .await?;

        let wrapped = STANDARD
            .decode(resp.ciphertext)
            .map_err(|e| KmsError::Provider(format!("encrypt returned invalid base64: {e}")))?;
        debug!("wrapped data key with {}", self.key_name);
        Ok(wrapped)
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        let request = DecryptRequest {
            ciphertext: STANDARD.encode(wrapped),
        };
        let resp: DecryptResponse = post_json(
            &self.client,
            &self.url("decrypt"),
            &self.access_token,
            &request,
            KmsOperation::Unwrap,
        )
        .await?;

        let encoded = Zeroizing::new(resp.plaintext);
        STANDARD
            .decode(encoded.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| KmsError::Provider(format!("decrypt returned invalid base64: {e}")))
    }
}
