//! AWS KMS through the official SDK.

use crate::client::{GeneratedKey, KmsClient};
use crate::config::{KmsConfig, KmsProvider};
use crate::error::{KmsError, KmsOperation, KmsResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_kms::Client;
use aws_sdk_kms::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::DataKeySpec;
use aws_types::SdkConfig;
use aws_types::region::Region;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroizing;

/// AWS KMS client using `Encrypt`, `Decrypt` and `GenerateDataKey`.
pub struct AwsKmsClient {
    client: Client,
    key_id: String,
}

impl AwsKmsClient {
    /// Loads credentials from the default AWS provider chain.
    ///
    /// SDK retries are disabled; the caller decides whether to retry.
    pub async fn connect(config: &KmsConfig) -> KmsResult<Self> {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.request_timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts);

        if let Some(ref region) = config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        debug!(
            "AWS KMS client configured for key {} in {:?}",
            config.key_id,
            sdk_config.region()
        );
        Ok(Self::from_sdk_config(&sdk_config, config.key_id.clone()))
    }

    /// Builds a client from an already-loaded SDK config.
    pub fn from_sdk_config(sdk_config: &SdkConfig, key_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(sdk_config),
            key_id: key_id.into(),
        }
    }
}

/// Maps an SDK failure onto the normalized categories by AWS error code.
fn classify<E>(op: KmsOperation, err: SdkError<E>) -> KmsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = format!("{op} failed: {}", DisplayErrorContext(&err));

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            return KmsError::Unavailable(detail);
        }
        SdkError::ConstructionFailure(_) => return KmsError::Config(detail),
        _ => {}
    }

    match err.code() {
        Some("NotFoundException") => KmsError::KeyNotFound(detail),
        Some("InvalidCiphertextException" | "IncorrectKeyException") => {
            KmsError::InvalidCiphertext(detail)
        }
        Some(
            "AccessDeniedException"
            | "DisabledException"
            | "KMSInvalidStateException"
            | "InvalidGrantTokenException"
            | "UnrecognizedClientException",
        ) => KmsError::PermissionDenied(detail),
        Some(
            "KMSInternalException"
            | "DependencyTimeoutException"
            | "KeyUnavailableException"
            | "ThrottlingException"
            | "LimitExceededException",
        ) => KmsError::Unavailable(detail),
        _ if err
            .raw_response()
            .is_some_and(|resp| resp.status().is_server_error()) =>
        {
            KmsError::Unavailable(detail)
        }
        _ => KmsError::Provider(detail),
    }
}

fn blob_bytes(blob: Option<&Blob>, field: &str, op: KmsOperation) -> KmsResult<Vec<u8>> {
    blob.map(|b| b.as_ref().to_vec())
        .ok_or_else(|| KmsError::Provider(format!("{op} response missing {field}")))
}

#[async_trait]
impl KmsClient for AwsKmsClient {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Aws
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let out = self
            .client
            .encrypt()
            .key_id(&self.key_id)
            .plaintext(Blob::new(plaintext.to_vec()))
            .send()
            .await
            .map_err(|e| classify(KmsOperation::Wrap, e))?;

        blob_bytes(out.ciphertext_blob(), "CiphertextBlob", KmsOperation::Wrap)
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        let out = self
            .client
            .decrypt()
            .key_id(&self.key_id)
            .ciphertext_blob(Blob::new(wrapped.to_vec()))
            .send()
            .await
            .map_err(|e| classify(KmsOperation::Unwrap, e))?;

        blob_bytes(out.plaintext(), "Plaintext", KmsOperation::Unwrap).map(Zeroizing::new)
    }

    async fn generate_data_key(&self) -> KmsResult<GeneratedKey> {
        let op = KmsOperation::GenerateDataKey;
        let out = self
            .client
            .generate_data_key()
            .key_id(&self.key_id)
            .key_spec(DataKeySpec::Aes256)
            .send()
            .await
            .map_err(|e| classify(op, e))?;

        Ok(GeneratedKey {
            plaintext: Zeroizing::new(blob_bytes(out.plaintext(), "Plaintext", op)?),
            wrapped: blob_bytes(out.ciphertext_blob(), "CiphertextBlob", op)?,
        })
    }
}
