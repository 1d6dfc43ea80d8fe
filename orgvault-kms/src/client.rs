//! The provider-neutral KMS interface.

use crate::config::KmsProvider;
use crate::error::KmsResult;
use async_trait::async_trait;
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Size of an organization data key in bytes.
pub const DATA_KEY_SIZE: usize = 32;

/// A freshly generated data key and its wrapped form.
pub struct GeneratedKey {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub wrapped: Vec<u8>,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("plaintext", &"[REDACTED]")
            .field("wrapped_len", &self.wrapped.len())
            .finish()
    }
}

/// Wraps and unwraps data keys with a master key held by a KMS.
///
/// Implementations perform exactly one provider call per method and never
/// retry. Dropping the returned future abandons the request.
#[async_trait]
pub trait KmsClient: Send + Sync {
    fn provider(&self) -> KmsProvider;

    /// Identifier of the master key used for wrapping.
    fn key_id(&self) -> &str;

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>>;

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>>;

    /// Generates a new data key. The default draws from the local CSPRNG and
    /// wraps the result; providers with a native operation override it.
    async fn generate_data_key(&self) -> KmsResult<GeneratedKey> {
        let mut plaintext = Zeroizing::new(vec![0u8; DATA_KEY_SIZE]);
        rand::rng().fill_bytes(plaintext.as_mut_slice());
        let wrapped = self.wrap_key(&plaintext).await?;
        Ok(GeneratedKey { plaintext, wrapped })
    }
}
