//! In-process KMS backed by a static master key.
//!
//! Wrapped keys are `[nonce:24][ciphertext || tag:16]` sealed with
//! XChaCha20-Poly1305, with the key id as associated data so a blob wrapped
//! under one local key id is rejected by another.

use crate::client::KmsClient;
use crate::config::{KmsConfig, KmsProvider};
use crate::error::{KmsError, KmsResult};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use zeroize::Zeroizing;

const MASTER_KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;
const TAG_SIZE: usize = 16;

pub struct LocalKmsClient {
    key_id: String,
    master: Zeroizing<[u8; MASTER_KEY_SIZE]>,
}

impl LocalKmsClient {
    pub fn new(key_id: impl Into<String>, master_key: &[u8]) -> KmsResult<Self> {
        if master_key.len() != MASTER_KEY_SIZE {
            return Err(KmsError::Config(format!(
                "local master key must be {MASTER_KEY_SIZE} bytes, got {}",
                master_key.len()
            )));
        }
        let mut master = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
        master.copy_from_slice(master_key);
        Ok(Self {
            key_id: key_id.into(),
            master,
        })
    }

    /// Creates a client with a random master key. Nothing it wraps survives
    /// the process.
    pub fn ephemeral(key_id: impl Into<String>) -> Self {
        let mut master = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
        rand::rng().fill_bytes(master.as_mut_slice());
        Self {
            key_id: key_id.into(),
            master,
        }
    }

    pub fn from_config(config: &KmsConfig) -> KmsResult<Self> {
        let encoded = config
            .local_master_key
            .as_deref()
            .ok_or_else(|| KmsError::Config("local provider needs a master key".into()))?;
        let bytes = Zeroizing::new(
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| KmsError::Config(format!("local master key is not base64: {e}")))?,
        );
        Self::new(config.key_id.clone(), &bytes)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.master.as_slice()))
    }
}

#[async_trait]
impl KmsClient for LocalKmsClient {
    fn provider(&self) -> KmsProvider {
        KmsProvider::Local
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn wrap_key(&self, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = self
            .cipher()
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: self.key_id.as_bytes(),
                },
            )
            .map_err(|e| KmsError::Provider(format!("local wrap failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    async fn unwrap_key(&self, wrapped: &[u8]) -> KmsResult<Zeroizing<Vec<u8>>> {
        if wrapped.len() < NONCE_SIZE + TAG_SIZE {
            return Err(KmsError::InvalidCiphertext(format!(
                "wrapped key too short: {} bytes",
                wrapped.len()
            )));
        }
        let (nonce, sealed) = wrapped.split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: self.key_id.as_bytes(),
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| KmsError::InvalidCiphertext("local unwrap failed authentication".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wrap_unwrap_roundtrip() {
        let kms = LocalKmsClient::ephemeral("test-key");
        let wrapped = kms.wrap_key(&[7u8; 32]).await.unwrap();
        assert_eq!(wrapped.len(), NONCE_SIZE + 32 + TAG_SIZE);
        assert_eq!(kms.unwrap_key(&wrapped).await.unwrap().as_slice(), &[7u8; 32]);
    }

    #[tokio::test]
    async fn other_key_id_rejects_blob() {
        let master = [1u8; 32];
        let a = LocalKmsClient::new("key-a", &master).unwrap();
        let b = LocalKmsClient::new("key-b", &master).unwrap();
        let wrapped = a.wrap_key(b"data key material").await.unwrap();
        assert!(matches!(
            b.unwrap_key(&wrapped).await,
            Err(KmsError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn short_master_key_is_config_error() {
        assert!(matches!(
            LocalKmsClient::new("k", &[0u8; 16]),
            Err(KmsError::Config(_))
        ));
    }
}
