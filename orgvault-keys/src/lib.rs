//! Organization-scoped envelope encryption.
//!
//! Each organization owns a versioned data encryption key (DEK), stored
//! wrapped by the KMS. [`OrgCrypto`] is the only way to use one:
//! - `encrypt_for_org` seals under the active version
//! - `decrypt_for_org` opens with whatever version the blob names
//! - batch variants isolate failures per item
//!
//! Unwrapped DEKs are held in an injected [`DekCache`] with a TTL and are
//! never handed to callers.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod lifecycle;
mod resolver;
pub mod store;

pub use batch::{DECRYPT_PLACEHOLDER, FieldValue};
pub use cache::DekCache;
pub use config::OrgCryptoConfig;
pub use error::{OrgCryptoError, OrgCryptoResult};
pub use facade::OrgCrypto;
pub use lifecycle::{OrgKeyLifecycle, RotationOutcome};
pub use store::{MemoryOrgKeyStore, OrgKeyStore, WrappedDek};

pub use orgvault_crypto::{EncryptedBlob, FieldContext};
