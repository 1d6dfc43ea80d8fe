//! Field-level encryption for organization data.
//!
//! Provides the cipher every sensitive column goes through:
//! - XChaCha20-Poly1305 with a fresh random nonce per call
//! - A closed set of field contexts bound into the associated data
//! - A self-describing blob layout that carries the DEK version
//!
//! # Architecture
//!
//! Keys are scoped to an organization and come from the key resolver in
//! `orgvault-keys`. This crate never sees where a key came from; it only
//! needs the key bytes, the version they were installed under, and the
//! semantic field being protected.
//!
//! A blob sealed for one field (say [`FieldContext::EmailSubject`]) cannot be
//! opened as another field (say [`FieldContext::CalendarTitle`]), even with
//! the right key. Decryption under the wrong context fails exactly like a
//! tampered ciphertext.

mod blob;
mod cipher;
mod context;
mod error;
mod key;

pub use blob::{EncryptedBlob, BLOB_FORMAT_V1, HEADER_SIZE, NONCE_SIZE, TAG_SIZE};
pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_string};
pub use context::FieldContext;
pub use error::{CryptoError, CryptoResult};
pub use key::{DataKey, KEY_SIZE};
