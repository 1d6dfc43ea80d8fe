//! Org crypto error types.

use orgvault_crypto::CryptoError;
use orgvault_kms::KmsError;
use thiserror::Error;

/// Result type for organization-scoped crypto operations.
pub type OrgCryptoResult<T> = Result<T, OrgCryptoError>;

/// Errors surfaced by the org crypto facade and key lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrgCryptoError {
    /// The KMS could not be reached or refused the call. Retryable only when
    /// the underlying error is.
    #[error("KMS unavailable: {0}")]
    KmsUnavailable(KmsError),

    /// No usable DEK for the organization (missing, retired, or unwrappable).
    #[error("DEK unavailable for org {org_id}: {reason}")]
    DekUnavailable { org_id: String, reason: String },

    #[error("authentication failed (wrong key, wrong context, or tampered data)")]
    AuthenticationFailed,

    #[error("malformed blob: {0}")]
    MalformedBlob(String),

    #[error("org {0} is already provisioned")]
    AlreadyProvisioned(String),

    /// Another writer installed a DEK version first. `expected` is the
    /// version the caller built on, `found` the one actually current.
    #[error("DEK version conflict for org {org_id}: expected active version {expected}, found {found}")]
    VersionConflict {
        org_id: String,
        expected: u32,
        found: u32,
    },

    #[error("invalid DEK version {version} for org {org_id}: {reason}")]
    InvalidVersion {
        org_id: String,
        version: u32,
        reason: String,
    },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key store error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OrgCryptoError {
    pub(crate) fn dek_unavailable(org_id: &str, reason: impl Into<String>) -> Self {
        OrgCryptoError::DekUnavailable {
            org_id: org_id.to_string(),
            reason: reason.into(),
        }
    }

    /// True when retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrgCryptoError::KmsUnavailable(e) if e.is_retryable())
    }

    /// Failures confined to a single field value; other fields of the same
    /// organization are unaffected.
    pub fn is_field_level(&self) -> bool {
        matches!(
            self,
            OrgCryptoError::AuthenticationFailed | OrgCryptoError::MalformedBlob(_)
        )
    }

    /// Failures that affect every field of the organization.
    pub fn is_org_fatal(&self) -> bool {
        matches!(
            self,
            OrgCryptoError::KmsUnavailable(_) | OrgCryptoError::DekUnavailable { .. }
        )
    }
}

impl From<CryptoError> for OrgCryptoError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => OrgCryptoError::AuthenticationFailed,
            CryptoError::MalformedBlob(msg) => OrgCryptoError::MalformedBlob(msg),
            other => OrgCryptoError::Encryption(other.to_string()),
        }
    }
}

/// Sorts a KMS failure into "the key is gone" versus "the KMS is not
/// answering right now".
pub(crate) fn from_kms(org_id: &str, err: KmsError) -> OrgCryptoError {
    match err {
        KmsError::KeyNotFound(reason) => {
            OrgCryptoError::dek_unavailable(org_id, format!("master key not found: {reason}"))
        }
        KmsError::InvalidCiphertext(reason) => {
            OrgCryptoError::dek_unavailable(org_id, format!("wrapped DEK rejected: {reason}"))
        }
        other => OrgCryptoError::KmsUnavailable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kms_classification() {
        assert!(matches!(
            from_kms("org-1", KmsError::KeyNotFound("gone".into())),
            OrgCryptoError::DekUnavailable { .. }
        ));
        assert!(matches!(
            from_kms("org-1", KmsError::InvalidCiphertext("bad".into())),
            OrgCryptoError::DekUnavailable { .. }
        ));
        for err in [
            KmsError::Unavailable("timeout".into()),
            KmsError::PermissionDenied("denied".into()),
            KmsError::Provider("odd".into()),
            KmsError::Config("bad".into()),
        ] {
            assert!(matches!(
                from_kms("org-1", err),
                OrgCryptoError::KmsUnavailable(_)
            ));
        }
    }

    #[test]
    fn only_transient_kms_errors_are_retryable() {
        assert!(OrgCryptoError::KmsUnavailable(KmsError::Unavailable("x".into())).is_retryable());
        assert!(
            !OrgCryptoError::KmsUnavailable(KmsError::PermissionDenied("x".into())).is_retryable()
        );
        assert!(!OrgCryptoError::AuthenticationFailed.is_retryable());
    }

    #[test]
    fn crypto_errors_convert() {
        assert_eq!(
            OrgCryptoError::from(CryptoError::AuthenticationFailed),
            OrgCryptoError::AuthenticationFailed
        );
        assert!(OrgCryptoError::from(CryptoError::MalformedBlob("x".into())).is_field_level());
    }
}
