//! KMS provider selection and connection settings.

use crate::error::{KmsError, KmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default Cloud KMS REST base URL.
pub const GCP_DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";

/// Which KMS backs the master key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KmsProvider {
    Aws,
    Gcp,
    Azure,
    /// Static master key held in process memory. Development and tests only.
    Local,
}

impl KmsProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            KmsProvider::Aws => "aws",
            KmsProvider::Gcp => "gcp",
            KmsProvider::Azure => "azure",
            KmsProvider::Local => "local",
        }
    }
}

impl fmt::Display for KmsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KmsProvider {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(KmsProvider::Aws),
            "gcp" => Ok(KmsProvider::Gcp),
            "azure" => Ok(KmsProvider::Azure),
            "local" => Ok(KmsProvider::Local),
            other => Err(KmsError::Config(format!(
                "unknown KMS provider {other:?} (expected aws, gcp, azure or local)"
            ))),
        }
    }
}

/// Configuration for connecting to the KMS.
#[derive(Clone, Serialize, Deserialize)]
pub struct KmsConfig {
    pub provider: KmsProvider,

    /// Master key identifier: an AWS key id/ARN/alias, a Cloud KMS
    /// `projects/.../cryptoKeys/...` name, or a Key Vault key URL.
    pub key_id: String,

    /// AWS region. Falls back to the default provider chain when unset.
    pub region: Option<String>,

    /// Endpoint override (AWS-compatible endpoint or Cloud KMS base URL).
    pub endpoint: Option<String>,

    /// Bearer token for the REST providers.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Base64 master key for the local provider.
    #[serde(default, skip_serializing)]
    pub local_master_key: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            provider: KmsProvider::Local,
            key_id: "orgvault-local".to_string(),
            region: None,
            endpoint: None,
            access_token: None,
            local_master_key: None,
            request_timeout_secs: 10,
        }
    }
}

impl fmt::Debug for KmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsConfig")
            .field("provider", &self.provider)
            .field("key_id", &self.key_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "local_master_key",
                &self.local_master_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl KmsConfig {
    /// Reads `KMS_*` variables from the process environment.
    pub fn from_env() -> KmsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// `KMS_PROVIDER` is required. `KMS_KEY_ID` is required for every provider
    /// except `local`.
    pub fn from_lookup<F>(lookup: F) -> KmsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let provider: KmsProvider = get("KMS_PROVIDER")
            .ok_or_else(|| KmsError::Config("KMS_PROVIDER is not set".into()))?
            .parse()?;

        let key_id = match get("KMS_KEY_ID") {
            Some(id) => id,
            None if provider == KmsProvider::Local => defaults.key_id,
            None => {
                return Err(KmsError::Config(format!(
                    "KMS_KEY_ID is required for the {provider} provider"
                )));
            }
        };

        let request_timeout_secs = match get("KMS_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                KmsError::Config(format!("KMS_REQUEST_TIMEOUT_SECS is not a number: {raw:?}"))
            })?,
            None => defaults.request_timeout_secs,
        };

        let config = Self {
            provider,
            key_id,
            region: get("KMS_REGION"),
            endpoint: get("KMS_ENDPOINT"),
            access_token: get("KMS_ACCESS_TOKEN"),
            local_master_key: get("KMS_LOCAL_MASTER_KEY"),
            request_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks provider-specific requirements.
    pub fn validate(&self) -> KmsResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(KmsError::Config(
                "request timeout must be at least one second".into(),
            ));
        }
        match self.provider {
            KmsProvider::Aws => Ok(()),
            KmsProvider::Gcp | KmsProvider::Azure if self.access_token.is_none() => Err(
                KmsError::Config(format!("KMS_ACCESS_TOKEN is required for the {} provider", self.provider)),
            ),
            KmsProvider::Gcp => Ok(()),
            KmsProvider::Azure => {
                if self.key_id.starts_with("https://") || self.key_id.starts_with("http://") {
                    Ok(())
                } else {
                    Err(KmsError::Config(format!(
                        "azure key id must be a key URL, got {:?}",
                        self.key_id
                    )))
                }
            }
            KmsProvider::Local if self.local_master_key.is_none() => Err(KmsError::Config(
                "KMS_LOCAL_MASTER_KEY is required for the local provider".into(),
            )),
            KmsProvider::Local => Ok(()),
        }
    }

    /// Base URL for Cloud KMS calls.
    pub fn gcp_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(GCP_DEFAULT_ENDPOINT)
            .trim_end_matches('/')
    }
}
