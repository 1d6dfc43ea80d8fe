//! Integration health derived from the state of an account's tokens.

use crate::error::TokenError;
use crate::types::{OAuthProvider, TokenType};
use crate::vault::TokenVault;
use chrono::Utc;
use orgvault_keys::OrgCryptoError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the UI should show for a connected account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrationHealth {
    Healthy,
    /// The user must reconnect the account.
    ActionNeeded { reason: String },
    /// Infrastructure trouble; check again later.
    TemporarilyUnavailable { reason: String },
}

impl IntegrationHealth {
    pub fn is_action_needed(&self) -> bool {
        matches!(self, IntegrationHealth::ActionNeeded { .. })
    }

    /// Classifies a retrieval failure.
    pub fn from_error(err: &TokenError) -> Self {
        let reason = err.to_string();
        match err {
            TokenError::Crypto(OrgCryptoError::KmsUnavailable(_)) => {
                IntegrationHealth::TemporarilyUnavailable { reason }
            }
            e if e.requires_reconnect() => IntegrationHealth::ActionNeeded { reason },
            _ => IntegrationHealth::TemporarilyUnavailable { reason },
        }
    }
}

/// Checks that the account's tokens are still usable.
///
/// Uses the refresh token, or the access token when the provider issued no
/// refresh token. Never fails: every error is folded into the result.
pub async fn check_account(
    vault: &TokenVault,
    org_id: &str,
    provider: OAuthProvider,
) -> IntegrationHealth {
    let health = match vault
        .retrieve_token(org_id, provider, TokenType::OAuthRefresh)
        .await
    {
        Ok(_) => IntegrationHealth::Healthy,
        Err(TokenError::Missing { .. }) => check_access_only(vault, org_id, provider).await,
        Err(e) => IntegrationHealth::from_error(&e),
    };

    if health.is_action_needed() {
        warn!(org_id, %provider, "integration needs reconnect: {health:?}");
    }
    health
}

async fn check_access_only(
    vault: &TokenVault,
    org_id: &str,
    provider: OAuthProvider,
) -> IntegrationHealth {
    if let Err(e) = vault
        .retrieve_token(org_id, provider, TokenType::OAuthAccess)
        .await
    {
        return match e {
            TokenError::Missing { .. } => IntegrationHealth::ActionNeeded {
                reason: format!("no {provider} tokens stored"),
            },
            other => IntegrationHealth::from_error(&other),
        };
    }

    match vault
        .token_record(org_id, provider, TokenType::OAuthAccess)
        .await
    {
        Ok(Some(record)) if record.is_expired_at(Utc::now()) => IntegrationHealth::ActionNeeded {
            reason: "access token expired and no refresh token is stored".into(),
        },
        Ok(_) => IntegrationHealth::Healthy,
        Err(e) => IntegrationHealth::from_error(&e),
    }
}
