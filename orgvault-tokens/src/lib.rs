//! Encrypted OAuth token vault.
//!
//! Access and refresh tokens for connected mail/calendar accounts are sealed
//! with the organization's DEK through [`orgvault_keys::OrgCrypto`]. Each
//! token type has exactly one context (`oauth:access` or `oauth:refresh`),
//! so a token written by any code path reads back on every other.
//!
//! Records move `pending` → `ok` or `failed`. Failed tokens are surfaced as
//! "reconnect your account" through [`health::check_account`].

pub mod error;
pub mod health;
pub mod store;
pub mod types;
pub mod vault;

pub use error::{TokenError, TokenResult};
pub use health::{IntegrationHealth, check_account};
pub use store::{MemoryTokenStore, TokenStore};
pub use types::{EncryptionStatus, OAuthProvider, SecureToken, TokenPresence, TokenType};
pub use vault::TokenVault;
