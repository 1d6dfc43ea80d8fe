//! The closed set of semantic fields a blob can be bound to.
//!
//! Both the string form and the numeric code are persisted (the string in the
//! associated data, the code in the blob header). Neither may change for an
//! existing variant; new fields get new codes.

use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic field a ciphertext belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldContext {
    #[serde(rename = "email:subject")]
    EmailSubject,
    #[serde(rename = "email:body")]
    EmailBody,
    #[serde(rename = "email:snippet")]
    EmailSnippet,
    #[serde(rename = "email:participants")]
    EmailParticipants,
    #[serde(rename = "calendar:title")]
    CalendarTitle,
    #[serde(rename = "calendar:description")]
    CalendarDescription,
    #[serde(rename = "calendar:location")]
    CalendarLocation,
    #[serde(rename = "lead:notes")]
    LeadNotes,
    #[serde(rename = "lead:contact")]
    LeadContact,
    #[serde(rename = "document:content")]
    DocumentContent,
    #[serde(rename = "document:title")]
    DocumentTitle,
    #[serde(rename = "oauth:access")]
    OAuthAccess,
    #[serde(rename = "oauth:refresh")]
    OAuthRefresh,
}

impl FieldContext {
    pub const ALL: [FieldContext; 13] = [
        FieldContext::EmailSubject,
        FieldContext::EmailBody,
        FieldContext::EmailSnippet,
        FieldContext::EmailParticipants,
        FieldContext::CalendarTitle,
        FieldContext::CalendarDescription,
        FieldContext::CalendarLocation,
        FieldContext::LeadNotes,
        FieldContext::LeadContact,
        FieldContext::DocumentContent,
        FieldContext::DocumentTitle,
        FieldContext::OAuthAccess,
        FieldContext::OAuthRefresh,
    ];

    /// The string bound into the AEAD associated data.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldContext::EmailSubject => "email:subject",
            FieldContext::EmailBody => "email:body",
            FieldContext::EmailSnippet => "email:snippet",
            FieldContext::EmailParticipants => "email:participants",
            FieldContext::CalendarTitle => "calendar:title",
            FieldContext::CalendarDescription => "calendar:description",
            FieldContext::CalendarLocation => "calendar:location",
            FieldContext::LeadNotes => "lead:notes",
            FieldContext::LeadContact => "lead:contact",
            FieldContext::DocumentContent => "document:content",
            FieldContext::DocumentTitle => "document:title",
            FieldContext::OAuthAccess => "oauth:access",
            FieldContext::OAuthRefresh => "oauth:refresh",
        }
    }

    /// Stable code written into the blob header.
    pub fn code(self) -> u16 {
        match self {
            FieldContext::EmailSubject => 1,
            FieldContext::EmailBody => 2,
            FieldContext::EmailSnippet => 3,
            FieldContext::EmailParticipants => 4,
            FieldContext::CalendarTitle => 5,
            FieldContext::CalendarDescription => 6,
            FieldContext::CalendarLocation => 7,
            FieldContext::LeadNotes => 8,
            FieldContext::LeadContact => 9,
            FieldContext::DocumentContent => 10,
            FieldContext::DocumentTitle => 11,
            FieldContext::OAuthAccess => 12,
            FieldContext::OAuthRefresh => 13,
        }
    }

    pub fn from_code(code: u16) -> CryptoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.code() == code)
            .ok_or_else(|| CryptoError::MalformedBlob(format!("unknown context code {code}")))
    }
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldContext {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ctx| ctx.as_str() == s)
            .ok_or_else(|| CryptoError::MalformedBlob(format!("unknown field context {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_and_strings_are_unique() {
        let codes: HashSet<u16> = FieldContext::ALL.iter().map(|c| c.code()).collect();
        let names: HashSet<&str> = FieldContext::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(codes.len(), FieldContext::ALL.len());
        assert_eq!(names.len(), FieldContext::ALL.len());
    }

    #[test]
    fn parse_matches_display() {
        for ctx in FieldContext::ALL {
            assert_eq!(ctx.to_string().parse::<FieldContext>().unwrap(), ctx);
            assert_eq!(FieldContext::from_code(ctx.code()).unwrap(), ctx);
        }
    }

    #[test]
    fn oauth_strings_are_fixed() {
        assert_eq!(FieldContext::OAuthAccess.as_str(), "oauth:access");
        assert_eq!(FieldContext::OAuthRefresh.as_str(), "oauth:refresh");
    }

    #[test]
    fn unknown_inputs_are_malformed() {
        assert!(matches!(
            "oauth:access:acct-42".parse::<FieldContext>(),
            Err(CryptoError::MalformedBlob(_))
        ));
        assert!(matches!(
            FieldContext::from_code(0),
            Err(CryptoError::MalformedBlob(_))
        ));
    }
}
