//! Phone number records and telephony provider credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel capabilities of a phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NumberCapabilities {
    #[serde(default)]
    pub voice: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default)]
    pub mms: bool,
}

/// Lifecycle status of an owned phone number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStatus {
    /// Provisioned and routable.
    #[default]
    Active,
    /// Returned to the provider.
    Released,
}

impl NumberStatus {
    /// Returns the string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
        }
    }

    /// Attempts to parse a stored label back into a `NumberStatus`.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

/// A phone number owned by this account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Provider SID or internal unique ID.
    pub id: String,
    /// E.164 number.
    pub number: String,
    /// ISO country code.
    pub country: String,
    /// Channel capabilities.
    #[serde(default)]
    pub capabilities: NumberCapabilities,
    /// Agent currently answering this number, if any.
    pub assigned_agent_id: Option<String>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: NumberStatus,
    /// Provider-side display name.
    pub friendly_name: Option<String>,
}

/// A number offered by the telephony provider's marketplace search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderNumber {
    /// E.164 number.
    pub phone_number: String,
    /// Provider-side display name.
    pub friendly_name: String,
    /// City, when the provider reports one.
    pub locality: Option<String>,
    /// State or region.
    pub region: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// ISO country code.
    pub iso_country: String,
    /// Channel capabilities.
    #[serde(default)]
    pub capabilities: NumberCapabilities,
}

/// Credentials for the telephony provider account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephonyCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl fmt::Debug for TelephonyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelephonyCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_status_round_trip() {
        for status in [NumberStatus::Active, NumberStatus::Released] {
            assert_eq!(NumberStatus::from_str_opt(status.as_str()), Some(status));
        }
        assert_eq!(NumberStatus::from_str_opt("gone"), None);
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = TelephonyCredentials {
            account_sid: "AC123".to_string(),
            auth_token: "supersecret".to_string(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("AC123"));
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    fn capabilities_default_to_false() {
        let number: PhoneNumber = serde_json::from_str(
            r#"{"id":"PN1","number":"+14155550101","country":"US",
                "assigned_agent_id":null,"friendly_name":null}"#,
        )
        .expect("should deserialize");
        assert!(!number.capabilities.voice);
        assert_eq!(number.status, NumberStatus::Active);
    }
}
