//! Shared types and constants for the NexusVoice platform.
//!
//! This crate provides the foundational types used across all NexusVoice
//! crates: agent configuration records, transcript entries, voice profiles,
//! phone number records, and telephony credentials. No crate in the
//! workspace depends on anything *except* `nexus-types` for cross-cutting
//! type definitions, which keeps the dependency graph clean and prevents
//! circular dependencies.

use serde::{Deserialize, Serialize};

mod agent;
mod telephony;
mod transcript;
pub mod voice;

pub use agent::{Agent, AgentFolder, AgentStatus, CrmDataMapping, CrmFieldMapping, CrmTagMapping};
pub use telephony::{
    NumberCapabilities, NumberStatus, PhoneNumber, ProviderNumber, TelephonyCredentials,
};
pub use transcript::{SpeakerRole, Transcript, Utterance};

/// A CRM sub-account connected to the dashboard.
///
/// The platform never talks to the CRM itself; it stores the connection so
/// the automation layer (external) can pick it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    /// Internal unique ID for the record.
    pub id: String,
    /// CRM location (sub-account) identifier.
    pub location_id: String,
    /// Display name of the location.
    pub location_name: String,
    /// Access token for the location.
    pub api_key: String,
    /// Connection timestamp (ISO 8601).
    pub connected_at: String,
    /// Outcome of the most recent connectivity test, if one was run.
    pub last_test_status: Option<TestStatus>,
    /// Human-readable detail accompanying the last test.
    pub last_test_message: Option<String>,
}

/// Result of a connectivity test against an external account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Error,
}

impl TestStatus {
    /// Returns the string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Attempts to parse a stored label back into a `TestStatus`.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}
