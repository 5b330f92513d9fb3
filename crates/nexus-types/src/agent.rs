//! Agent configuration records.
//!
//! An [`Agent`] is the full configuration for one conversational voice
//! agent: which model drives it, which voice it speaks with, its prompt,
//! and the tuning parameters the call pipeline consults. The record is
//! supplied whole to a call session at start and is immutable for the
//! session's duration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Live and eligible to take calls.
    Active,
    /// Configured but not taking calls.
    Paused,
    /// Still being edited.
    #[default]
    Draft,
}

impl AgentStatus {
    /// Returns the string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Draft => "draft",
        }
    }

    /// Attempts to parse a stored label back into an `AgentStatus`.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

/// Mapping from call artifacts to CRM custom-field identifiers.
///
/// Keys are the artifact names the automation layer produces (`recording`,
/// `transcription`, `summary`, `duration`, `sentiment`, `outcome`); values
/// are CRM field IDs. Stored as an open map so new artifacts do not require
/// a schema change.
pub type CrmDataMapping = BTreeMap<String, String>;

/// Mapping from call outcomes to CRM tag identifiers.
///
/// Keys are outcome names (`answered`, `voicemail`, `no_answer`, ...);
/// values are CRM tag IDs.
pub type CrmTagMapping = BTreeMap<String, String>;

/// CRM field-mapping configuration attached to an agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CrmFieldMapping {
    /// Call artifact → custom field ID.
    #[serde(default)]
    pub data: CrmDataMapping,
    /// Call outcome → tag ID.
    #[serde(default)]
    pub tags: CrmTagMapping,
}

/// Full configuration for one conversational voice agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form role description ("Scheduler", "Sales", ...).
    pub role: String,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Language model identifier driving the conversation.
    pub model: String,
    /// Voice profile ID used for speech synthesis.
    pub voice_id: String,
    /// IDs of phone numbers assigned to this agent.
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    /// System prompt template sent with every model request.
    pub prompt_template: String,
    /// Sampling temperature for the model.
    pub temperature: f64,
    /// CRM location this agent reports into, if any.
    pub crm_location_id: Option<String>,
    /// Organization folder, if any.
    pub folder_id: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Opening line spoken when a call connects. Empty means the agent
    /// waits for the caller to speak first.
    #[serde(default)]
    pub greeting: String,
    /// BCP 47 language tag for speech recognition (e.g. `en-US`).
    pub transcription_language: String,
    /// Hard cap on call duration.
    pub max_duration_seconds: u32,
    /// Seconds of silence before the recognizer finalizes an utterance.
    pub silence_timeout_seconds: f64,
    /// How eagerly the agent yields when the caller talks over it
    /// (0.0 = never, 1.0 = immediately).
    pub interruption_sensitivity: f64,
    /// Whether the agent waits for the callee to greet before speaking.
    pub wait_for_greeting: bool,

    /// CRM field mapping, if configured.
    pub crm_field_mapping: Option<CrmFieldMapping>,
}

impl Agent {
    /// Whether this agent opens the call with a spoken greeting.
    pub fn has_greeting(&self) -> bool {
        !self.greeting.trim().is_empty()
    }
}

/// An organization folder grouping agents in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFolder {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional icon hint for the UI.
    pub icon: Option<String>,
}
