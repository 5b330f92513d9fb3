//! Call transcript types.
//!
//! A [`Transcript`] is an ordered, append-only sequence of utterances.
//! Entries are appended in the order events are finalized and are never
//! mutated afterwards; the wrapper type exposes no way to reorder or edit
//! entries, so the invariant holds by construction.

use serde::{Deserialize, Serialize};

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    /// The human participant.
    User,
    /// The configured voice agent.
    Agent,
}

/// One finalized utterance in a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who spoke.
    pub role: SpeakerRole,
    /// What was said.
    pub text: String,
}

impl Utterance {
    /// Builds a user utterance.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: SpeakerRole::User,
            text: text.into(),
        }
    }

    /// Builds an agent utterance.
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: SpeakerRole::Agent,
            text: text.into(),
        }
    }
}

/// An ordered, append-only record of a call's finalized utterances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<Utterance>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finalized utterance.
    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push(utterance);
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries except the most recent one.
    ///
    /// Used when building model history: the just-appended user utterance
    /// is sent as the new message, not as part of the history.
    pub fn all_but_last(&self) -> &[Utterance] {
        match self.entries.len() {
            0 => &[],
            n => &self.entries[..n - 1],
        }
    }
}
