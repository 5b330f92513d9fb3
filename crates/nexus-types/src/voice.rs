//! Voice profile definitions.
//!
//! A `VoiceProfile` describes one selectable voice: either a standard
//! catalog voice or a cloned voice created from an uploaded sample via the
//! premium synthesis provider.

use serde::{Deserialize, Serialize};

/// Where a voice comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceCategory {
    /// Provider catalog voice.
    #[default]
    Standard,
    /// Instant-cloned voice created from an uploaded sample.
    Cloned,
}

/// Perceived gender of a voice, as labeled by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
    #[default]
    Unknown,
}

/// A selectable synthesis voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// Provider voice identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Perceived gender label.
    #[serde(default)]
    pub gender: VoiceGender,
    /// BCP 47 language tag the voice targets.
    pub lang: String,
    /// Standard catalog voice or instant clone.
    #[serde(default)]
    pub category: VoiceCategory,
    /// Preview audio URL, when the provider exposes one.
    pub preview_url: Option<String>,
}

impl VoiceProfile {
    /// Whether this profile is an instant clone.
    pub fn is_cloned(&self) -> bool {
        self.category == VoiceCategory::Cloned
    }
}
