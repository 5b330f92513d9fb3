//! Speech collaborators for the NexusVoice platform.
//!
//! Provides the capabilities a call session orchestrates but does not
//! implement itself: speech recognition ([`SpeechRecognizer`] and the
//! microphone implementation [`MicRecognizer`]), premium voice-cloning
//! synthesis over HTTP ([`PremiumTtsClient`]), the local system fallback
//! synthesizer ([`SystemSynthesizer`]), and raw audio playback
//! ([`PaplayPlayer`]).
//!
//! Everything is exposed behind traits so sessions and tests can swap in
//! scripted doubles; the concrete implementations shell out to standard
//! audio tooling (`parec`, `espeak-ng`, `paplay`) and to the synthesis
//! provider's REST API.

pub mod playback;
pub mod premium;
pub mod recognizer;
pub mod system;

mod error;

pub use error::VoiceError;
pub use playback::{AudioClip, AudioPlayer, PaplayPlayer};
pub use premium::{PremiumSynthesizer, PremiumTtsClient};
pub use recognizer::{
    MicRecognizer, MicRecognizerConfig, RecognizerErrorKind, RecognizerEvent, SpeechRecognizer,
};
pub use system::{FallbackSynthesizer, SystemSynthesizer};
