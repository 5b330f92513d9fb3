//! System fallback synthesizer.
//!
//! When the premium provider is unavailable or fails, the session falls
//! back to the OS speech engine. `espeak-ng` is the cross-platform choice:
//! it plays directly to the default audio device, takes a voice/locale
//! hint, and needs no network.

use crate::error::VoiceError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Maximum text length per synthesis request.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for one synthesis-and-playback run.
const SPEAK_TIMEOUT: Duration = Duration::from_secs(60);

/// A local synthesizer that plays audio itself and reports completion.
#[async_trait]
pub trait FallbackSynthesizer: Send + Sync {
    /// Speaks the text, returning once playback completes.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Tts`] when the engine cannot be started or
    /// exits abnormally. A cancelled run also reports an error; callers
    /// treat any completion — success or failure — identically.
    async fn speak(&self, text: &str, voice_hint: &str) -> Result<(), VoiceError>;

    /// Cancels any in-progress speech. No-op when idle.
    fn cancel(&self);
}

/// espeak-ng backed fallback synthesizer.
pub struct SystemSynthesizer {
    binary: PathBuf,
    current: Mutex<Option<Child>>,
}

impl Default for SystemSynthesizer {
    fn default() -> Self {
        Self::new("espeak-ng")
    }
}

impl SystemSynthesizer {
    /// Creates a synthesizer using the given engine binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
        }
    }
}

/// `en-US` → `en-us`: espeak-ng voice names are lowercase.
fn espeak_voice(hint: &str) -> String {
    let hint = hint.trim();
    if hint.is_empty() {
        "en-us".to_string()
    } else {
        hint.to_lowercase()
    }
}

#[async_trait]
impl FallbackSynthesizer for SystemSynthesizer {
    async fn speak(&self, text: &str, voice_hint: &str) -> Result<(), VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let mut child = Command::new(&self.binary)
            .arg("-v")
            .arg(espeak_voice(voice_hint))
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("failed to spawn {:?}: {e}", self.binary)))?;

        let stderr = child.stderr.take();
        {
            let mut guard = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // A previous run that was never awaited to completion is
            // replaced; kill_on_drop reaps it.
            *guard = Some(child);
        }

        let started = std::time::Instant::now();
        let status = loop {
            if started.elapsed() > SPEAK_TIMEOUT {
                self.cancel();
                return Err(VoiceError::Tts(format!(
                    "speech engine timed out after {} seconds",
                    SPEAK_TIMEOUT.as_secs()
                )));
            }
            // Poll rather than hold the child across the await, so cancel()
            // can take the handle at any time.
            {
                let mut guard = match self.current.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match guard.as_mut() {
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            *guard = None;
                            break Ok(status);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            *guard = None;
                            break Err(VoiceError::Tts(format!(
                                "failed to wait for speech engine: {e}"
                            )));
                        }
                    },
                    // cancel() took the child.
                    None => {
                        return Err(VoiceError::Tts("speech cancelled".to_string()));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }?;

        if !status.success() {
            let mut detail = String::new();
            if let Some(mut stderr) = stderr {
                use tokio::io::AsyncReadExt;
                let _ = stderr.read_to_string(&mut detail).await;
            }
            return Err(VoiceError::Tts(format!(
                "speech engine exited with {status}: {}",
                detail.trim()
            )));
        }
        Ok(())
    }

    fn cancel(&self) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_hint_normalization() {
        assert_eq!(espeak_voice("en-US"), "en-us");
        assert_eq!(espeak_voice(""), "en-us");
        assert_eq!(espeak_voice("  "), "en-us");
        assert_eq!(espeak_voice("de-DE"), "de-de");
    }

    #[tokio::test]
    async fn oversized_text_is_rejected() {
        let synth = SystemSynthesizer::default();
        let text = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        let result = synth.speak(&text, "en-US").await;
        assert!(matches!(result, Err(VoiceError::Tts(_))));
    }

    #[test]
    fn cancel_when_idle_is_a_no_op() {
        let synth = SystemSynthesizer::default();
        synth.cancel();
        synth.cancel();
    }
}
