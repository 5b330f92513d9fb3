//! Raw audio playback.
//!
//! Plays the PCM returned by the premium synthesizer. The production
//! implementation pipes s16le frames to `paplay`; the trait exists so
//! sessions and tests can substitute an instant-completion player.

use crate::error::VoiceError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// A clip of playable audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Raw s16le mono samples.
    pub pcm: Vec<u8>,
    /// Sample rate of the clip.
    pub sample_rate: u32,
}

/// Plays audio clips to the local output device.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Plays a clip, returning once playback finishes.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Playback`] on device or subprocess failure.
    /// Callers treat playback errors as normal completion for
    /// flow-control purposes.
    async fn play(&self, clip: AudioClip) -> Result<(), VoiceError>;

    /// Stops any in-progress playback. No-op when idle.
    fn stop(&self);
}

/// PulseAudio playback via `paplay`.
pub struct PaplayPlayer {
    binary: PathBuf,
    current: Mutex<Option<Child>>,
}

impl Default for PaplayPlayer {
    fn default() -> Self {
        Self::new("paplay")
    }
}

impl PaplayPlayer {
    /// Creates a player using the given playback binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AudioPlayer for PaplayPlayer {
    async fn play(&self, clip: AudioClip) -> Result<(), VoiceError> {
        let mut child = Command::new(&self.binary)
            .args([
                "--raw",
                "--format=s16le",
                "--channels=1",
                &format!("--rate={}", clip.sample_rate),
            ])
            .stdin(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Playback(format!("failed to spawn {:?}: {e}", self.binary)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Playback("failed to open playback stdin".to_string()))?;

        {
            let mut guard = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = Some(child);
        }

        // Feed the clip; a broken pipe just means playback was stopped.
        let write_result = stdin.write_all(&clip.pcm).await;
        drop(stdin);
        if let Err(e) = write_result {
            tracing::debug!("playback write interrupted: {e}");
        }

        loop {
            {
                let mut guard = match self.current.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match guard.as_mut() {
                    Some(child) => match child.try_wait() {
                        Ok(Some(status)) => {
                            *guard = None;
                            if !status.success() {
                                return Err(VoiceError::Playback(format!(
                                    "playback exited with {status}"
                                )));
                            }
                            return Ok(());
                        }
                        Ok(None) => {}
                        Err(e) => {
                            *guard = None;
                            return Err(VoiceError::Playback(format!(
                                "failed to wait for playback: {e}"
                            )));
                        }
                    },
                    // stop() took the child.
                    None => return Err(VoiceError::Playback("playback stopped".to_string())),
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn stop(&self) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
        }
    }
}
