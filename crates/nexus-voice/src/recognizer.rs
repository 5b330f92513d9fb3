//! Speech recognition.
//!
//! [`SpeechRecognizer`] is the contract a call session drives: arm the
//! microphone, receive interim and final results, and get told when the
//! recognizer winds down on its own. All control methods are idempotent —
//! calling `start` while running, or `stop`/`abort` while idle, is a
//! no-op, never a panic.
//!
//! [`MicRecognizer`] is the production implementation: a `parec` capture
//! subprocess (float32 mono, 16 kHz) segmented on silence, with each
//! finished utterance piped through a local transcriber binary
//! (whisper.cpp-style: model via `-m`, audio on stdin, text on stdout).
//! After one finalized utterance it emits `Ended` and disarms, mirroring a
//! single-utterance platform recognizer; the session re-arms it between
//! turns.

use crate::error::VoiceError;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;

/// Maximum buffered audio per utterance (10 MiB of f32 samples).
const MAX_UTTERANCE_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for one transcriber invocation.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Capture frame: 800 f32 samples = 50 ms at 16 kHz.
const FRAME_SAMPLES: usize = 800;

/// RMS level above which a frame counts as speech.
const SPEECH_RMS_THRESHOLD: f32 = 0.015;

/// What kind of recognizer failure occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    /// Microphone access was denied by the platform or user.
    PermissionDenied,
    /// Any other failure (device gone, subprocess died, ...).
    Other(String),
}

/// Events emitted by a recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// A partial, still-changing hypothesis for the current utterance.
    Interim(String),
    /// A finalized utterance, no longer subject to revision.
    Final(String),
    /// The recognizer wound down on its own and needs re-arming.
    Ended,
    /// The recognizer failed.
    Error(RecognizerErrorKind),
}

/// Contract between a call session and its speech recognizer.
///
/// Events are delivered through the channel supplied at construction;
/// control is synchronous and idempotent.
pub trait SpeechRecognizer: Send + Sync {
    /// Arms the recognizer. No-op if already armed.
    fn start(&self);
    /// Winds the recognizer down; an `Ended` event follows if it was
    /// armed. No-op if idle.
    fn stop(&self);
    /// Tears capture down immediately with no further events. No-op if
    /// idle.
    fn abort(&self);
}

/// Configuration for [`MicRecognizer`].
#[derive(Debug, Clone)]
pub struct MicRecognizerConfig {
    /// Capture binary (`parec` or compatible: raw float32le to stdout).
    pub capture_binary: PathBuf,
    /// Transcriber binary (whisper.cpp-style CLI).
    pub transcriber_binary: PathBuf,
    /// Transcription model path passed to the transcriber.
    pub model_path: PathBuf,
    /// BCP 47 language tag for transcription.
    pub language: String,
    /// Silence run that finalizes an utterance.
    pub silence_timeout: Duration,
    /// Capture sample rate.
    pub sample_rate: u32,
}

impl Default for MicRecognizerConfig {
    fn default() -> Self {
        Self {
            capture_binary: PathBuf::from("parec"),
            transcriber_binary: PathBuf::from("whisper-cli"),
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            language: "en-US".to_string(),
            silence_timeout: Duration::from_secs(2),
            sample_rate: 16_000,
        }
    }
}

struct CaptureHandle {
    cancelled: Arc<AtomicBool>,
    child: Child,
}

/// Microphone recognizer over subprocess capture.
pub struct MicRecognizer {
    config: MicRecognizerConfig,
    events: mpsc::UnboundedSender<RecognizerEvent>,
    capture: Mutex<Option<CaptureHandle>>,
}

impl MicRecognizer {
    /// Creates a recognizer, verifying the required binaries respond.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Recognizer`] when the capture or transcriber
    /// binary cannot be invoked — the capability-unavailable condition the
    /// session degrades on.
    pub fn new(
        config: MicRecognizerConfig,
        events: mpsc::UnboundedSender<RecognizerEvent>,
    ) -> Result<Self, VoiceError> {
        for (label, binary) in [
            ("capture", &config.capture_binary),
            ("transcriber", &config.transcriber_binary),
        ] {
            std::process::Command::new(binary)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|e| {
                    VoiceError::Recognizer(format!(
                        "{label} binary {:?} is not available: {e}",
                        binary
                    ))
                })?;
        }

        Ok(Self {
            config,
            events,
            capture: Mutex::new(None),
        })
    }

    fn spawn_capture(&self) -> Result<CaptureHandle, VoiceError> {
        let mut child = Command::new(&self.config.capture_binary)
            .args([
                "--format=float32le",
                &format!("--rate={}", self.config.sample_rate),
                "--channels=1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceError::Recognizer(format!("failed to spawn capture: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VoiceError::Recognizer("capture stdout unavailable".to_string()))?;
        let stderr = child.stderr.take();

        let cancelled = Arc::new(AtomicBool::new(false));
        let task_cancelled = cancelled.clone();
        let events = self.events.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let outcome = run_capture(stdout, stderr, &config, &events, &task_cancelled).await;
            // A cancelled capture (stop/abort) reports nothing here; the
            // control side already emitted whatever was due.
            if task_cancelled.load(Ordering::SeqCst) {
                return;
            }
            match outcome {
                Ok(()) => {
                    let _ = events.send(RecognizerEvent::Ended);
                }
                Err(kind) => {
                    let _ = events.send(RecognizerEvent::Error(kind));
                    let _ = events.send(RecognizerEvent::Ended);
                }
            }
        });

        Ok(CaptureHandle { cancelled, child })
    }

    fn tear_down(&self, emit_ended: bool) {
        let mut guard = match self.capture.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut handle) = guard.take() {
            handle.cancelled.store(true, Ordering::SeqCst);
            let _ = handle.child.start_kill();
            if emit_ended {
                let _ = self.events.send(RecognizerEvent::Ended);
            }
        }
    }
}

impl SpeechRecognizer for MicRecognizer {
    fn start(&self) {
        let mut guard = match self.capture.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.is_some() {
            return;
        }
        match self.spawn_capture() {
            Ok(handle) => *guard = Some(handle),
            Err(e) => {
                tracing::warn!("recognizer start failed: {e}");
                let _ = self
                    .events
                    .send(RecognizerEvent::Error(RecognizerErrorKind::Other(
                        e.to_string(),
                    )));
            }
        }
    }

    fn stop(&self) {
        self.tear_down(true);
    }

    fn abort(&self) {
        self.tear_down(false);
    }
}

/// Reads capture frames, segments on silence, and transcribes the
/// finished utterance.
async fn run_capture(
    mut stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    config: &MicRecognizerConfig,
    events: &mpsc::UnboundedSender<RecognizerEvent>,
    cancelled: &AtomicBool,
) -> Result<(), RecognizerErrorKind> {
    let frame_bytes = FRAME_SAMPLES * 4;
    let silence_frames_limit = (config.silence_timeout.as_millis() as usize / 50).max(1);

    let mut buf = vec![0u8; frame_bytes];
    let mut utterance: Vec<f32> = Vec::new();
    let mut heard_speech = false;
    let mut silence_run = 0usize;

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Ok(());
        }

        if stdout.read_exact(&mut buf).await.is_err() {
            // Capture stream closed underneath us. Classify a permission
            // failure from stderr; anything else is a plain wind-down.
            if cancelled.load(Ordering::SeqCst) {
                return Ok(());
            }
            let mut stderr_text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut stderr_text).await;
            }
            let lowered = stderr_text.to_lowercase();
            if lowered.contains("access denied") || lowered.contains("permission denied") {
                return Err(RecognizerErrorKind::PermissionDenied);
            }
            if heard_speech {
                // Stream died mid-utterance; salvage what we have.
                transcribe_and_emit(&utterance, config, events, cancelled).await;
            }
            return Ok(());
        }

        let samples: Vec<f32> = buf
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();

        if rms >= SPEECH_RMS_THRESHOLD {
            heard_speech = true;
            silence_run = 0;
        } else if heard_speech {
            silence_run += 1;
        }

        if heard_speech {
            if (utterance.len() + samples.len()) * 4 > MAX_UTTERANCE_BYTES {
                return Err(RecognizerErrorKind::Other(
                    "utterance exceeded maximum buffered size".to_string(),
                ));
            }
            utterance.extend_from_slice(&samples);
        }

        if heard_speech && silence_run >= silence_frames_limit {
            // Utterance finished: one final result, then wind down like a
            // single-utterance platform recognizer.
            transcribe_and_emit(&utterance, config, events, cancelled).await;
            return Ok(());
        }
    }
}

async fn transcribe_and_emit(
    samples: &[f32],
    config: &MicRecognizerConfig,
    events: &mpsc::UnboundedSender<RecognizerEvent>,
    cancelled: &AtomicBool,
) {
    match transcribe(samples, config).await {
        Ok(text) if !text.is_empty() => {
            if !cancelled.load(Ordering::SeqCst) {
                let _ = events.send(RecognizerEvent::Final(text));
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("transcription failed: {e}");
        }
    }
}

/// Runs the transcriber binary over one utterance's samples.
async fn transcribe(samples: &[f32], config: &MicRecognizerConfig) -> Result<String, VoiceError> {
    let mut command = Command::new(&config.transcriber_binary);
    command
        .arg("-m")
        .arg(&config.model_path)
        .arg("-l")
        .arg(language_code(&config.language))
        .arg("-f")
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| VoiceError::Recognizer(format!("failed to spawn transcriber: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| VoiceError::Recognizer("failed to open transcriber stdin".to_string()))?;

    let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    stdin
        .write_all(&pcm)
        .await
        .map_err(|e| VoiceError::Recognizer(format!("failed to write transcriber stdin: {e}")))?;
    drop(stdin);

    let output = tokio::time::timeout(TRANSCRIBE_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            VoiceError::Recognizer(format!(
                "transcriber timed out after {} seconds",
                TRANSCRIBE_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| VoiceError::Recognizer(format!("failed to read transcriber output: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoiceError::Recognizer(format!(
            "transcriber failed: {stderr}"
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// `en-US` → `en`: the transcriber takes bare ISO 639-1 codes.
fn language_code(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}
