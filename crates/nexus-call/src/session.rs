//! The turn-taking call session.
//!
//! One [`CallSession`] drives one simulated call end-to-end: it owns the
//! recognizer, the model client, the synthesizer chain, and the audio
//! player for the session's lifetime (no process-wide singletons — tests
//! run many sessions side by side), and it is the only mutator of the
//! transcript.
//!
//! The session runs as a single spawned task draining its command queue,
//! its recognizer event stream, and its completion queue. That one task is
//! the call's logical thread: every state change happens inside it, so the
//! mutual-exclusion property — at most one of listening / processing /
//! speaking at any instant — follows from the single [`CallState`] value.
//! Capability work that must not block the loop (the model request,
//! synthesis plus playback) runs in helper tasks that post epoch-tagged
//! completions back into the queue; a completion whose epoch no longer
//! matches, or that arrives after the session deactivated, is dropped.
//! That is the entire late-reply-discard mechanism: end-call bumps the
//! epoch, so an in-flight model reply can never be spoken into a dead
//! call.
//!
//! Known quirk, kept on purpose: the recognizer is re-armed whenever it
//! ends on its own while the session is listening. A mute issued through
//! [`CallHandle::toggle_mute`] stops the recognizer directly, which emits
//! the same ended event — so a mute can be undone by the auto-restart a
//! moment later. This mirrors the dashboard's observed behavior; the mute
//! control is an escape hatch, not a state-machine input.

use crate::state::{transition, Activity, CallPhase, CallState};
use nexus_model::{ChatRole, ChatTurn, ConversationModel, ModelError};
use nexus_types::{Agent, SpeakerRole, Transcript, Utterance};
use nexus_voice::{
    AudioPlayer, FallbackSynthesizer, PremiumSynthesizer, RecognizerErrorKind, RecognizerEvent,
    SpeechRecognizer,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, OnceCell};

/// Spoken when the model request fails; the call must keep moving.
pub const FALLBACK_REPLY: &str = "I am having trouble processing that request.";

/// Capacity of the session event broadcast channel.
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// Timing knobs for a session. Tests shrink these to near zero.
#[derive(Debug, Clone)]
pub struct CallTuning {
    /// Simulated ringing period before the call connects.
    pub connect_delay: Duration,
}

impl Default for CallTuning {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(1000),
        }
    }
}

/// Premium synthesis configuration: the client plus the API key to use.
#[derive(Clone)]
pub struct PremiumVoice {
    pub client: Arc<dyn PremiumSynthesizer>,
    pub api_key: String,
}

/// Everything a session orchestrates, injected at start.
///
/// `recognizer: None` is the capability-unavailable condition: the session
/// still connects and speaks, but never listens.
pub struct CallCollaborators {
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub recognizer_events: mpsc::UnboundedReceiver<RecognizerEvent>,
    pub model: Arc<dyn ConversationModel>,
    pub premium: Option<PremiumVoice>,
    pub fallback: Arc<dyn FallbackSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
}

impl CallCollaborators {
    /// Wires up the production stack for one session: microphone capture
    /// tuned from the agent record, premium synthesis when a key is
    /// configured, and the system synthesizer and PulseAudio player.
    ///
    /// A recognizer that cannot be constructed (missing audio tooling) is
    /// logged and downgraded to `None` — the session connects in
    /// speech-output-only mode rather than failing to start.
    pub fn standard(
        agent: &Agent,
        model: Arc<dyn ConversationModel>,
        premium_tts_key: Option<String>,
    ) -> Self {
        let (events_tx, recognizer_events) = mpsc::unbounded_channel();
        let recognizer = match nexus_voice::MicRecognizer::new(
            nexus_voice::MicRecognizerConfig {
                language: agent.transcription_language.clone(),
                silence_timeout: Duration::from_secs_f64(
                    agent.silence_timeout_seconds.clamp(0.1, 30.0),
                ),
                ..Default::default()
            },
            events_tx,
        ) {
            Ok(recognizer) => Some(Arc::new(recognizer) as Arc<dyn SpeechRecognizer>),
            Err(e) => {
                tracing::warn!("voice input unavailable: {e}");
                None
            }
        };

        let premium = premium_tts_key
            .filter(|key| !key.is_empty())
            .map(|api_key| PremiumVoice {
                client: Arc::new(nexus_voice::PremiumTtsClient::new()),
                api_key,
            });

        Self {
            recognizer,
            recognizer_events,
            model,
            premium,
            fallback: Arc::new(nexus_voice::SystemSynthesizer::default()),
            player: Arc::new(nexus_voice::PaplayPlayer::default()),
        }
    }
}

/// Observable session events, broadcast to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The state value changed.
    StateChanged(CallState),
    /// A finalized utterance was appended to the transcript.
    TranscriptAppended(Utterance),
    /// The interim (not yet finalized) utterance changed.
    InterimUpdated(String),
    /// The interim utterance was cleared by a finalization.
    InterimCleared,
    /// Microphone permission was denied; shown to the user once.
    MicPermissionDenied,
    /// No recognizer is available; the call is speech-output-only.
    VoiceInputUnavailable,
}

enum Command {
    End,
    ToggleMute,
}

enum Completion {
    ModelReply {
        epoch: u64,
        reply: Result<String, ModelError>,
    },
    SpeakFinished {
        epoch: u64,
    },
}

struct Shared {
    state: Mutex<CallState>,
    transcript: Mutex<Transcript>,
    interim: Mutex<String>,
    active: AtomicBool,
    events_tx: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Control handle for a running session.
pub struct CallHandle {
    shared: Arc<Shared>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl CallHandle {
    /// Current state value.
    pub fn state(&self) -> CallState {
        *lock(&self.shared.state)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> CallPhase {
        self.state().phase()
    }

    /// Snapshot of the transcript so far.
    pub fn transcript(&self) -> Transcript {
        lock(&self.shared.transcript).clone()
    }

    /// The current interim utterance (empty when none).
    pub fn interim(&self) -> String {
        lock(&self.shared.interim).clone()
    }

    /// Whether the session has not yet ended.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Subscribes to the session event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Ends the call. Safe to call repeatedly and after the session has
    /// already ended.
    ///
    /// The active flag flips immediately so any completion that races the
    /// shutdown is discarded, then the session task tears capture and
    /// playback down.
    pub fn end(&self) {
        self.shared.active.store(false, Ordering::SeqCst);
        let _ = self.cmd_tx.send(Command::End);
    }

    /// Toggles the microphone directly: stop while listening, start
    /// otherwise. Does not touch the state value.
    pub fn toggle_mute(&self) {
        let _ = self.cmd_tx.send(Command::ToggleMute);
    }
}

/// Factory for call sessions.
pub struct CallSession;

impl CallSession {
    /// Starts a session for the given agent and returns its handle.
    ///
    /// The session task owns its collaborators and runs until the call
    /// ends (or the handle is dropped, which ends it too).
    pub fn spawn(
        agent: Agent,
        collaborators: CallCollaborators,
        tuning: CallTuning,
    ) -> CallHandle {
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        let shared = Arc::new(Shared {
            state: Mutex::new(CallState::Connecting),
            transcript: Mutex::new(Transcript::new()),
            interim: Mutex::new(String::new()),
            active: AtomicBool::new(true),
            events_tx,
        });
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let voice_input = collaborators.recognizer.is_some();
        let task = SessionTask {
            agent,
            tuning,
            shared: shared.clone(),
            recognizer: collaborators.recognizer,
            recognizer_events: collaborators.recognizer_events,
            model: collaborators.model,
            premium: collaborators.premium,
            premium_ready: Arc::new(OnceCell::new()),
            fallback: collaborators.fallback,
            player: collaborators.player,
            cmd_rx,
            completions_tx,
            completions_rx,
            epoch: 0,
            voice_input_enabled: voice_input,
            mic_alerted: false,
        };
        tokio::spawn(task.run());

        CallHandle { shared, cmd_tx }
    }
}

struct SessionTask {
    agent: Agent,
    tuning: CallTuning,
    shared: Arc<Shared>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    recognizer_events: mpsc::UnboundedReceiver<RecognizerEvent>,
    model: Arc<dyn ConversationModel>,
    premium: Option<PremiumVoice>,
    premium_ready: Arc<OnceCell<bool>>,
    fallback: Arc<dyn FallbackSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    epoch: u64,
    voice_input_enabled: bool,
    mic_alerted: bool,
}

impl SessionTask {
    async fn run(mut self) {
        // Ringing. Only end-call can interrupt it.
        let ring = tokio::time::sleep(self.tuning.connect_delay);
        tokio::pin!(ring);
        loop {
            tokio::select! {
                _ = &mut ring => break,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::End) | None => {
                        self.finish();
                        return;
                    }
                    // No microphone to toggle before the call connects.
                    Some(Command::ToggleMute) => {}
                },
            }
        }

        if !self.voice_input_enabled {
            tracing::info!(agent = %self.agent.name, "no recognizer; speech-output-only call");
            self.emit(SessionEvent::VoiceInputUnavailable);
        }

        if self.agent.has_greeting() {
            let greeting = self.agent.greeting.clone();
            self.enter_speaking(greeting);
        } else {
            self.enter_listening();
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::End) | None => break,
                    Some(Command::ToggleMute) => self.toggle_mute(),
                },
                Some(event) = self.recognizer_events.recv() => {
                    self.on_recognizer_event(event);
                }
                Some(completion) = self.completions_rx.recv() => {
                    self.on_completion(completion);
                }
            }
        }

        self.finish();
    }

    fn state(&self) -> CallState {
        *lock(&self.shared.state)
    }

    fn set_state(&self, next: CallState) {
        let mut guard = lock(&self.shared.state);
        match transition(*guard, next) {
            Ok(new) => {
                if *guard == new {
                    return;
                }
                *guard = new;
                drop(guard);
                self.emit(SessionEvent::StateChanged(new));
            }
            Err(e) => {
                // Unreachable by construction; kept as a tripwire.
                tracing::error!("rejected state change: {e}");
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.shared.events_tx.send(event);
    }

    fn append(&self, utterance: Utterance) {
        lock(&self.shared.transcript).push(utterance.clone());
        self.emit(SessionEvent::TranscriptAppended(utterance));
    }

    fn clear_interim(&self) {
        let mut interim = lock(&self.shared.interim);
        if !interim.is_empty() {
            interim.clear();
            drop(interim);
            self.emit(SessionEvent::InterimCleared);
        }
    }

    // ── State entries ────────────────────────────────────────────────

    fn enter_listening(&mut self) {
        if !self.voice_input_enabled {
            self.set_state(CallState::Connected(Activity::Idle));
            return;
        }
        self.set_state(CallState::Connected(Activity::Listening));
        if let Some(recognizer) = &self.recognizer {
            recognizer.start();
        }
    }

    fn start_processing(&mut self, text: String) {
        self.clear_interim();
        self.set_state(CallState::Connected(Activity::Processing));
        // Stop capture before the model request goes out; no audio may be
        // captured while the request is in flight.
        if let Some(recognizer) = &self.recognizer {
            recognizer.stop();
        }
        self.append(Utterance::user(text.clone()));

        // History excludes the entry just appended; the model sees it as
        // the message being answered.
        let history: Vec<ChatTurn> = lock(&self.shared.transcript)
            .all_but_last()
            .iter()
            .map(|utterance| ChatTurn {
                role: match utterance.role {
                    SpeakerRole::User => ChatRole::User,
                    SpeakerRole::Agent => ChatRole::Model,
                },
                text: utterance.text.clone(),
            })
            .collect();

        let epoch = self.epoch;
        let completions = self.completions_tx.clone();
        let model = self.model.clone();
        let model_id = self.agent.model.clone();
        let prompt = self.agent.prompt_template.clone();
        let temperature = self.agent.temperature;
        tokio::spawn(async move {
            let reply = model
                .chat(&model_id, &prompt, &history, &text, temperature)
                .await;
            let _ = completions.send(Completion::ModelReply { epoch, reply });
        });
    }

    fn enter_speaking(&mut self, text: String) {
        self.set_state(CallState::Connected(Activity::Speaking));
        // Abort, not stop: it should already be down, and abort is the
        // variant that emits nothing to race with.
        if let Some(recognizer) = &self.recognizer {
            recognizer.abort();
        }
        self.append(Utterance::agent(text.clone()));

        let epoch = self.epoch;
        let completions = self.completions_tx.clone();
        let premium = self.premium.clone();
        let premium_ready = self.premium_ready.clone();
        let fallback = self.fallback.clone();
        let player = self.player.clone();
        let voice_id = self.agent.voice_id.clone();
        let lang = self.agent.transcription_language.clone();
        tokio::spawn(async move {
            speak(text, premium, premium_ready, fallback, player, voice_id, lang).await;
            // Success, synthesis failure, playback failure: all of them
            // complete the Speaking state.
            let _ = completions.send(Completion::SpeakFinished { epoch });
        });
    }

    fn finish(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.epoch += 1;
        if let Some(recognizer) = &self.recognizer {
            recognizer.abort();
        }
        self.fallback.cancel();
        self.player.stop();
        self.set_state(CallState::Ended);
    }

    // ── Event handling ───────────────────────────────────────────────

    fn on_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Interim(text) => {
                if self.state().phase() == CallPhase::Connected {
                    *lock(&self.shared.interim) = text.clone();
                    self.emit(SessionEvent::InterimUpdated(text));
                }
            }
            RecognizerEvent::Final(text) => {
                // A final can arrive in Idle when the user unmuted by
                // hand; treat it like a normal turn. Ignore it anywhere a
                // capability is already busy.
                if matches!(
                    self.state(),
                    CallState::Connected(Activity::Listening) | CallState::Connected(Activity::Idle)
                ) {
                    self.start_processing(text);
                }
            }
            RecognizerEvent::Ended => {
                // Keep the microphone armed between turns without user
                // action. Suppressed once voice input is disabled.
                if self.state().is_listening() && self.voice_input_enabled {
                    if let Some(recognizer) = &self.recognizer {
                        recognizer.start();
                    }
                }
            }
            RecognizerEvent::Error(RecognizerErrorKind::PermissionDenied) => {
                if !self.mic_alerted {
                    self.mic_alerted = true;
                    self.emit(SessionEvent::MicPermissionDenied);
                }
                self.voice_input_enabled = false;
                if self.state().is_listening() {
                    self.set_state(CallState::Connected(Activity::Idle));
                }
            }
            RecognizerEvent::Error(RecognizerErrorKind::Other(message)) => {
                tracing::warn!(error = %message, "recognizer error");
            }
        }
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::ModelReply { epoch, reply } => {
                if epoch != self.epoch || !self.shared.active.load(Ordering::SeqCst) {
                    tracing::debug!("discarding late model reply");
                    return;
                }
                if self.state() != CallState::Connected(Activity::Processing) {
                    return;
                }
                let text = match reply {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("model request failed: {e}");
                        FALLBACK_REPLY.to_string()
                    }
                };
                self.enter_speaking(text);
            }
            Completion::SpeakFinished { epoch } => {
                if epoch != self.epoch || !self.shared.active.load(Ordering::SeqCst) {
                    return;
                }
                if self.state() == CallState::Connected(Activity::Speaking) {
                    self.enter_listening();
                }
            }
        }
    }

    fn toggle_mute(&mut self) {
        if !self.shared.active.load(Ordering::SeqCst) {
            return;
        }
        if let Some(recognizer) = &self.recognizer {
            if self.state().is_listening() {
                recognizer.stop();
            } else {
                recognizer.start();
            }
        }
    }
}

/// Renders one utterance: premium voice when the key is configured and
/// the agent's voice exists under it, the system synthesizer otherwise or
/// on any premium failure.
async fn speak(
    text: String,
    premium: Option<PremiumVoice>,
    premium_ready: Arc<OnceCell<bool>>,
    fallback: Arc<dyn FallbackSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    voice_id: String,
    lang: String,
) {
    if let Some(premium) = premium {
        if !premium.api_key.is_empty() {
            let ready = *premium_ready
                .get_or_init(|| async {
                    match premium.client.voices(&premium.api_key).await {
                        Ok(voices) => voices.iter().any(|v| v.id == voice_id),
                        Err(e) => {
                            tracing::warn!("premium voice listing failed: {e}");
                            false
                        }
                    }
                })
                .await;

            if ready {
                match premium
                    .client
                    .synthesize(&premium.api_key, &voice_id, &text)
                    .await
                {
                    Ok(clip) => {
                        if let Err(e) = player.play(clip).await {
                            // Playback errors are completion, not failure.
                            tracing::debug!("playback error: {e}");
                        }
                        return;
                    }
                    Err(e) => {
                        tracing::warn!("premium synthesis failed, falling back: {e}");
                    }
                }
            }
        }
    }

    if let Err(e) = fallback.speak(&text, &lang).await {
        tracing::debug!("fallback synthesis failed: {e}");
    }
}
