//! End-to-end tests for the call session state machine, driven with
//! scripted collaborators.

use async_trait::async_trait;
use nexus_call::{
    Activity, CallCollaborators, CallHandle, CallSession, CallState, CallTuning, PremiumVoice,
    SessionEvent, FALLBACK_REPLY,
};
use nexus_model::{ChatTurn, ConversationModel, ModelError};
use nexus_types::voice::{VoiceCategory, VoiceGender, VoiceProfile};
use nexus_types::{Agent, AgentStatus, SpeakerRole};
use nexus_voice::{
    AudioClip, AudioPlayer, FallbackSynthesizer, PremiumSynthesizer, RecognizerEvent,
    SpeechRecognizer, VoiceError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::timeout;

/// Shared operation log so tests can assert capability ordering.
type Ops = Arc<Mutex<Vec<String>>>;

fn ops() -> Ops {
    Arc::new(Mutex::new(Vec::new()))
}

fn log(ops: &Ops, entry: &str) {
    ops.lock().expect("ops lock").push(entry.to_string());
}

fn entries(ops: &Ops) -> Vec<String> {
    ops.lock().expect("ops lock").clone()
}

// ── Scripted collaborators ───────────────────────────────────────────

struct ScriptedRecognizer {
    ops: Ops,
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&self) {
        log(&self.ops, "rec.start");
    }
    fn stop(&self) {
        log(&self.ops, "rec.stop");
    }
    fn abort(&self) {
        log(&self.ops, "rec.abort");
    }
}

struct ScriptedModel {
    ops: Ops,
    reply: Option<String>,
    gate: Option<Arc<Notify>>,
    histories: Mutex<Vec<Vec<ChatTurn>>>,
}

impl ScriptedModel {
    fn replying(ops: Ops, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            ops,
            reply: Some(reply.to_string()),
            gate: None,
            histories: Mutex::new(Vec::new()),
        })
    }

    fn failing(ops: Ops) -> Arc<Self> {
        Arc::new(Self {
            ops,
            reply: None,
            gate: None,
            histories: Mutex::new(Vec::new()),
        })
    }

    fn gated(ops: Ops, reply: &str, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            ops,
            reply: Some(reply.to_string()),
            gate: Some(gate),
            histories: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ConversationModel for ScriptedModel {
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, ModelError> {
        self.chat(model, system_instruction, &[], user_message, temperature)
            .await
    }

    async fn chat(
        &self,
        _model: &str,
        _system_instruction: &str,
        history: &[ChatTurn],
        _new_message: &str,
        _temperature: f64,
    ) -> Result<String, ModelError> {
        log(&self.ops, "model.chat");
        self.histories
            .lock()
            .expect("histories lock")
            .push(history.to_vec());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(ModelError::EmptyReply),
        }
    }
}

struct ScriptedPremium {
    ops: Ops,
    voices: Vec<VoiceProfile>,
    fail_synthesis: bool,
}

#[async_trait]
impl PremiumSynthesizer for ScriptedPremium {
    async fn voices(&self, _api_key: &str) -> Result<Vec<VoiceProfile>, VoiceError> {
        Ok(self.voices.clone())
    }

    async fn synthesize(
        &self,
        _api_key: &str,
        _voice_id: &str,
        _text: &str,
    ) -> Result<AudioClip, VoiceError> {
        log(&self.ops, "premium.synthesize");
        if self.fail_synthesis {
            Err(VoiceError::Tts("scripted synthesis failure".to_string()))
        } else {
            Ok(AudioClip {
                pcm: vec![0u8; 8],
                sample_rate: 22_050,
            })
        }
    }
}

struct InstantFallback {
    ops: Ops,
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl FallbackSynthesizer for InstantFallback {
    async fn speak(&self, text: &str, _voice_hint: &str) -> Result<(), VoiceError> {
        log(&self.ops, "fallback.speak");
        self.spoken
            .lock()
            .expect("spoken lock")
            .push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        log(&self.ops, "fallback.cancel");
    }
}

struct InstantPlayer {
    ops: Ops,
    fail: bool,
}

#[async_trait]
impl AudioPlayer for InstantPlayer {
    async fn play(&self, _clip: AudioClip) -> Result<(), VoiceError> {
        log(&self.ops, "player.play");
        if self.fail {
            Err(VoiceError::Playback("scripted playback failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn stop(&self) {
        log(&self.ops, "player.stop");
    }
}

// ── Harness ──────────────────────────────────────────────────────────

fn test_agent(greeting: &str) -> Agent {
    Agent {
        id: "agent-1".to_string(),
        name: "Dr. Sarah (Dental)".to_string(),
        role: "Scheduler".to_string(),
        status: AgentStatus::Active,
        model: "gemini-3-flash-preview".to_string(),
        voice_id: "v1".to_string(),
        phone_numbers: vec![],
        prompt_template: "You are a helpful dental assistant.".to_string(),
        temperature: 0.7,
        crm_location_id: None,
        folder_id: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        greeting: greeting.to_string(),
        transcription_language: "en-US".to_string(),
        max_duration_seconds: 600,
        silence_timeout_seconds: 2.0,
        interruption_sensitivity: 0.5,
        wait_for_greeting: true,
        crm_field_mapping: None,
    }
}

fn voice_v1() -> VoiceProfile {
    VoiceProfile {
        id: "v1".to_string(),
        name: "Aria".to_string(),
        gender: VoiceGender::Female,
        lang: "en-US".to_string(),
        category: VoiceCategory::Standard,
        preview_url: None,
    }
}

fn tuning() -> CallTuning {
    CallTuning {
        connect_delay: Duration::from_millis(20),
    }
}

struct Harness {
    handle: CallHandle,
    events: broadcast::Receiver<SessionEvent>,
    recognizer_tx: mpsc::UnboundedSender<RecognizerEvent>,
    ops: Ops,
    fallback: Arc<InstantFallback>,
}

struct HarnessConfig {
    greeting: String,
    model: Option<Arc<ScriptedModel>>,
    premium: Option<Arc<ScriptedPremium>>,
    player_fails: bool,
    with_recognizer: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            greeting: String::new(),
            model: None,
            premium: None,
            player_fails: false,
            with_recognizer: true,
        }
    }
}

fn start(config: HarnessConfig, ops: Ops) -> Harness {
    let (recognizer_tx, recognizer_rx) = mpsc::unbounded_channel();
    let model = config
        .model
        .unwrap_or_else(|| ScriptedModel::replying(ops.clone(), "Sure, what day works?"));
    let fallback = Arc::new(InstantFallback {
        ops: ops.clone(),
        spoken: Mutex::new(Vec::new()),
    });
    let premium = config.premium.map(|client| PremiumVoice {
        client: client as Arc<dyn PremiumSynthesizer>,
        api_key: "tts-key".to_string(),
    });

    let collaborators = CallCollaborators {
        recognizer: config.with_recognizer.then(|| {
            Arc::new(ScriptedRecognizer { ops: ops.clone() }) as Arc<dyn SpeechRecognizer>
        }),
        recognizer_events: recognizer_rx,
        model,
        premium,
        fallback: fallback.clone(),
        player: Arc::new(InstantPlayer {
            ops: ops.clone(),
            fail: config.player_fails,
        }),
    };

    let handle = CallSession::spawn(test_agent(&config.greeting), collaborators, tuning());
    let events = handle.subscribe();
    Harness {
        handle,
        events,
        recognizer_tx,
        ops,
        fallback,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream closed")
}

/// Drains events until one matches, returning it.
async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionEvent>, mut pred: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

async fn wait_for_state(rx: &mut broadcast::Receiver<SessionEvent>, state: CallState) {
    wait_for(rx, |e| matches!(e, SessionEvent::StateChanged(s) if *s == state)).await;
}

fn index_of(ops: &[String], entry: &str) -> usize {
    ops.iter()
        .position(|op| op == entry)
        .unwrap_or_else(|| panic!("{entry} not found in {ops:?}"))
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn greeting_is_spoken_first_then_listening() {
    let ops = ops();
    let mut h = start(
        HarnessConfig {
            greeting: "Hello! How can I help you today?".to_string(),
            ..Default::default()
        },
        ops.clone(),
    );

    // Speaking fires first, with the exact greeting text.
    let event = wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::TranscriptAppended(_))
    })
    .await;
    match event {
        SessionEvent::TranscriptAppended(utterance) => {
            assert_eq!(utterance.role, SpeakerRole::Agent);
            assert_eq!(utterance.text, "Hello! How can I help you today?");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;
    assert_eq!(
        h.handle.state(),
        CallState::Connected(Activity::Listening)
    );
    assert_eq!(h.handle.transcript().len(), 1);
}

#[tokio::test]
async fn no_greeting_goes_straight_to_listening() {
    let ops = ops();
    let mut h = start(HarnessConfig::default(), ops.clone());

    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;
    assert!(h.handle.transcript().is_empty());
}

#[tokio::test]
async fn full_turn_appends_user_then_agent() {
    let ops = ops();
    let model = ScriptedModel::replying(ops.clone(), "Sure, what day works?");
    let mut h = start(
        HarnessConfig {
            model: Some(model.clone()),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Final("I need an appointment".to_string()))
        .expect("send final");

    wait_for_state(&mut h.events, CallState::Connected(Activity::Processing)).await;
    wait_for_state(&mut h.events, CallState::Connected(Activity::Speaking)).await;
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let transcript = h.handle.transcript();
    let entries = transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, SpeakerRole::User);
    assert_eq!(entries[0].text, "I need an appointment");
    assert_eq!(entries[1].role, SpeakerRole::Agent);
    assert_eq!(entries[1].text, "Sure, what day works?");

    // The just-appended user entry is the new message, not history.
    let histories = model.histories.lock().expect("histories lock");
    assert_eq!(histories.len(), 1);
    assert!(histories[0].is_empty());
}

#[tokio::test]
async fn history_excludes_only_the_new_utterance() {
    let ops = ops();
    let model = ScriptedModel::replying(ops.clone(), "Noted.");
    let mut h = start(
        HarnessConfig {
            greeting: "Hi there!".to_string(),
            model: Some(model.clone()),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    // First turn: history is the greeting only.
    h.recognizer_tx
        .send(RecognizerEvent::Final("First question".to_string()))
        .expect("send final");
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    // Second turn: history is greeting + turn one.
    h.recognizer_tx
        .send(RecognizerEvent::Final("Second question".to_string()))
        .expect("send final");
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let histories = model.histories.lock().expect("histories lock");
    assert_eq!(histories.len(), 2);
    assert_eq!(histories[0].len(), 1);
    assert_eq!(histories[1].len(), 3);
    assert_eq!(histories[1][1].text, "First question");
}

#[tokio::test]
async fn capabilities_never_overlap() {
    let ops = ops();
    let premium = Arc::new(ScriptedPremium {
        ops: ops.clone(),
        voices: vec![voice_v1()],
        fail_synthesis: false,
    });
    let mut h = start(
        HarnessConfig {
            premium: Some(premium),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Final("Check ordering".to_string()))
        .expect("send final");
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let log = entries(&h.ops);
    // Capture stops before the model request goes out, and the recognizer
    // is aborted before synthesis starts.
    assert!(index_of(&log, "rec.stop") < index_of(&log, "model.chat"));
    assert!(index_of(&log, "rec.abort") < index_of(&log, "premium.synthesize"));
    assert!(index_of(&log, "premium.synthesize") < index_of(&log, "player.play"));
}

#[tokio::test]
async fn model_failure_speaks_fallback_phrase() {
    let ops = ops();
    let mut h = start(
        HarnessConfig {
            model: Some(ScriptedModel::failing(ops.clone())),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Final("Anyone there?".to_string()))
        .expect("send final");

    wait_for_state(&mut h.events, CallState::Connected(Activity::Speaking)).await;
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let transcript = h.handle.transcript();
    assert_eq!(transcript.entries()[1].text, FALLBACK_REPLY);
    assert_eq!(
        h.fallback.spoken.lock().expect("spoken lock").as_slice(),
        [FALLBACK_REPLY]
    );
}

#[tokio::test]
async fn premium_failure_falls_back_without_stalling() {
    let ops = ops();
    let premium = Arc::new(ScriptedPremium {
        ops: ops.clone(),
        voices: vec![voice_v1()],
        fail_synthesis: true,
    });
    let mut h = start(
        HarnessConfig {
            greeting: "Hello!".to_string(),
            premium: Some(premium),
            ..Default::default()
        },
        ops.clone(),
    );

    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let log = entries(&h.ops);
    assert!(log.contains(&"premium.synthesize".to_string()));
    assert!(log.contains(&"fallback.speak".to_string()));
    assert_eq!(
        h.fallback.spoken.lock().expect("spoken lock").as_slice(),
        ["Hello!"]
    );
}

#[tokio::test]
async fn premium_skipped_when_voice_not_under_key() {
    let ops = ops();
    let premium = Arc::new(ScriptedPremium {
        ops: ops.clone(),
        voices: vec![], // agent's voice is not available under this key
        fail_synthesis: false,
    });
    let mut h = start(
        HarnessConfig {
            greeting: "Hello!".to_string(),
            premium: Some(premium),
            ..Default::default()
        },
        ops.clone(),
    );

    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    let log = entries(&h.ops);
    assert!(!log.contains(&"premium.synthesize".to_string()));
    assert!(log.contains(&"fallback.speak".to_string()));
}

#[tokio::test]
async fn playback_error_counts_as_completion() {
    let ops = ops();
    let premium = Arc::new(ScriptedPremium {
        ops: ops.clone(),
        voices: vec![voice_v1()],
        fail_synthesis: false,
    });
    let mut h = start(
        HarnessConfig {
            greeting: "Hello!".to_string(),
            premium: Some(premium),
            player_fails: true,
            ..Default::default()
        },
        ops.clone(),
    );

    // A broken stream must still return the call to Listening.
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;
    let log = entries(&h.ops);
    assert!(log.contains(&"player.play".to_string()));
}

#[tokio::test]
async fn end_call_is_idempotent() {
    let ops = ops();
    let mut h = start(HarnessConfig::default(), ops.clone());
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.handle.end();
    wait_for_state(&mut h.events, CallState::Ended).await;
    let aborts_after_first_end = entries(&h.ops)
        .iter()
        .filter(|op| *op == "rec.abort")
        .count();

    h.handle.end();
    h.handle.end();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.handle.state(), CallState::Ended);
    assert!(!h.handle.is_active());
    let aborts_now = entries(&h.ops)
        .iter()
        .filter(|op| *op == "rec.abort")
        .count();
    assert_eq!(
        aborts_now, aborts_after_first_end,
        "repeated end-call must not re-run teardown"
    );
}

#[tokio::test]
async fn end_during_connecting_never_connects() {
    let ops = ops();
    let mut h = start(
        HarnessConfig {
            greeting: "Hello!".to_string(),
            ..Default::default()
        },
        ops.clone(),
    );

    // End before the ringing delay elapses.
    h.handle.end();
    wait_for_state(&mut h.events, CallState::Ended).await;

    assert!(h.handle.transcript().is_empty());
    assert!(!entries(&h.ops).contains(&"fallback.speak".to_string()));
}

#[tokio::test]
async fn late_model_reply_is_discarded_after_end() {
    let ops = ops();
    let gate = Arc::new(Notify::new());
    let model = ScriptedModel::gated(ops.clone(), "Too late", gate.clone());
    let mut h = start(
        HarnessConfig {
            model: Some(model),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Final("Hold on".to_string()))
        .expect("send final");
    wait_for_state(&mut h.events, CallState::Connected(Activity::Processing)).await;

    // End while the model request is in flight, then let it resolve.
    h.handle.end();
    wait_for_state(&mut h.events, CallState::Ended).await;
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transcript = h.handle.transcript();
    assert_eq!(transcript.len(), 1, "only the user utterance is recorded");
    assert_eq!(transcript.entries()[0].role, SpeakerRole::User);
    assert_eq!(h.handle.state(), CallState::Ended);
    assert!(!entries(&h.ops).contains(&"fallback.speak".to_string()));
}

#[tokio::test]
async fn recognizer_is_rearmed_when_it_ends_on_its_own() {
    let ops = ops();
    let mut h = start(HarnessConfig::default(), ops.clone());
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Ended)
        .expect("send ended");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let starts = entries(&h.ops)
        .iter()
        .filter(|op| *op == "rec.start")
        .count();
    assert_eq!(starts, 2, "auto-restart should re-arm the recognizer");
    assert_eq!(
        h.handle.state(),
        CallState::Connected(Activity::Listening)
    );
}

#[tokio::test]
async fn permission_denial_alerts_once_and_leaves_listening() {
    let ops = ops();
    let mut h = start(HarnessConfig::default(), ops.clone());
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Error(
            nexus_voice::RecognizerErrorKind::PermissionDenied,
        ))
        .expect("send error");

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::MicPermissionDenied)
    })
    .await;
    wait_for_state(&mut h.events, CallState::Connected(Activity::Idle)).await;

    // A second denial produces no second alert.
    h.recognizer_tx
        .send(RecognizerEvent::Error(
            nexus_voice::RecognizerErrorKind::PermissionDenied,
        ))
        .expect("send error");
    // The recognizer ending afterwards must not re-arm.
    h.recognizer_tx
        .send(RecognizerEvent::Ended)
        .expect("send ended");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let log = entries(&h.ops);
    assert_eq!(log.iter().filter(|op| *op == "rec.start").count(), 1);

    // Drain whatever is buffered: the one alert already seen is the only
    // one there ever was.
    let mut extra_alerts = 0;
    while let Ok(event) = h.events.try_recv() {
        if matches!(event, SessionEvent::MicPermissionDenied) {
            extra_alerts += 1;
        }
    }
    assert_eq!(extra_alerts, 0, "permission alert must be one-time");
}

#[tokio::test]
async fn missing_recognizer_degrades_to_speech_only() {
    let ops = ops();
    let mut h = start(
        HarnessConfig {
            greeting: "Hello!".to_string(),
            with_recognizer: false,
            ..Default::default()
        },
        ops.clone(),
    );

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::VoiceInputUnavailable)
    })
    .await;

    // The greeting still plays; afterwards the call idles instead of
    // listening.
    wait_for_state(&mut h.events, CallState::Connected(Activity::Idle)).await;
    assert_eq!(h.handle.transcript().len(), 1);
    assert!(!entries(&h.ops).contains(&"rec.start".to_string()));
}

#[tokio::test]
async fn interim_results_overwrite_and_clear() {
    let ops = ops();
    let mut h = start(HarnessConfig::default(), ops.clone());
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    h.recognizer_tx
        .send(RecognizerEvent::Interim("I need".to_string()))
        .expect("interim 1");
    h.recognizer_tx
        .send(RecognizerEvent::Interim("I need an app".to_string()))
        .expect("interim 2");

    wait_for(&mut h.events, |e| {
        matches!(e, SessionEvent::InterimUpdated(text) if text == "I need an app")
    })
    .await;
    assert_eq!(h.handle.interim(), "I need an app");

    h.recognizer_tx
        .send(RecognizerEvent::Final("I need an appointment".to_string()))
        .expect("final");
    wait_for(&mut h.events, |e| matches!(e, SessionEvent::InterimCleared)).await;
    assert_eq!(h.handle.interim(), "");
}

#[tokio::test]
async fn transcript_never_reorders_across_turns() {
    let ops = ops();
    let model = ScriptedModel::replying(ops.clone(), "Reply");
    let mut h = start(
        HarnessConfig {
            model: Some(model),
            ..Default::default()
        },
        ops.clone(),
    );
    wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;

    for i in 0..3 {
        h.recognizer_tx
            .send(RecognizerEvent::Final(format!("Question {i}")))
            .expect("send final");
        wait_for_state(&mut h.events, CallState::Connected(Activity::Listening)).await;
    }

    let transcript = h.handle.transcript();
    let entries = transcript.entries();
    assert_eq!(entries.len(), 6);
    for (i, pair) in entries.chunks(2).enumerate() {
        assert_eq!(pair[0].role, SpeakerRole::User);
        assert_eq!(pair[0].text, format!("Question {i}"));
        assert_eq!(pair[1].role, SpeakerRole::Agent);
    }
}
