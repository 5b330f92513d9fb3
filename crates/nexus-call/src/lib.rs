//! Turn-taking call simulator for the NexusVoice platform.
//!
//! Runs a simulated phone call against a configured agent: captures the
//! human side through a speech recognizer, forwards finalized utterances
//! plus conversation history to the conversational model, and renders the
//! reply through the synthesizer chain — looping until the call ends.
//!
//! The three capabilities (recognizer, model, synthesizer) are never
//! concurrently active for one session; see [`state`] for the machine and
//! [`session`] for the loop that enforces it.

pub mod session;
pub mod state;

pub use session::{
    CallCollaborators, CallHandle, CallSession, CallTuning, PremiumVoice, SessionEvent,
    FALLBACK_REPLY,
};
pub use state::{transition, Activity, CallPhase, CallState, TransitionError};
