//! The call state machine.
//!
//! A session is always in exactly one [`CallState`]. The three
//! capability-owning activities (listening, processing, speaking) are
//! variants of one enum rather than independent flags, so "listening and
//! speaking at once" is unrepresentable. [`transition`] is the single
//! place a state change is validated: the phase sequence
//! connecting → connected → ended is monotonic and `Ended` is absorbing.

use thiserror::Error;

/// Coarse lifecycle phase of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Ringing; no capability is active yet.
    Connecting,
    /// Live call.
    Connected,
    /// Terminal.
    Ended,
}

/// What the session is doing while connected.
///
/// `Idle` is the none-active configuration: reached when voice input is
/// unavailable or denied. At most one capability is active because a
/// session holds at most one `Activity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// No capability active (mic unavailable, permission denied).
    Idle,
    /// The recognizer is armed and capturing.
    Listening,
    /// A model request is in flight for a finalized utterance.
    Processing,
    /// A reply is being synthesized and played.
    Speaking,
}

/// The full state of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Connecting,
    Connected(Activity),
    Ended,
}

impl CallState {
    /// The lifecycle phase this state belongs to.
    pub fn phase(self) -> CallPhase {
        match self {
            Self::Connecting => CallPhase::Connecting,
            Self::Connected(_) => CallPhase::Connected,
            Self::Ended => CallPhase::Ended,
        }
    }

    /// The connected activity, if the call is live.
    pub fn activity(self) -> Option<Activity> {
        match self {
            Self::Connected(activity) => Some(activity),
            _ => None,
        }
    }

    /// Whether the recognizer is logically armed in this state.
    pub fn is_listening(self) -> bool {
        self == Self::Connected(Activity::Listening)
    }
}

/// A state change that would violate the monotonic phase order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid call state transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: CallState,
    pub to: CallState,
}

/// Validates a state change.
///
/// Allowed: `Connecting → Connecting` (no-op), `Connecting → Connected`,
/// `Connected → Connected` (activity changes), any state → `Ended`, and
/// `Ended → Ended` (end is idempotent). Everything else — re-ringing a
/// live call, resurrecting an ended one — is rejected.
///
/// # Errors
///
/// Returns [`TransitionError`] for a phase regression.
pub fn transition(from: CallState, to: CallState) -> Result<CallState, TransitionError> {
    use CallState::*;
    match (from, to) {
        (_, Ended) => Ok(Ended),
        (Connecting, Connecting) => Ok(to),
        (Connecting, Connected(_)) => Ok(to),
        (Connected(_), Connected(_)) => Ok(to),
        (Connected(_), Connecting) | (Ended, Connecting) | (Ended, Connected(_)) => {
            Err(TransitionError { from, to })
        }
    }
}
