//! The provider-agnostic conversation seam.

use crate::error::ModelError;
use async_trait::async_trait;

/// Role vocabulary the model API expects for history turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Model,
}

impl ChatRole {
    /// Wire name for the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One prior turn of conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Abstract conversational model.
///
/// Implementations must be cheap to share (`Arc<dyn ConversationModel>`);
/// one instance serves many concurrent sessions.
#[async_trait]
pub trait ConversationModel: Send + Sync {
    /// Single-turn generation: system instruction plus one user message.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] on transport failure, a non-success API
    /// status, or an empty reply.
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, ModelError>;

    /// Multi-turn chat: ordered prior history plus the new user message.
    ///
    /// `history` must not include the new message; callers pass it
    /// separately so the provider sees it as the turn being answered.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] on transport failure, a non-success API
    /// status, or an empty reply.
    async fn chat(
        &self,
        model: &str,
        system_instruction: &str,
        history: &[ChatTurn],
        new_message: &str,
        temperature: f64,
    ) -> Result<String, ModelError>;
}
