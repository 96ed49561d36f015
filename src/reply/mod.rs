//! Reply generation
//!
//! [`ReplyGenerator`] turns a persona instruction, a short conversation window
//! and a new inbound message into reply text. The network call sits behind the
//! [`TextProvider`] trait. Generation never fails toward its caller: every
//! failure folds into a canned apology carried by [`ReplyOutcome`].

mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;

use crate::Result;
use crate::conversations::{Message, Sender};
use crate::prompt::{HouseRules, build_system_instruction};

/// Number of prior turns forwarded to the provider
pub const HISTORY_WINDOW: usize = 5;

/// Sent when the provider answers with no text
pub const EMPTY_REPLY_FALLBACK: &str =
    "De momento não consigo processar o seu pedido. Por favor, tente novamente.";

/// Sent when the provider call fails
pub const PROVIDER_FAILURE_FALLBACK: &str =
    "Estamos com dificuldades técnicas. Por favor, contacte o suporte ou aguarde uns instantes.";

/// Sent when no provider credential is configured
pub const MISSING_CREDENTIAL_FALLBACK: &str =
    "O atendimento automático ainda não está configurado. \
     Por favor, aguarde o contacto de um dos nossos colaboradores.";

/// Provider-facing author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One message in the provider-facing history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(message: &Message) -> Self {
        match message.sender {
            Sender::Customer => Self::user(message.content.clone()),
            Sender::Bot => Self::model(message.content.clone()),
        }
    }
}

/// Everything a provider receives for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    /// Ordered turns; the last one is the new inbound message
    pub turns: Vec<Turn>,
}

/// External generative-text backend
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one generation; `Ok(None)` when the provider returned no text
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>>;
}

/// Terminal result of a reply attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Provider produced text
    Generated(String),
    /// Provider answered without text
    Empty,
    /// No credential configured; the provider was never called
    MissingCredential,
    /// Provider or network failure, kept for diagnostics only
    ProviderFailed(String),
}

impl ReplyOutcome {
    /// Text to append to the conversation
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Empty => EMPTY_REPLY_FALLBACK,
            Self::MissingCredential => MISSING_CREDENTIAL_FALLBACK,
            Self::ProviderFailed(_) => PROVIDER_FAILURE_FALLBACK,
        }
    }

    /// `true` when the provider answered, `false` for the failed terminal state
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Generated(_) | Self::Empty)
    }
}

/// Builds provider requests and folds provider failures into fallback text
#[derive(Clone)]
pub struct ReplyGenerator {
    provider: Option<Arc<dyn TextProvider>>,
}

impl ReplyGenerator {
    /// Generator backed by `provider`; `None` means the credential is missing
    #[must_use]
    pub fn new(provider: Option<Arc<dyn TextProvider>>) -> Self {
        Self { provider }
    }

    /// Generator with no provider configured
    #[must_use]
    pub fn unconfigured() -> Self {
        Self { provider: None }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Assemble the provider request
    ///
    /// Only the last [`HISTORY_WINDOW`] history turns are kept; the new message
    /// always goes last as a user turn.
    #[must_use]
    pub fn build_request(
        rules: &HouseRules,
        instruction: &str,
        history: &[Turn],
        new_message: &str,
    ) -> GenerationRequest {
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let mut turns: Vec<Turn> = history[start..].to_vec();
        turns.push(Turn::user(new_message));

        GenerationRequest {
            system_instruction: build_system_instruction(instruction, rules),
            turns,
        }
    }

    /// Produce a reply for `new_message`; a single attempt that never errors
    pub async fn generate_reply(
        &self,
        rules: &HouseRules,
        instruction: &str,
        history: &[Turn],
        new_message: &str,
    ) -> ReplyOutcome {
        let Some(provider) = &self.provider else {
            tracing::warn!("no provider credential configured, skipping generation");
            return ReplyOutcome::MissingCredential;
        };

        let request = Self::build_request(rules, instruction, history, new_message);
        tracing::debug!(
            provider = provider.name(),
            turns = request.turns.len(),
            "requesting reply"
        );

        match provider.generate(&request).await {
            Ok(Some(text)) if !text.trim().is_empty() => ReplyOutcome::Generated(text),
            Ok(_) => {
                tracing::warn!(provider = provider.name(), "provider returned empty reply");
                ReplyOutcome::Empty
            }
            Err(e) => {
                tracing::error!(provider = provider.name(), error = %e, "reply generation failed");
                ReplyOutcome::ProviderFailed(e.to_string())
            }
        }
    }
}
