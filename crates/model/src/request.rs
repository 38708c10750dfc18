use serde::{Deserialize, Serialize};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// The output format the model is asked to produce.
    pub response_format: ResponseFormat,
}

/// A complete message in the conversation.
///
/// Chat APIs of this family only know two roles, so system instructions
/// are sent as the first user message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "text", rename_all = "lowercase")]
pub enum ModelMessage {
    /// A user-authored text, including system instructions.
    User(String),
    /// A text in the model's voice.
    Model(String),
}

impl ModelMessage {
    /// Returns the text of this message.
    #[inline]
    pub fn text(&self) -> &str {
        match self {
            ModelMessage::User(text) | ModelMessage::Model(text) => text,
        }
    }
}

/// The output format requested from the model.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form text.
    #[default]
    Text,
    /// The output must be a single JSON value.
    ///
    /// Providers that cannot enforce this should still send the request;
    /// callers are expected to validate the output anyway.
    Json,
}
