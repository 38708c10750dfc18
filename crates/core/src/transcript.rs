//! Conversation history exchanged with the completion provider.

use std::fmt::{self, Display};

use stepwise_model::ModelMessage;

use crate::step::Step;

/// Who a turn is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The user, including the system instructions.
    User,
    /// The model, including observations injected by the host.
    Model,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Model => f.write_str("model"),
        }
    }
}

/// A turn in the transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn exactly as sent to the model.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    fn to_message(&self) -> ModelMessage {
        match self.role {
            Role::User => ModelMessage::User(self.content.clone()),
            Role::Model => ModelMessage::Model(self.content.clone()),
        }
    }
}

/// An append-only conversation.
///
/// The first turn is always the system prompt. Turns are never edited or
/// removed, so the transcript only grows for the lifetime of a session.
#[derive(Clone, Debug)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates a transcript seeded with the system prompt.
    pub fn new<S: Into<String>>(system_prompt: S) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::User,
                content: system_prompt.into(),
            }],
        }
    }

    /// Returns all turns, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the system prompt.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }

    /// Returns the number of turns, including the system prompt.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> &Turn {
        // `new` seeds one turn and nothing removes turns.
        &self.turns[self.turns.len() - 1]
    }

    pub(crate) fn push_user_query(&mut self, query: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: format!("Input: {query}\nOutput:"),
        });
    }

    /// Appends a step in the model's voice. Observations go through here
    /// too, so the next request shows them as prior model output.
    pub(crate) fn push_model_step(&mut self, step: &Step) {
        self.turns.push(Turn {
            role: Role::Model,
            content: step.to_json(),
        });
    }

    pub(crate) fn to_messages(&self) -> Vec<ModelMessage> {
        self.turns.iter().map(Turn::to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_growth() {
        let mut transcript = Transcript::new("You work in steps.");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.system_prompt(), "You work in steps.");
        assert_eq!(transcript.last().role(), Role::User);

        transcript.push_user_query("list files");
        transcript.push_model_step(&Step::observation("a.txt"));

        let turns = transcript.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content(), "Input: list files\nOutput:");
        assert_eq!(turns[2].role(), Role::Model);
        assert_eq!(
            Step::parse(turns[2].content()).unwrap(),
            Step::observation("a.txt")
        );

        let messages = transcript.to_messages();
        assert_eq!(messages[0], ModelMessage::User("You work in steps.".into()));
        assert!(matches!(messages[2], ModelMessage::Model(_)));
    }
}
