//! Two-agent conversations.
//!
//! The initiator's opening message starts the chat; the recipient answers,
//! then the two alternate. One turn is one message from each side, so
//! `max_turns = n` yields at most `2n` messages. A reply of exactly
//! `TERMINATE` ends the chat early.

use std::sync::Arc;

use serde::Serialize;

use crate::error::ServerError;
use crate::llm::{ChatMessage, ChatModel};

pub const TERMINATION_MESSAGE: &str = "TERMINATE";

const REFLECTION_PROMPT: &str =
    "Summarize the takeaway from the conversation. Do not add any introductory phrases.";

/// An LLM-backed participant with a fixed system message.
#[derive(Clone)]
pub struct ConversableAgent {
    pub name: String,
    pub system_message: String,
    model: Arc<dyn ChatModel>,
}

impl ConversableAgent {
    pub fn new(
        name: impl Into<String>,
        system_message: impl Into<String>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            name: name.into(),
            system_message: system_message.into(),
            model,
        }
    }

    /// Own messages become `assistant`, everyone else's `user`.
    fn as_messages(&self, history: &[ChatTurn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(&self.system_message));
        messages.extend(history.iter().map(|turn| {
            if turn.speaker == self.name {
                ChatMessage::assistant(&turn.content)
            } else {
                ChatMessage::user(&turn.content)
            }
        }));
        messages
    }

    pub async fn generate_reply(&self, history: &[ChatTurn]) -> Result<String, ServerError> {
        let completion = self.model.complete(&self.as_messages(history)).await?;
        Ok(completion.content)
    }

    async fn reflect(&self, history: &[ChatTurn]) -> Result<String, ServerError> {
        let mut messages = self.as_messages(history);
        messages.push(ChatMessage::system(REFLECTION_PROMPT));
        Ok(self.model.complete(&messages).await?.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub speaker: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMethod {
    /// Ask the initiator's model to summarize the whole chat.
    ReflectionWithLlm,
    LastMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResult {
    pub chat_history: Vec<ChatTurn>,
    pub summary: String,
    pub turns: u32,
}

/// Run a bounded conversation from `initiator` to `recipient`.
pub async fn initiate_chat(
    initiator: &ConversableAgent,
    recipient: &ConversableAgent,
    message: &str,
    max_turns: u32,
    summary_method: SummaryMethod,
) -> Result<ChatResult, ServerError> {
    if max_turns == 0 {
        return Err(ServerError::BadRequest("max_turns must be at least 1".to_string()));
    }

    let mut history = vec![ChatTurn {
        speaker: initiator.name.clone(),
        content: message.to_string(),
    }];
    let mut turns = 0;

    while turns < max_turns {
        let reply = recipient.generate_reply(&history).await?;
        let done = is_termination(&reply);
        history.push(ChatTurn {
            speaker: recipient.name.clone(),
            content: reply,
        });
        turns += 1;
        if done || turns == max_turns {
            break;
        }

        let next = initiator.generate_reply(&history).await?;
        let done = is_termination(&next);
        history.push(ChatTurn {
            speaker: initiator.name.clone(),
            content: next,
        });
        if done {
            break;
        }
    }

    tracing::debug!(
        "[Workflow] {} -> {} finished after {} turn(s), {} message(s)",
        initiator.name,
        recipient.name,
        turns,
        history.len()
    );

    let summary = match summary_method {
        SummaryMethod::ReflectionWithLlm => initiator.reflect(&history).await?,
        SummaryMethod::LastMessage => history
            .last()
            .map(|turn| turn.content.clone())
            .unwrap_or_default(),
    };

    Ok(ChatResult {
        chat_history: history,
        summary,
        turns,
    })
}

fn is_termination(content: &str) -> bool {
    content.trim() == TERMINATION_MESSAGE
}
