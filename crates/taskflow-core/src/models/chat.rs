//! Chat history entries kept per session.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a chat message carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Clarification,
    TaskPlan,
    Conversation,
    TaskResult,
    Error,
}

/// A single entry in a session's chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub message_type: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl ChatMessage {
    pub fn new(sender: Sender, content: impl Into<String>, message_type: MessageKind) -> Self {
        Self {
            sender,
            content: content.into(),
            timestamp: Timestamp::now(),
            message_type,
            task_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content, MessageKind::Text)
    }

    pub fn assistant(content: impl Into<String>, message_type: MessageKind) -> Self {
        Self::new(Sender::Assistant, content, message_type)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content, MessageKind::Text)
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
