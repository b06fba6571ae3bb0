use serde::{Deserialize, Serialize};

/// Conversation turn sent to the chat backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// User/Human message
    #[serde(rename = "user")]
    Human { content: String },

    /// Assistant/AI message, typically an answer collected from an earlier stream
    #[serde(rename = "assistant")]
    AI { content: String },
}

impl Message {
    /// Create human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// Create AI message with text
    pub fn ai(content: impl Into<String>) -> Self {
        Self::AI {
            content: content.into(),
        }
    }

    /// Get role as string
    pub fn role(&self) -> &str {
        match self {
            Self::Human { .. } => "user",
            Self::AI { .. } => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Human { content } | Self::AI { content } => content,
        }
    }
}
