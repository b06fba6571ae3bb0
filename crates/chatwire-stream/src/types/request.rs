use serde::{Deserialize, Serialize};

use super::message::Message;

/// Body of a streaming chat request.
///
/// Serialized in camelCase: `{"messages":[...],"sessionId":"...","stream":true,"filePaths":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<Message>,

    /// Session announced by the backend on an earlier turn; continues that conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Server-side paths of previously uploaded files to attach
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_paths: Vec<String>,
}

fn default_stream() -> bool {
    true
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            session_id: None,
            stream: true,
            file_paths: Vec::new(),
        }
    }

    /// Single-turn request with one user message
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Message::human(text)])
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_file_paths(mut self, file_paths: Vec<String>) -> Self {
        self.file_paths = file_paths;
        self
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Body of a stop request: asks the backend to stop generating for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRequest {
    pub session_id: String,
}

impl StopRequest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}
