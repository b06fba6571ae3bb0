use serde::{Deserialize, Serialize};

use crate::error::Severity;
use crate::handler::StreamHandler;
use crate::session::CancelHandle;

/// Application-level event produced by a stream session.
///
/// The callback contract in [`StreamHandler`] and the event stream returned by
/// `StreamClient::stream` carry the same information in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session started, nothing sent yet
    Start,

    /// Backend-assigned correlation id; emitted at most once
    SessionId {
        id: String,
    },

    /// Intermediate reasoning delta
    Thinking {
        content: String,
    },

    /// Answer delta
    Message {
        content: String,
    },

    Error {
        message: String,
        severity: Severity,
        /// True when the session keeps running after this error
        recoverable: bool,
    },

    /// Stream ended normally
    Done,
}

impl StreamEvent {
    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamEvent::Done => true,
            StreamEvent::Error { recoverable, .. } => !recoverable,
            _ => false,
        }
    }
}

/// Decoded payload of one `data:` frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Delta text; a missing field is an empty delta
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Session id, if the frame carries a non-empty one
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_thinking(&self, marker: &str) -> bool {
        self.kind.as_deref() == Some(marker)
    }
}

/// Routes decoded chunks to typed events and remembers the session id.
///
/// One dispatcher serves exactly one session. The first non-empty session id
/// seen is kept for the rest of the session; later values are ignored.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    thinking_marker: String,
    session_id: Option<String>,
}

impl EventDispatcher {
    pub fn new(thinking_marker: impl Into<String>) -> Self {
        Self {
            thinking_marker: thinking_marker.into(),
            session_id: None,
        }
    }

    /// Session id captured so far
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Turn one chunk into the events it stands for, in delivery order.
    ///
    /// Yields an optional `SessionId` event followed by exactly one
    /// `Thinking` or `Message` event.
    pub fn classify(&mut self, chunk: ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(2);

        if self.session_id.is_none() {
            if let Some(id) = chunk.session_id() {
                tracing::debug!(session_id = %id, "session id captured");
                self.session_id = Some(id.to_string());
                events.push(StreamEvent::SessionId { id: id.to_string() });
            }
        }

        let is_thinking = chunk.is_thinking(&self.thinking_marker);
        let content = chunk.content.unwrap_or_default();

        if is_thinking {
            events.push(StreamEvent::Thinking { content });
        } else {
            events.push(StreamEvent::Message { content });
        }

        events
    }

    /// Classify a chunk and invoke the matching callbacks synchronously.
    ///
    /// Stops before the next callback once `cancel` has fired, so a handler
    /// that cancels from `on_session_id` never sees the frame's delta.
    pub fn dispatch<H>(&mut self, chunk: ChatChunk, handler: &mut H, cancel: &CancelHandle)
    where
        H: StreamHandler + ?Sized,
    {
        for event in self.classify(chunk) {
            if cancel.is_cancelled() {
                break;
            }
            match event {
                StreamEvent::SessionId { id } => handler.on_session_id(&id),
                StreamEvent::Thinking { content } => handler.on_thinking(&content),
                StreamEvent::Message { content } => handler.on_data(&content),
                _ => {}
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_THINKING_MARKER)
    }
}
