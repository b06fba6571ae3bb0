use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Severity, StreamError};
use crate::session::SessionState;
use crate::streaming::StreamEvent;

/// Receiver of session callbacks.
///
/// Callbacks run synchronously on the session's read loop, one at a time and in
/// arrival order. The session applies no timeout to them: an implementation
/// that blocks stalls the stream, so keep each call short.
///
/// Per session, `on_session_id` fires at most once and exactly one of
/// `on_complete` or a non-recoverable `on_error` ends the session.
pub trait StreamHandler: Send {
    /// Fired before any network activity
    fn on_start(&mut self) {}

    fn on_thinking(&mut self, _text: &str) {}

    /// Answer delta. May be empty when the backend omits `content`.
    fn on_data(&mut self, text: &str);

    fn on_session_id(&mut self, _id: &str) {}

    fn on_complete(&mut self) {}

    /// Errors with [`StreamError::is_recoverable`] leave the session running
    fn on_error(&mut self, _error: &StreamError, _severity: Severity) {}
}

impl<H: StreamHandler + ?Sized> StreamHandler for Box<H> {
    fn on_start(&mut self) {
        (**self).on_start()
    }

    fn on_thinking(&mut self, text: &str) {
        (**self).on_thinking(text)
    }

    fn on_data(&mut self, text: &str) {
        (**self).on_data(text)
    }

    fn on_session_id(&mut self, id: &str) {
        (**self).on_session_id(id)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_error(&mut self, error: &StreamError, severity: Severity) {
        (**self).on_error(error, severity)
    }
}

/// Forwards every callback as a [`StreamEvent`]. A closed receiver is ignored.
impl StreamHandler for mpsc::UnboundedSender<StreamEvent> {
    fn on_start(&mut self) {
        let _ = self.send(StreamEvent::Start);
    }

    fn on_thinking(&mut self, text: &str) {
        let _ = self.send(StreamEvent::Thinking {
            content: text.to_string(),
        });
    }

    fn on_data(&mut self, text: &str) {
        let _ = self.send(StreamEvent::Message {
            content: text.to_string(),
        });
    }

    fn on_session_id(&mut self, id: &str) {
        let _ = self.send(StreamEvent::SessionId { id: id.to_string() });
    }

    fn on_complete(&mut self) {
        let _ = self.send(StreamEvent::Done);
    }

    fn on_error(&mut self, error: &StreamError, severity: Severity) {
        let _ = self.send(StreamEvent::Error {
            message: error.to_string(),
            severity,
            recoverable: error.is_recoverable(),
        });
    }
}

type TextCallback = Box<dyn FnMut(&str) + Send>;
type UnitCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(&StreamError, Severity) + Send>;

/// Closure-based handler; unset slots are no-ops.
pub struct Callbacks {
    on_start: Option<UnitCallback>,
    on_thinking: Option<TextCallback>,
    on_data: TextCallback,
    on_session_id: Option<TextCallback>,
    on_complete: Option<UnitCallback>,
    on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new(on_data: impl FnMut(&str) + Send + 'static) -> Self {
        Self {
            on_start: None,
            on_thinking: None,
            on_data: Box::new(on_data),
            on_session_id: None,
            on_complete: None,
            on_error: None,
        }
    }

    pub fn on_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_thinking(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_thinking = Some(Box::new(f));
        self
    }

    pub fn on_session_id(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_session_id = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&StreamError, Severity) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_thinking", &self.on_thinking.is_some())
            .field("on_session_id", &self.on_session_id.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl StreamHandler for Callbacks {
    fn on_start(&mut self) {
        if let Some(f) = self.on_start.as_mut() {
            f();
        }
    }

    fn on_thinking(&mut self, text: &str) {
        if let Some(f) = self.on_thinking.as_mut() {
            f(text);
        }
    }

    fn on_data(&mut self, text: &str) {
        (self.on_data)(text);
    }

    fn on_session_id(&mut self, id: &str) {
        if let Some(f) = self.on_session_id.as_mut() {
            f(id);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.on_complete.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, error: &StreamError, severity: Severity) {
        if let Some(f) = self.on_error.as_mut() {
            f(error, severity);
        }
    }
}

/// Error as recorded by [`ResponseCollector`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedError {
    pub message: String,
    pub severity: Severity,
    pub recoverable: bool,
}

/// Everything one session produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedResponse {
    pub session_id: Option<String>,
    /// Concatenated thinking deltas
    pub thinking: String,
    /// Concatenated answer deltas
    pub content: String,
    pub errors: Vec<CollectedError>,
    /// Terminal state, `None` while the session is still running
    pub outcome: Option<SessionState>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CollectedResponse {
    pub fn is_complete(&self) -> bool {
        self.outcome == Some(SessionState::Completed)
    }

    /// The user stopped the turn before it finished
    pub fn is_stopped(&self) -> bool {
        self.outcome == Some(SessionState::Cancelled)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        u64::try_from((finished - started).num_milliseconds()).ok()
    }
}

/// Handler that accumulates deltas the way a chat view renders them
#[derive(Debug, Default)]
pub struct ResponseCollector {
    response: CollectedResponse,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(&self) -> &CollectedResponse {
        &self.response
    }

    pub fn into_response(self) -> CollectedResponse {
        self.response
    }

    fn finish(&mut self, outcome: SessionState) {
        self.response.outcome = Some(outcome);
        self.response.finished_at = Some(Utc::now());
    }
}

impl StreamHandler for ResponseCollector {
    fn on_start(&mut self) {
        self.response.started_at = Some(Utc::now());
    }

    fn on_thinking(&mut self, text: &str) {
        self.response.thinking.push_str(text);
    }

    fn on_data(&mut self, text: &str) {
        self.response.content.push_str(text);
    }

    fn on_session_id(&mut self, id: &str) {
        self.response.session_id = Some(id.to_string());
    }

    fn on_complete(&mut self) {
        self.finish(SessionState::Completed);
    }

    fn on_error(&mut self, error: &StreamError, severity: Severity) {
        self.response.errors.push(CollectedError {
            message: error.to_string(),
            severity,
            recoverable: error.is_recoverable(),
        });

        if error.is_cancelled() {
            self.finish(SessionState::Cancelled);
        } else if !error.is_recoverable() {
            self.finish(SessionState::Failed);
        }
    }
}
