//! Stream session lifecycle.
//!
//! A [`SessionController`] drives one request from start to exactly one
//! terminal state:
//!
//! ```text
//! Idle -> Requesting -> Streaming -> Completed
//!             |             |
//!             +-------------+-----> Cancelled | Failed
//! ```
//!
//! The only suspension points are opening the request and awaiting the next
//! chunk. Everything a chunk produces is decoded and dispatched before the
//! next read, so callbacks observe frames strictly in arrival order.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::auth::{bearer_header, NoToken, TokenProvider};
use crate::buffer_utils::{parse_frame, FrameBuffer, ParsedFrame};
use crate::config::ClientConfig;
use crate::error::{Result, Severity, StreamError};
use crate::handler::{CollectedResponse, ResponseCollector, StreamHandler};
use crate::streaming::{EventDispatcher, StreamEvent};
use crate::transport::{HttpTransport, Transport, TransportRequest};
use crate::types::{ChatRequest, StopRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

/// Cancels a session from anywhere.
///
/// Cloneable and idempotent: only the first call has an effect, and calling it
/// after the session has ended does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("session cancellation requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the session when the guard is dropped
    pub(crate) fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}

/// Owns the state of a single stream session
pub struct SessionController {
    state: SessionState,
    config: Arc<ClientConfig>,
    tokens: Arc<dyn TokenProvider>,
    frames: FrameBuffer,
    dispatcher: EventDispatcher,
    cancel: CancelHandle,
}

impl SessionController {
    pub fn new(
        config: Arc<ClientConfig>,
        tokens: Arc<dyn TokenProvider>,
        cancel: CancelHandle,
    ) -> Self {
        let dispatcher = EventDispatcher::new(config.thinking_marker.clone());
        Self {
            state: SessionState::Idle,
            config,
            tokens,
            frames: FrameBuffer::with_capacity(4096),
            dispatcher,
            cancel,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Session id announced by the backend so far
    pub fn session_id(&self) -> Option<&str> {
        self.dispatcher.session_id()
    }

    /// Run the session to its terminal state.
    ///
    /// A controller runs once; calling this again returns the state it
    /// already reached without firing any callback.
    pub async fn run<H>(
        &mut self,
        transport: &dyn Transport,
        request: &ChatRequest,
        handler: &mut H,
    ) -> SessionState
    where
        H: StreamHandler + ?Sized,
    {
        if self.state != SessionState::Idle {
            tracing::warn!(state = ?self.state, "session controller already used");
            return self.state;
        }

        self.transition(SessionState::Requesting);
        handler.on_start();

        let prepared = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(err) => return self.fail(err, handler),
        };

        let token = self.cancel.token.clone();

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = transport.open(prepared) => Some(result),
        };

        let mut body = match opened {
            None => return self.cancelled(handler),
            Some(Err(err)) => return self.fail(err, handler),
            Some(Ok(body)) => body,
        };

        self.transition(SessionState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                next = body.next_chunk() => Some(next),
            };

            match next {
                None => {
                    body.cancel();
                    return self.cancelled(handler);
                }
                Some(Ok(Some(chunk))) => {
                    tracing::trace!(bytes = chunk.len(), "chunk received");
                    for frame in self.frames.append(&chunk) {
                        // A callback may have cancelled; the rest of the chunk is dropped
                        if token.is_cancelled() {
                            break;
                        }
                        self.process_frame(&frame, handler);
                    }
                }
                Some(Ok(None)) => {
                    if let Some(frame) = self.frames.flush() {
                        tracing::debug!("flushing unterminated final frame");
                        self.process_frame(&frame, handler);
                    }
                    if token.is_cancelled() {
                        return self.cancelled(handler);
                    }
                    return self.complete(handler);
                }
                Some(Err(err)) => {
                    body.cancel();
                    if err.is_cancelled() {
                        return self.cancelled(handler);
                    }
                    return self.fail(err, handler);
                }
            }
        }
    }

    fn prepare(&self, request: &ChatRequest) -> Result<TransportRequest> {
        json_request(self.config.url(), request, self.tokens.as_ref())
    }

    fn process_frame<H>(&mut self, frame: &str, handler: &mut H)
    where
        H: StreamHandler + ?Sized,
    {
        match parse_frame(frame) {
            Ok(ParsedFrame::Data(chunk)) => self.dispatcher.dispatch(chunk, handler, &self.cancel),
            Ok(ParsedFrame::NoOp) => {}
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed data line");
                handler.on_error(&err, err.severity());
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            !self.state.is_terminal(),
            "terminal state {:?} cannot transition to {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "session state changed");
        self.state = next;
    }

    fn complete<H>(&mut self, handler: &mut H) -> SessionState
    where
        H: StreamHandler + ?Sized,
    {
        self.transition(SessionState::Completed);
        tracing::info!(session_id = ?self.dispatcher.session_id(), "stream completed");
        handler.on_complete();
        self.state
    }

    fn cancelled<H>(&mut self, handler: &mut H) -> SessionState
    where
        H: StreamHandler + ?Sized,
    {
        self.frames = FrameBuffer::new();
        self.transition(SessionState::Cancelled);
        tracing::info!(session_id = ?self.dispatcher.session_id(), "stream cancelled");
        handler.on_error(&StreamError::Cancelled, Severity::Info);
        self.state
    }

    fn fail<H>(&mut self, err: StreamError, handler: &mut H) -> SessionState
    where
        H: StreamHandler + ?Sized,
    {
        // Partial text from a broken stream is never delivered
        self.frames = FrameBuffer::new();
        self.transition(SessionState::Failed);
        tracing::warn!(error = %err, "stream failed");
        handler.on_error(&err, err.severity());
        self.state
    }
}

/// JSON POST with the current bearer token, if any
fn json_request<T: Serialize>(
    url: String,
    body: &T,
    tokens: &dyn TokenProvider,
) -> Result<TransportRequest> {
    let body = serde_json::to_vec(body)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = tokens.token() {
        headers.insert(AUTHORIZATION, bearer_header(&token)?);
    }

    Ok(TransportRequest {
        url,
        headers,
        body: Bytes::from(body),
    })
}

/// Entry point for streaming chat sessions.
///
/// Cheap to clone; clones share the transport and token provider, and
/// sessions started from them run independently.
#[derive(Clone)]
pub struct StreamClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
}

impl StreamClient {
    /// Client over HTTP with the given token provider
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            tokens,
        })
    }

    /// Client over HTTP without authorization
    pub fn anonymous(config: ClientConfig) -> Result<Self> {
        Self::new(config, Arc::new(NoToken))
    }

    /// Client over a custom transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            tokens,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fresh controller bound to this client's configuration and tokens
    pub fn session(&self, cancel: CancelHandle) -> SessionController {
        SessionController::new(self.config.clone(), self.tokens.clone(), cancel)
    }

    /// Run one session on the current task
    pub async fn run<H>(
        &self,
        request: &ChatRequest,
        handler: &mut H,
        cancel: &CancelHandle,
    ) -> SessionState
    where
        H: StreamHandler + ?Sized,
    {
        let mut session = self.session(cancel.clone());
        session.run(self.transport.as_ref(), request, handler).await
    }

    /// Run one session on a spawned task.
    ///
    /// Dropping the returned handle cancels the session, as dropping the
    /// event stream of [`stream`](Self::stream) does. Use
    /// [`StreamHandle::detach`] to let it run on its own.
    pub fn spawn<H>(&self, request: ChatRequest, mut handler: H) -> StreamHandle<H>
    where
        H: StreamHandler + 'static,
    {
        let cancel = CancelHandle::new();
        let client = self.clone();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let state = client.run(&request, &mut handler, &task_cancel).await;
            (state, handler)
        });

        StreamHandle {
            guard: Some(cancel.drop_guard()),
            cancel,
            task,
        }
    }

    /// Ask the backend to stop generating for `session_id`.
    ///
    /// This only notifies the server; it does not touch any local session.
    /// Cancel the local session first and treat this call as best effort.
    /// Returns `Ok(())` without sending anything when the stop endpoint is
    /// disabled.
    pub async fn stop(&self, session_id: &str) -> Result<()> {
        let Some(url) = self.config.stop_url() else {
            tracing::debug!("stop endpoint disabled, skipping stop notification");
            return Ok(());
        };

        let request = json_request(url, &StopRequest::new(session_id), self.tokens.as_ref())?;
        self.transport.notify(request).await?;
        tracing::info!(session_id, "backend asked to stop generating");
        Ok(())
    }

    /// Run one session and expose it as a stream of events.
    ///
    /// The stream ends after the terminal event. Dropping it cancels the
    /// session.
    pub fn stream(
        &self,
        request: ChatRequest,
    ) -> (CancelHandle, Pin<Box<dyn Stream<Item = StreamEvent> + Send>>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancelHandle::new();
        let client = self.clone();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut tx = tx;
            client.run(&request, &mut tx, &task_cancel).await
        });

        let guard = cancel.drop_guard();
        let events = async_stream::stream! {
            let _guard = guard;
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };

        (cancel, Box::pin(events))
    }

    /// Run one session to the end and return everything it produced
    pub async fn collect(&self, request: &ChatRequest) -> CollectedResponse {
        let mut collector = ResponseCollector::new();
        self.run(request, &mut collector, &CancelHandle::new()).await;
        collector.into_response()
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.config.url())
            .finish_non_exhaustive()
    }
}

/// Spawned session returned by [`StreamClient::spawn`]. Cancels the session
/// when dropped unless detached.
#[derive(Debug)]
pub struct StreamHandle<H> {
    cancel: CancelHandle,
    task: JoinHandle<(SessionState, H)>,
    guard: Option<DropGuard>,
}

impl<H> StreamHandle<H> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Keep the session running after the handle is dropped
    pub fn detach(mut self) -> JoinHandle<(SessionState, H)> {
        if let Some(guard) = self.guard.take() {
            guard.disarm();
        }
        self.task
    }

    /// Wait for the terminal state and take the handler back
    pub async fn join(self) -> Result<(SessionState, H)> {
        self.task
            .await
            .map_err(|e| StreamError::Task(e.to_string()))
    }
}
