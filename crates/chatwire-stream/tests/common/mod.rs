//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chatwire_stream::{
    ChunkStream, ClientConfig, NoToken, Result, Severity, StreamClient, StreamError,
    StreamEvent, StreamHandler, TokenProvider, Transport, TransportRequest,
};
use tokio::sync::mpsc;

/// One scripted transport step
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(Vec<u8>),
    Fail(String),
}

/// What the transport observed
#[derive(Debug, Default)]
pub struct TransportLog {
    pub opened: AtomicUsize,
    pub cancelled: AtomicBool,
    pub dropped: AtomicBool,
    pub requests: Mutex<Vec<TransportRequest>>,
    pub notifications: Mutex<Vec<TransportRequest>>,
}

impl TransportLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The chunk stream was cancelled or dropped
    pub fn released(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.dropped.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn notifications(&self) -> Vec<TransportRequest> {
        self.notifications.lock().unwrap().clone()
    }
}

/// In-memory transport driven by a channel of [`Step`]s.
///
/// The body ends when the sending side is dropped.
pub struct ScriptedTransport {
    steps: Mutex<Option<mpsc::UnboundedReceiver<Step>>>,
    open_error: Mutex<Option<StreamError>>,
    hang_on_open: bool,
    pub log: Arc<TransportLog>,
}

impl ScriptedTransport {
    fn with_receiver(rx: mpsc::UnboundedReceiver<Step>) -> Self {
        Self {
            steps: Mutex::new(Some(rx)),
            open_error: Mutex::new(None),
            hang_on_open: false,
            log: Arc::new(TransportLog::default()),
        }
    }

    /// Body made of the given chunks, then end of stream
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self::from_steps(
            chunks
                .into_iter()
                .map(|chunk| Step::Chunk(chunk.as_ref().to_vec())),
        )
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for step in steps {
            tx.send(step).unwrap();
        }
        Self::with_receiver(rx)
    }

    /// Body fed by the test through the returned sender
    pub fn live() -> (Self, mpsc::UnboundedSender<Step>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_receiver(rx), tx)
    }

    /// `open` fails with the given error
    pub fn failing(err: StreamError) -> Self {
        let transport = Self::from_steps(Vec::new());
        *transport.open_error.lock().unwrap() = Some(err);
        transport
    }

    /// `open` never resolves
    pub fn hanging() -> Self {
        let mut transport = Self::from_steps(Vec::new());
        transport.hang_on_open = true;
        transport
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: TransportRequest) -> Result<Box<dyn ChunkStream>> {
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        self.log.requests.lock().unwrap().push(request);

        if self.hang_on_open {
            std::future::pending::<()>().await;
        }

        if let Some(err) = self.open_error.lock().unwrap().take() {
            return Err(err);
        }

        let steps = self
            .steps
            .lock()
            .unwrap()
            .take()
            .expect("scripted transport opened twice");

        Ok(Box::new(ScriptedChunks {
            steps,
            log: self.log.clone(),
        }))
    }

    async fn notify(&self, request: TransportRequest) -> Result<()> {
        self.log.notifications.lock().unwrap().push(request);
        Ok(())
    }
}

struct ScriptedChunks {
    steps: mpsc::UnboundedReceiver<Step>,
    log: Arc<TransportLog>,
}

#[async_trait]
impl ChunkStream for ScriptedChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.steps.recv().await {
            Some(Step::Chunk(bytes)) => Ok(Some(Bytes::from(bytes))),
            Some(Step::Fail(message)) => Err(StreamError::Transport(message)),
            None => Ok(None),
        }
    }

    fn cancel(&mut self) {
        self.log.cancelled.store(true, Ordering::SeqCst);
        self.steps.close();
    }
}

impl Drop for ScriptedChunks {
    fn drop(&mut self) {
        self.log.dropped.store(true, Ordering::SeqCst);
    }
}

/// Handler that records every callback as a [`StreamEvent`]
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<StreamEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<&StreamEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, StreamEvent::Error { .. }))
            .collect()
    }

    pub fn count_done(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, StreamEvent::Done))
            .count()
    }
}

impl StreamHandler for Recorder {
    fn on_start(&mut self) {
        self.events.push(StreamEvent::Start);
    }

    fn on_thinking(&mut self, text: &str) {
        self.events.push(StreamEvent::Thinking {
            content: text.to_string(),
        });
    }

    fn on_data(&mut self, text: &str) {
        self.events.push(StreamEvent::Message {
            content: text.to_string(),
        });
    }

    fn on_session_id(&mut self, id: &str) {
        self.events.push(StreamEvent::SessionId { id: id.to_string() });
    }

    fn on_complete(&mut self) {
        self.events.push(StreamEvent::Done);
    }

    fn on_error(&mut self, error: &StreamError, severity: Severity) {
        self.events.push(StreamEvent::Error {
            message: error.to_string(),
            severity,
            recoverable: error.is_recoverable(),
        });
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::new("http://localhost:3000")
}

pub fn client(transport: ScriptedTransport) -> (StreamClient, Arc<TransportLog>) {
    client_with_tokens(transport, Arc::new(NoToken))
}

pub fn client_with_tokens(
    transport: ScriptedTransport,
    tokens: Arc<dyn TokenProvider>,
) -> (StreamClient, Arc<TransportLog>) {
    let log = transport.log.clone();
    let client = StreamClient::with_transport(config(), Arc::new(transport), tokens)
        .expect("valid test config");
    (client, log)
}

pub fn message(content: &str) -> StreamEvent {
    StreamEvent::Message {
        content: content.to_string(),
    }
}

pub fn thinking(content: &str) -> StreamEvent {
    StreamEvent::Thinking {
        content: content.to_string(),
    }
}

pub fn session_id(id: &str) -> StreamEvent {
    StreamEvent::SessionId { id: id.to_string() }
}

pub fn cancelled() -> StreamEvent {
    StreamEvent::Error {
        message: chatwire_stream::CANCELLED_MESSAGE.to_string(),
        severity: Severity::Info,
        recoverable: false,
    }
}
