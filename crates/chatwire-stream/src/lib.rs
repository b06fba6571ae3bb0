//! # chatwire-stream
//!
//! Client-side demultiplexer for streamed chat answers.
//!
//! A chat backend answers with a chunked, line-oriented body where every
//! meaningful line looks like `data: {"sessionId":"…","type":"thinking","content":"…"}`.
//! The transport may cut that body anywhere: inside a line, inside the JSON,
//! or inside a multi-byte character. This crate reassembles the lines, decodes
//! each payload and dispatches typed callbacks (`on_thinking`, `on_data`,
//! `on_session_id`, …) in order, with exactly one terminal notification per
//! session and cooperative cancellation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwire_stream::{ChatRequest, ClientConfig, ResponseCollector, StreamClient, CancelHandle};
//!
//! # async fn demo() -> chatwire_stream::Result<()> {
//! let client = StreamClient::anonymous(ClientConfig::new("http://localhost:3000"))?;
//!
//! let mut collector = ResponseCollector::new();
//! let cancel = CancelHandle::new();
//! client.run(&ChatRequest::prompt("Hello!"), &mut collector, &cancel).await;
//!
//! let response = collector.into_response();
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Event stream
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use chatwire_stream::{ChatRequest, StreamEvent, StreamClient};
//!
//! # async fn demo(client: StreamClient) {
//! let (cancel, mut events) = client.stream(ChatRequest::prompt("Write a poem"));
//! while let Some(event) = events.next().await {
//!     match event {
//!         StreamEvent::Message { content } => print!("{}", content),
//!         StreamEvent::Thinking { .. } => {}
//!         other if other.is_terminal() => break,
//!         _ => {}
//!     }
//! }
//! # drop(cancel);
//! # }
//! ```

pub mod auth;
pub mod buffer_utils;
pub mod config;
mod error;
pub mod handler;
pub mod session;
pub mod streaming;
pub mod transport;
pub mod types;

pub use error::{Result, Severity, StreamError, CANCELLED_MESSAGE};

pub use auth::{NoToken, SharedToken, StaticToken, TokenProvider};
pub use buffer_utils::{parse_frame, FrameBuffer, ParsedFrame};
pub use config::ClientConfig;
pub use handler::{Callbacks, CollectedError, CollectedResponse, ResponseCollector, StreamHandler};
pub use session::{CancelHandle, SessionController, SessionState, StreamClient, StreamHandle};
pub use streaming::{ChatChunk, EventDispatcher, StreamEvent};
pub use transport::{ChunkStream, HttpTransport, Transport, TransportRequest, MAX_ERROR_BODY_BYTES};
pub use types::{ChatRequest, Message, StopRequest};
