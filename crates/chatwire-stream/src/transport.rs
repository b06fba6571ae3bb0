// Transport seam: opens the request and hands back raw body chunks

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Result, StreamError};

/// Most bytes of a rejected response's body kept in [`StreamError::Http`]
pub const MAX_ERROR_BODY_BYTES: usize = 4096;

/// How long a rejected response's body is read before giving up on the rest
const ERROR_BODY_TIMEOUT: Duration = Duration::from_secs(2);

/// Fully prepared request handed to a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Opens a streaming request.
///
/// A non-2xx response must be returned as [`StreamError::Http`] before any
/// body is read.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: TransportRequest) -> Result<Box<dyn ChunkStream>>;

    /// Send a one-shot request and discard the response body.
    ///
    /// Used for control calls such as stop notifications.
    async fn notify(&self, request: TransportRequest) -> Result<()>;
}

/// Readable body of an opened request
#[async_trait]
pub trait ChunkStream: Send {
    /// Next chunk, or `None` at end of stream
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Release the underlying connection. Must not wait for the peer.
    fn cancel(&mut self);
}

/// reqwest-backed transport (HTTP direct, POST with JSON body)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(user_agent) = &config.user_agent {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(user_agent)
                    .map_err(|e| StreamError::InvalidHeader(format!("Invalid user agent: {}", e)))?,
            );
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| StreamError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Use a preconfigured reqwest client as-is
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: TransportRequest) -> Result<Box<dyn ChunkStream>> {
        let response = self
            .http_client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = read_error_body(response).await;
            tracing::warn!(status, "stream request rejected");
            return Err(StreamError::Http { status, body });
        }

        Ok(Box::new(HttpChunkStream {
            body: Some(response.bytes_stream().boxed()),
        }))
    }

    async fn notify(&self, request: TransportRequest) -> Result<()> {
        let response = self
            .http_client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = read_error_body(response).await;
            tracing::warn!(status, url = %request.url, "notification rejected");
            return Err(StreamError::Http { status, body });
        }

        Ok(())
    }
}

/// Leading part of a rejected response's body: at most
/// [`MAX_ERROR_BODY_BYTES`], and only what arrives within a short deadline.
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();

    let read = async {
        while let Some(Ok(chunk)) = chunks.next().await {
            let room = MAX_ERROR_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= MAX_ERROR_BODY_BYTES {
                break;
            }
        }
    };
    if tokio::time::timeout(ERROR_BODY_TIMEOUT, read).await.is_err() {
        tracing::debug!("error body still streaming, keeping what arrived");
    }

    String::from_utf8_lossy(&body).into_owned()
}

/// Response body of an [`HttpTransport`] request. Dropping the inner stream
/// closes the connection.
struct HttpChunkStream {
    body: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(body) = self.body.as_mut() else {
            return Err(StreamError::Cancelled);
        };

        match body.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => {
                self.body = None;
                Err(StreamError::Transport(e.to_string()))
            }
            None => {
                self.body = None;
                Ok(None)
            }
        }
    }

    fn cancel(&mut self) {
        self.body = None;
    }
}
