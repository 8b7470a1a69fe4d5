//! Transports for reaching the remote tool source.
//!
//! The only wire transport is SSE (server-sent events): a long-lived GET
//! stream carries server-to-client frames, and a per-session POST endpoint
//! announced on that stream carries client-to-server messages.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

use crate::error::{Error, Result};

/// How long to wait for the server to announce its message endpoint.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted frame size (1MB).
/// Sized for large tool outputs.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Wire transport kind for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Sse,
}

impl Default for TransportKind {
    fn default() -> Self {
        Self::Sse
    }
}

/// Configuration for a remote tool source endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// URL of the SSE stream, e.g. `https://host/gradio_api/mcp/sse`.
    pub url: String,
    #[serde(default)]
    pub transport: TransportKind,
}

/// A bidirectional message channel to the remote tool source.
///
/// One frame is one JSON-RPC message. `recv` only yields frames the server
/// addressed to us as messages; transport-level chatter is handled inside
/// the implementation.
pub trait Transport: Send + Sync {
    /// Send one message to the remote.
    fn send(&self, payload: String) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next message frame from the remote.
    fn recv(&self) -> impl Future<Output = Result<String>> + Send;

    /// Tear down the channel.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// SSE transport: GET stream in, POST messages out.
pub struct SseTransport {
    http: reqwest::Client,
    message_url: Url,
    incoming: Mutex<mpsc::Receiver<String>>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Connect to the remote endpoint and complete the SSE handshake.
    ///
    /// The server's first meaningful frame is an `endpoint` event naming
    /// the URL that accepts our POSTed messages; nothing can be sent until
    /// it arrives.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let base = Url::parse(&config.url).map_err(|e| Error::Connect(e.to_string()))?;

        let http = reqwest::Client::new();
        let mut stream =
            EventSource::new(http.get(base.clone())).map_err(|e| Error::Connect(e.to_string()))?;

        let message_url = timeout(CONNECT_TIMEOUT, wait_for_endpoint(&mut stream, &base))
            .await
            .map_err(|_| Error::Timeout)??;

        tracing::debug!(%message_url, "sse transport connected");

        let (tx, rx) = mpsc::channel(32);
        let reader = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) if msg.event == "message" => {
                        if msg.data.len() > MAX_FRAME_SIZE {
                            tracing::warn!(size = msg.data.len(), "dropping oversized frame");
                            break;
                        }
                        if tx.send(msg.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(Event::Message(msg)) => {
                        tracing::debug!(event = %msg.event, "ignoring stream event");
                    }
                    Err(e) => {
                        tracing::debug!("event stream ended: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            http,
            message_url,
            incoming: Mutex::new(rx),
            reader,
        })
    }
}

/// Read stream events until the server announces its message endpoint.
async fn wait_for_endpoint(stream: &mut EventSource, base: &Url) -> Result<Url> {
    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(msg)) if msg.event == "endpoint" => {
                return resolve_endpoint(base, msg.data.trim());
            }
            Ok(Event::Message(msg)) => {
                tracing::debug!(event = %msg.event, "ignoring pre-handshake event");
            }
            Err(e) => return Err(Error::Connect(e.to_string())),
        }
    }
    Err(Error::Connect(
        "stream closed before endpoint announcement".into(),
    ))
}

/// Resolve the endpoint event data (absolute URL or path) against the base.
fn resolve_endpoint(base: &Url, data: &str) -> Result<Url> {
    Url::parse(data)
        .or_else(|_| base.join(data))
        .map_err(|e| Error::Protocol(format!("bad endpoint announcement {data:?}: {e}")))
}

impl Transport for SseTransport {
    async fn send(&self, payload: String) -> Result<()> {
        let response = self
            .http
            .post(self.message_url.clone())
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Connect(format!("message rejected: {status}: {body}")));
        }

        Ok(())
    }

    async fn recv(&self) -> Result<String> {
        self.incoming.lock().await.recv().await.ok_or(Error::Closed)
    }

    async fn close(self) -> Result<()> {
        // Drop is the actual teardown; an explicit close just makes the
        // intent visible at the call site.
        drop(self);
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_absolute_endpoint() {
        let base = Url::parse("https://example.test/gradio_api/mcp/sse").unwrap();
        let url = resolve_endpoint(&base, "https://example.test/gradio_api/mcp/messages/abc")
            .unwrap();
        assert_eq!(url.path(), "/gradio_api/mcp/messages/abc");
    }

    #[test]
    fn resolve_relative_endpoint() {
        let base = Url::parse("https://example.test/gradio_api/mcp/sse").unwrap();
        let url = resolve_endpoint(&base, "/gradio_api/mcp/messages?session_id=abc").unwrap();
        assert_eq!(url.host_str(), Some("example.test"));
        assert_eq!(url.query(), Some("session_id=abc"));
    }

    #[test]
    fn transport_kind_from_config() {
        let config: EndpointConfig =
            toml::from_str(r#"url = "https://example.test/sse""#).unwrap();
        assert_eq!(config.transport, TransportKind::Sse);

        let err = toml::from_str::<EndpointConfig>(
            r#"
            url = "https://example.test/sse"
            transport = "websocket"
            "#,
        );
        assert!(err.is_err());
    }
}
