//! Connection lifecycle (open, list tools, call tools, close).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};
use crate::transport::{EndpointConfig, SseTransport, Transport, TransportKind};

/// Default timeout for a single request/response exchange.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// An open channel to the remote tool source.
///
/// The connection is owned by exactly one place for the whole process
/// lifetime. `close` takes it by value, so release happens at most once by
/// construction; a failed `open` never produces a value to release.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
    server_name: String,
    next_id: AtomicI64,
}

impl Connection<SseTransport> {
    /// Open a connection to the configured endpoint and complete the
    /// protocol handshake.
    pub async fn open(config: &EndpointConfig) -> Result<Self> {
        let transport = match config.transport {
            TransportKind::Sse => SseTransport::connect(config).await?,
        };
        Self::handshake(transport).await
    }
}

impl<T: Transport> Connection<T> {
    /// Run the initialize exchange over an established transport.
    pub async fn handshake(transport: T) -> Result<Self> {
        let conn = Self {
            transport,
            server_name: String::new(),
            next_id: AtomicI64::new(1),
        };

        let result: InitializeResult = conn
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        conn.notify("notifications/initialized", None::<()>).await?;

        tracing::debug!(server = %result.server_info.name, "tool source initialized");

        Ok(Self {
            server_name: result.server_info.name,
            ..conn
        })
    }

    /// Name the remote server reported during initialization.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// List the tools currently exposed by the remote.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        Ok(result.tools)
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Release the connection. Consumes the handle; a second release does
    /// not compile.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let request_json =
            serde_json::to_string(&request).map_err(|e| Error::Protocol(e.to_string()))?;
        self.transport.send(request_json).await?;

        let response = timeout(REQUEST_TIMEOUT, self.read_response())
            .await
            .map_err(|_| Error::Timeout)??;

        if response.id != id {
            return Err(Error::Protocol(format!(
                "response ID mismatch: expected {id:?}, got {:?}",
                response.id
            )));
        }

        let result_value = response.into_result()?;
        let result: R =
            serde_json::from_value(result_value).map_err(|e| Error::Protocol(e.to_string()))?;

        Ok(result)
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: serde::Serialize,
    {
        // Notifications have no ID
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.and_then(|p| serde_json::to_value(p).ok())
        });

        let notification_json =
            serde_json::to_string(&notification).map_err(|e| Error::Protocol(e.to_string()))?;
        self.transport.send(notification_json).await
    }

    /// Read the next response frame, skipping server-initiated
    /// notifications on the stream.
    async fn read_response(&self) -> Result<JsonRpcResponse> {
        loop {
            let frame = self.transport.recv().await?;

            let value: Value =
                serde_json::from_str(&frame).map_err(|e| Error::Protocol(e.to_string()))?;
            if value.get("method").is_some() {
                tracing::debug!("skipping server notification frame");
                continue;
            }

            return serde_json::from_value(value).map_err(|e| Error::Protocol(e.to_string()));
        }
    }
}
