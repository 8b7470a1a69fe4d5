//! Client for a remote MCP tool source reached over SSE.
//!
//! The connector owns the full connection lifecycle: open the transport,
//! handshake, list the exposed tool descriptors, forward tool calls, and
//! release the channel exactly once.
//!
//! # Example
//!
//! ```no_run
//! use connector::{Connection, EndpointConfig, TransportKind};
//!
//! # async fn example() -> connector::Result<()> {
//! let config = EndpointConfig {
//!     url: "https://example.test/gradio_api/mcp/sse".to_string(),
//!     transport: TransportKind::Sse,
//! };
//!
//! let conn = Connection::open(&config).await?;
//! for tool in conn.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! // `close` consumes the handle; it cannot be released twice.
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod protocol;
mod transport;

pub use connection::{Connection, REQUEST_TIMEOUT};
pub use error::{Error, Result};
pub use protocol::{
    CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, Tool, ToolContent,
};
pub use transport::{EndpointConfig, SseTransport, Transport, TransportKind};
