//! Connector error types.

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The remote endpoint is unreachable or rejected the transport.
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("timeout waiting for response")]
    Timeout,

    /// The remote returned a frame or payload we could not make sense of.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    /// The event stream ended while a response was still expected.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
