//! Agent runtime — model backend and tool-calling runner.
//!
//! The runtime composes the three external pieces into one callable:
//!
//! - **LlmBackend**: a trait over model providers, with a Hugging Face
//!   Inference API implementation.
//! - **Runner**: holds the tool descriptors listed from the remote source,
//!   drives the model, and executes tool directives through a
//!   [`ToolInvoker`].
//! - **ToolInvoker**: the seam back to the connector's connection (or a
//!   scripted double in tests).
//!
//! # Example
//!
//! ```ignore
//! use capabilities::CapabilitySet;
//! use runtime::{InferenceBackend, Runner};
//!
//! # async fn example(conn: connector::Connection<connector::SseTransport>) -> runtime::Result<()> {
//! let backend = InferenceBackend::from_env()?;
//! let tools = conn.list_tools().await?;
//!
//! let mut runner = Runner::build(tools, backend, &CapabilitySet::default());
//! let answer = runner.respond(&conn, "Analyze the sentiment of 'This is awesome'").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod runner;

pub use backend::{
    ChatRequest, ChatResponse, DEFAULT_MODEL, InferenceBackend, InferenceBackendBuilder,
    LlmBackend, Message, Role, TOKEN_ENV_VAR,
};
pub use error::{Error, Result};
pub use runner::{Runner, ToolInvoker};
