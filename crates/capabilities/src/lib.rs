//! Declared side-capability allow-list.
//!
//! Core principle: **what the agent may reach for is declared up front.**

mod capability;
mod error;

pub use capability::{Capability, CapabilitySet};
pub use error::{Error, Result};
