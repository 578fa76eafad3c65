//! Shared domain types for the adjutant workspace: conversation messages,
//! tool calls and outcomes, integration providers, token usage, config, and
//! the common error type.

pub mod capability;
pub mod config;
pub mod error;
pub mod tool;
pub mod usage;

pub use error::{Error, Result};
