//! Completion-service clients.
//!
//! The gateway talks to the external model service through the
//! [`CompletionProvider`] trait; the only concrete adapter is the Anthropic
//! Messages API. The client is constructed once at bootstrap and injected
//! everywhere as `Arc<dyn CompletionProvider>`.

pub mod anthropic;
pub mod traits;
pub(crate) mod util;

pub use anthropic::AnthropicProvider;
pub use traits::{CompletionProvider, CompletionRequest, CompletionResponse};
