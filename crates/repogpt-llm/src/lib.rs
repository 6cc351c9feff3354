//! Completion, streamed completion, and embedding providers.

pub mod any;
pub mod error;
pub mod gemini;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;
pub mod stream;
pub mod workers_ai;

pub use error::LlmError;
pub use provider::{ChatStream, LlmProvider, Message, Role};
