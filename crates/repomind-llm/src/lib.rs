//! LLM provider abstraction: chat completions and text embeddings.

pub mod any;
pub mod deadline;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use any::AnyProvider;
pub use deadline::with_deadline;
pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
