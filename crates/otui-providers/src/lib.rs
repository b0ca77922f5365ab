//! Provider adapters: one per backend (ollama, openrouter, openai,
//! anthropic) behind a single `ProviderAdapter` trait, plus the
//! leak-parsing and name-mangling helpers that keep the orchestrator
//! provider-agnostic.

pub mod anthropic;
pub mod anthropic_sse;
pub mod error;
pub mod http;
pub mod leak;
pub mod ollama;
pub mod ollama_prompt;
pub mod openai;
pub mod openrouter;
pub mod openrouter_names;
pub mod qwen;
pub mod sse;
pub mod tool_schema;
pub mod traits;
pub mod types;

pub use anthropic::AnthropicAdapter;
pub use error::{Error, Result};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use openrouter::OpenRouterAdapter;
pub use traits::{CHAT_STREAM_TIMEOUT, ChatStream, ProviderAdapter};
pub use types::{Message, ModelInfo, Role, StreamEvent, ToolCall, ToolSchema};
