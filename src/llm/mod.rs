pub mod client;
pub mod prompts;
pub mod provider;
pub mod settings;

pub use client::LlmClient;
pub use prompts::{build_instructions, Transformation};
pub use provider::{ChatMessage, LlmProvider, OpenAICompatibleProvider};
pub use settings::{apply_llm_settings, resolve_llm_settings, LlmOverrides, LlmSettings};
