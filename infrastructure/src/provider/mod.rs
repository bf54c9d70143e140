//! OpenAI-compatible chat completion adapters
//!
//! [`OpenAiInvoker`] implements the model-invocation port and
//! [`OpenAiAdvisor`] the advisory port. Both speak the
//! `/chat/completions` protocol, so any compatible server (vLLM, Ollama,
//! hosted APIs) can back either one.

mod advisor;
mod client;
mod invoker;
mod prompt;

pub use advisor::OpenAiAdvisor;
pub use client::{ChatClient, ChatError, CompletionParams, ProviderError};
pub use invoker::OpenAiInvoker;
pub use prompt::build_extraction_prompt;
