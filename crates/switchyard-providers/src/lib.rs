//! Provider clients for Switchyard.
//!
//! This crate provides concrete implementations of the `ProviderClient` trait.
//!
//! # Supported Providers
//!
//! - **OpenAI** and **Groq**: OpenAI chat completions protocol (API key required)
//! - **Anthropic**: messages API (API key required)
//! - **Gemini**: `generateContent` API (API key required)
//! - **Ollama**: local models via Ollama (no API key, local execution)
//! - **Mock**: deterministic echo for testing and dry runs

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use factory::{ProviderConfig, ProviderFactory, default_key_env};
pub use gemini::GeminiClient;
pub use mock::MockClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;
