//! LLM Provider Clients and Abstractions
//!
//! - [`LLMClient`] - The trait agents and the memory manager call into
//! - [`OpenAIClient`] - OpenAI-compatible HTTP implementation (feature `openai`)
//!
//! # Example
//!
//! ```ignore
//! use mindmatrix::llm::{LLMClient, OpenAIClient};
//!
//! let api_base = "https://api.openai.com/v1".to_string();
//! let client = OpenAIClient::new(api_key, api_base, "gpt-4o-mini".into());
//! let answer = client.generate_with_system("Answer tersely.", "What is 2+2?").await?;
//! ```

/// Core LLM client trait and streaming response types.
pub mod client;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, TextStream};

#[cfg(feature = "openai")]
pub use openai::OpenAIClient;
