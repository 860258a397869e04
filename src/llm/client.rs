//! LLM client abstraction.
//!
//! Model inference is an external collaborator. Agents talk to it through the
//! [`LLMClient`] trait; the only shipped implementation speaks the
//! OpenAI-compatible chat completion protocol (see [`super::openai`]).

use crate::types::Result;
use async_trait::async_trait;
use futures::Stream;

/// Boxed stream of text deltas.
pub type TextStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// Implementors provide the two history-based calls; the prompt-only and
/// system-prompt variants are derived from them.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with conversation history
    async fn generate_with_history(
        &self,
        messages: &[(String, String)], // (role, content) pairs
    ) -> Result<String>;

    /// Stream a completion for a conversation history
    async fn stream_with_history(&self, messages: &[(String, String)]) -> Result<TextStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_history(&[("user".to_string(), prompt.to_string())])
            .await
    }

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_history(&system_and_user(system, prompt))
            .await
    }

    /// Stream a completion
    async fn stream(&self, prompt: &str) -> Result<TextStream> {
        self.stream_with_history(&[("user".to_string(), prompt.to_string())])
            .await
    }

    /// Stream with system prompt
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        self.stream_with_history(&system_and_user(system, prompt))
            .await
    }
}

fn system_and_user(system: &str, prompt: &str) -> Vec<(String, String)> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(("system".to_string(), system.to_string()));
    }
    messages.push(("user".to_string(), prompt.to_string()));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parking_lot::Mutex;

    struct RecordingClient {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LLMClient for RecordingClient {
        async fn generate_with_history(&self, messages: &[(String, String)]) -> Result<String> {
            *self.seen.lock() = messages.to_vec();
            Ok(format!("{} messages", messages.len()))
        }

        async fn stream_with_history(&self, messages: &[(String, String)]) -> Result<TextStream> {
            *self.seen.lock() = messages.to_vec();
            Ok(Box::new(futures::stream::iter(vec![
                Ok("a".to_string()),
                Ok("b".to_string()),
            ])))
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_system_prompt_is_prepended() {
        let client = RecordingClient {
            seen: Mutex::new(Vec::new()),
        };
        let reply = client.generate_with_system("be brief", "hello").await.unwrap();

        assert_eq!(reply, "2 messages");
        let seen = client.seen.lock().clone();
        assert_eq!(seen[0], ("system".to_string(), "be brief".to_string()));
        assert_eq!(seen[1], ("user".to_string(), "hello".to_string()));
    }

    #[tokio::test]
    async fn test_empty_system_prompt_is_skipped() {
        let client = RecordingClient {
            seen: Mutex::new(Vec::new()),
        };
        let chunks: Vec<String> = client
            .stream_with_system("", "hello")
            .await
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert_eq!(chunks, vec!["a", "b"]);
        assert_eq!(client.seen.lock().len(), 1);
    }
}
