//! User memory.
//!
//! - [`MemoryStore`] is the persistence seam; [`InMemoryMemoryStore`] keeps
//!   everything in process for development and tests.
//! - [`MemoryManager`] asks the model which memories to add, update or delete
//!   after each run.
//! - [`format_memory_for_prompt`] renders known memories into a system prompt.

pub mod manager;
pub mod store;

pub use manager::MemoryManager;
pub use store::InMemoryMemoryStore;

use crate::types::{Result, UserMemory};
use async_trait::async_trait;

/// User id used when the caller does not supply one.
pub const DEFAULT_USER_ID: &str = "default";

/// Maximum number of memories to include in a prompt to avoid token overflow.
pub const MAX_MEMORIES_IN_PROMPT: usize = 20;

/// Memory persistence backend.
///
/// A `None` user id addresses [`DEFAULT_USER_ID`].
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_user_memories(&self, user_id: Option<&str>) -> Result<Vec<UserMemory>>;

    /// Store a memory and return its id.
    async fn add_user_memory(&self, user_id: Option<&str>, memory: UserMemory) -> Result<String>;

    async fn update_user_memory(
        &self,
        user_id: Option<&str>,
        memory_id: &str,
        memory: UserMemory,
    ) -> Result<()>;

    /// Fails with `AppError::NotFound` when the id is unknown.
    async fn delete_user_memory(&self, user_id: Option<&str>, memory_id: &str) -> Result<()>;

    async fn clear_user_memories(&self, user_id: Option<&str>) -> Result<()>;
}

/// Formats user memories into a string suitable for inclusion in system prompts.
///
/// Returns an empty string when there is nothing to say.
pub fn format_memory_for_prompt(memories: &[UserMemory]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = memories
        .iter()
        .take(MAX_MEMORIES_IN_PROMPT)
        .map(|m| {
            if m.topics.is_empty() {
                format!("- {}", m.memory)
            } else {
                format!("- {} ({})", m.memory, m.topics.join(", "))
            }
        })
        .collect();

    format!("Known Facts about User:\n{}", lines.join("\n"))
}
