use crate::memory::{MemoryStore, DEFAULT_USER_ID};
use crate::types::{AppError, Result, UserMemory};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local memory store.
///
/// Memories tagged with any of `exclude_topics` are kept but never returned
/// from [`MemoryStore::get_user_memories`].
#[derive(Default)]
pub struct InMemoryMemoryStore {
    memories: RwLock<HashMap<String, Vec<UserMemory>>>,
    exclude_topics: Vec<String>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclude_topics(mut self, topics: Vec<String>) -> Self {
        self.exclude_topics = topics;
        self
    }

    fn is_excluded(&self, memory: &UserMemory) -> bool {
        memory
            .topics
            .iter()
            .any(|topic| self.exclude_topics.contains(topic))
    }
}

fn user_key(user_id: Option<&str>) -> String {
    user_id.unwrap_or(DEFAULT_USER_ID).to_string()
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn get_user_memories(&self, user_id: Option<&str>) -> Result<Vec<UserMemory>> {
        let memories = self.memories.read();
        Ok(memories
            .get(&user_key(user_id))
            .map(|list| {
                list.iter()
                    .filter(|m| !self.is_excluded(m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add_user_memory(
        &self,
        user_id: Option<&str>,
        mut memory: UserMemory,
    ) -> Result<String> {
        let memory_id = memory
            .memory_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        memory.memory_id = Some(memory_id.clone());
        memory.last_updated = Some(Utc::now());

        self.memories
            .write()
            .entry(user_key(user_id))
            .or_default()
            .push(memory);
        Ok(memory_id)
    }

    async fn update_user_memory(
        &self,
        user_id: Option<&str>,
        memory_id: &str,
        mut memory: UserMemory,
    ) -> Result<()> {
        let mut memories = self.memories.write();
        let slot = memories
            .get_mut(&user_key(user_id))
            .and_then(|list| {
                list.iter_mut()
                    .find(|m| m.memory_id.as_deref() == Some(memory_id))
            })
            .ok_or_else(|| AppError::NotFound(format!("Memory '{}' not found", memory_id)))?;

        memory.memory_id = Some(memory_id.to_string());
        memory.last_updated = Some(Utc::now());
        *slot = memory;
        Ok(())
    }

    async fn delete_user_memory(&self, user_id: Option<&str>, memory_id: &str) -> Result<()> {
        let mut memories = self.memories.write();
        let list = memories
            .get_mut(&user_key(user_id))
            .ok_or_else(|| AppError::NotFound(format!("Memory '{}' not found", memory_id)))?;

        let before = list.len();
        list.retain(|m| m.memory_id.as_deref() != Some(memory_id));
        if list.len() == before {
            return Err(AppError::NotFound(format!(
                "Memory '{}' not found",
                memory_id
            )));
        }
        Ok(())
    }

    async fn clear_user_memories(&self, user_id: Option<&str>) -> Result<()> {
        self.memories.write().remove(&user_key(user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_user_is_default() {
        let store = InMemoryMemoryStore::new();
        store
            .add_user_memory(None, UserMemory::new("likes tea", vec![]))
            .await
            .unwrap();

        let memories = store.get_user_memories(Some(DEFAULT_USER_ID)).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert!(memories[0].memory_id.is_some());
        assert!(memories[0].last_updated.is_some());
    }

    #[tokio::test]
    async fn test_excluded_topics_are_hidden() {
        let store = InMemoryMemoryStore::new().with_exclude_topics(vec!["health".into()]);
        store
            .add_user_memory(Some("u1"), UserMemory::new("has asthma", vec!["health".into()]))
            .await
            .unwrap();
        store
            .add_user_memory(Some("u1"), UserMemory::new("lives in Paris", vec!["location".into()]))
            .await
            .unwrap();

        let memories = store.get_user_memories(Some("u1")).await.unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].memory, "lives in Paris");
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = InMemoryMemoryStore::new();
        let id = store
            .add_user_memory(Some("u1"), UserMemory::new("likes tea", vec![]))
            .await
            .unwrap();

        assert!(matches!(
            store.delete_user_memory(Some("u1"), "nope").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_user_memory(Some("u2"), &id).await,
            Err(AppError::NotFound(_))
        ));
        store.delete_user_memory(Some("u1"), &id).await.unwrap();
        assert!(store.get_user_memories(Some("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let store = InMemoryMemoryStore::new();
        let id = store
            .add_user_memory(None, UserMemory::new("likes tea", vec![]))
            .await
            .unwrap();
        store
            .update_user_memory(None, &id, UserMemory::new("likes green tea", vec!["food".into()]))
            .await
            .unwrap();

        let memories = store.get_user_memories(None).await.unwrap();
        assert_eq!(memories[0].memory, "likes green tea");
        assert_eq!(memories[0].memory_id.as_deref(), Some(id.as_str()));
    }
}
