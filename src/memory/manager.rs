use crate::llm::LLMClient;
use crate::memory::MemoryStore;
use crate::types::{AppError, Result, UserMemory};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_CAPTURE_INSTRUCTIONS: &str = "\
Memories should capture details that personalize future conversations, such as:
  - personal information: name, age, occupation, location, interests, preferences
  - significant life events or experiences the user shares
  - things the user likes or dislikes, their opinions, beliefs and values
  - any other detail that gives useful insight into the user's needs";

/// One change requested by the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MemoryOperation {
    Add {
        memory: String,
        #[serde(default)]
        topics: Vec<String>,
    },
    Update {
        memory_id: String,
        memory: String,
        #[serde(default)]
        topics: Vec<String>,
    },
    Delete {
        memory_id: String,
    },
    Clear,
}

#[derive(Deserialize)]
struct OperationList {
    #[serde(default)]
    operations: Vec<MemoryOperation>,
}

/// Decides, with the help of the model, how a user's memories should change
/// after a conversation turn.
pub struct MemoryManager {
    llm: Arc<dyn LLMClient>,
    capture_instructions: Option<String>,
    additional_instructions: Option<String>,
    enable_delete: bool,
    enable_clear: bool,
}

impl MemoryManager {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            llm,
            capture_instructions: None,
            additional_instructions: None,
            enable_delete: true,
            enable_clear: true,
        }
    }

    pub fn with_capture_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.capture_instructions = Some(instructions.into());
        self
    }

    pub fn with_additional_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
    }

    pub fn with_delete(mut self, enabled: bool) -> Self {
        self.enable_delete = enabled;
        self
    }

    pub fn with_clear(mut self, enabled: bool) -> Self {
        self.enable_clear = enabled;
        self
    }

    /// System prompt listing the capture rules and the existing memories.
    pub fn system_prompt(&self, existing: &[UserMemory]) -> String {
        let capture = self
            .capture_instructions
            .as_deref()
            .unwrap_or(DEFAULT_CAPTURE_INSTRUCTIONS);

        let mut lines = vec![
            "You are a memory manager responsible for keeping key information about the user. \
             You get the capture criteria in <memories_to_capture> and the current memories in \
             <existing_memories>."
                .to_string(),
            String::new(),
            "## When to change memories".to_string(),
            "- Only capture information that matches <memories_to_capture> and is not already \
             in <existing_memories>."
                .to_string(),
            "- Memories are short third-person statements, e.g. `User's name is Alice`."
                .to_string(),
            "- Do not repeat the same fact in several memories; update the existing one instead."
                .to_string(),
            "- When a preference changes, update the memory and keep what it changed from."
                .to_string(),
            String::new(),
            "<memories_to_capture>".to_string(),
            capture.to_string(),
            "</memories_to_capture>".to_string(),
            String::new(),
            "## Allowed operations".to_string(),
            "  1. Make no change.".to_string(),
            "  2. `add` a memory: {\"op\": \"add\", \"memory\": \"...\", \"topics\": [\"...\"]}"
                .to_string(),
            "  3. `update` a memory: {\"op\": \"update\", \"memory_id\": \"...\", \"memory\": \
             \"...\", \"topics\": [\"...\"]}"
                .to_string(),
        ];
        if self.enable_delete {
            lines.push(
                "  4. `delete` a memory: {\"op\": \"delete\", \"memory_id\": \"...\"}".to_string(),
            );
        }
        if self.enable_clear {
            lines.push("  5. `clear` all memories: {\"op\": \"clear\"}".to_string());
        }
        lines.push(
            "Reply with JSON only, in the form {\"operations\": [...]}. An empty list means no change."
                .to_string(),
        );

        if !existing.is_empty() {
            lines.push("\n<existing_memories>".to_string());
            for memory in existing {
                lines.push(format!(
                    "ID: {}",
                    memory.memory_id.as_deref().unwrap_or_default()
                ));
                lines.push(format!("Memory: {}", memory.memory));
                lines.push(String::new());
            }
            lines.push("</existing_memories>".to_string());
        }

        if let Some(extra) = &self.additional_instructions {
            lines.push(extra.clone());
        }

        lines.join("\n")
    }

    /// Ask the model for operations without applying them.
    pub async fn plan(
        &self,
        existing: &[UserMemory],
        messages: &[String],
    ) -> Result<Vec<MemoryOperation>> {
        let system = self.system_prompt(existing);
        let reply = self
            .llm
            .generate_with_system(&system, &messages.join("\n"))
            .await?;
        let mut operations = parse_operations(&reply)?;
        operations.retain(|op| match op {
            MemoryOperation::Delete { .. } => self.enable_delete,
            MemoryOperation::Clear => self.enable_clear,
            _ => true,
        });
        Ok(operations)
    }

    /// Plan and apply memory changes for `user_id`. Returns the number of
    /// operations applied.
    pub async fn update_memories(
        &self,
        store: &dyn MemoryStore,
        user_id: Option<&str>,
        messages: &[String],
    ) -> Result<usize> {
        if messages.iter().all(|m| m.trim().is_empty()) {
            return Ok(0);
        }

        let existing = store.get_user_memories(user_id).await?;
        let operations = self.plan(&existing, messages).await?;
        let input = messages.join("\n");

        for op in &operations {
            match op {
                MemoryOperation::Add { memory, topics } => {
                    let mut record = UserMemory::new(memory.clone(), topics.clone());
                    record.input = Some(input.clone());
                    store.add_user_memory(user_id, record).await?;
                }
                MemoryOperation::Update {
                    memory_id,
                    memory,
                    topics,
                } => {
                    let mut record = UserMemory::new(memory.clone(), topics.clone());
                    record.input = Some(input.clone());
                    store.update_user_memory(user_id, memory_id, record).await?;
                }
                MemoryOperation::Delete { memory_id } => {
                    store.delete_user_memory(user_id, memory_id).await?;
                }
                MemoryOperation::Clear => store.clear_user_memories(user_id).await?,
            }
        }

        tracing::debug!(applied = operations.len(), "memory update finished");
        Ok(operations.len())
    }
}

/// Parse the model's reply, tolerating code fences and surrounding prose.
pub fn parse_operations(reply: &str) -> Result<Vec<MemoryOperation>> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => return Ok(Vec::new()),
    };

    serde_json::from_str::<OperationList>(json)
        .map(|list| list.operations)
        .map_err(|e| AppError::Memory(format!("Invalid memory operations: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TextStream;
    use crate::memory::InMemoryMemoryStore;
    use async_trait::async_trait;

    struct ScriptedLLM {
        reply: String,
    }

    #[async_trait]
    impl LLMClient for ScriptedLLM {
        async fn generate_with_history(&self, _messages: &[(String, String)]) -> Result<String> {
            Ok(self.reply.clone())
        }

        async fn stream_with_history(&self, _messages: &[(String, String)]) -> Result<TextStream> {
            Ok(Box::new(futures::stream::empty()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn manager(reply: &str) -> MemoryManager {
        MemoryManager::new(Arc::new(ScriptedLLM {
            reply: reply.to_string(),
        }))
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"operations\": [{\"op\": \"add\", \"memory\": \"User is Bob\", \"topics\": [\"name\"]}]}\n```";
        let ops = parse_operations(reply).unwrap();
        assert_eq!(
            ops,
            vec![MemoryOperation::Add {
                memory: "User is Bob".into(),
                topics: vec!["name".into()]
            }]
        );
    }

    #[test]
    fn test_parse_prose_is_no_change() {
        assert!(parse_operations("Nothing worth remembering.").unwrap().is_empty());
    }

    #[test]
    fn test_system_prompt_lists_existing() {
        let mut memory = UserMemory::new("User likes tea", vec![]);
        memory.memory_id = Some("m-1".into());
        let prompt = manager("").with_clear(false).system_prompt(&[memory]);

        assert!(prompt.contains("ID: m-1"));
        assert!(prompt.contains("Memory: User likes tea"));
        assert!(!prompt.contains("`clear`"));
    }

    #[tokio::test]
    async fn test_update_applies_operations() {
        let store = InMemoryMemoryStore::new();
        let reply = r#"{"operations": [{"op": "add", "memory": "User lives in Oslo", "topics": ["location"]}]}"#;

        let applied = manager(reply)
            .update_memories(&store, Some("u1"), &["I live in Oslo".to_string()])
            .await
            .unwrap();

        assert_eq!(applied, 1);
        let memories = store.get_user_memories(Some("u1")).await.unwrap();
        assert_eq!(memories[0].memory, "User lives in Oslo");
        assert_eq!(memories[0].input.as_deref(), Some("I live in Oslo"));
    }

    #[tokio::test]
    async fn test_disabled_clear_is_dropped() {
        let store = InMemoryMemoryStore::new();
        store
            .add_user_memory(None, UserMemory::new("keep me", vec![]))
            .await
            .unwrap();

        let applied = manager(r#"{"operations": [{"op": "clear"}]}"#)
            .with_clear(false)
            .update_memories(&store, None, &["forget everything".to_string()])
            .await
            .unwrap();

        assert_eq!(applied, 0);
        assert_eq!(store.get_user_memories(None).await.unwrap().len(), 1);
    }
}
