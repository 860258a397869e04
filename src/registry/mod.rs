//! Ordered name → binding tables.
//!
//! One [`Registry`] exists per [`Domain`]. Entries are appended in
//! registration order and looked up by a forward scan, so when the same name
//! is registered twice the first registration keeps answering lookups. The
//! duplicate is still recorded, with a warning.

use crate::agents::Agent;
use crate::mindmatrix::MindMatrix;
use crate::types::{AppError, Result};
use crate::workflows::Workflow;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Parameter name → value map handed to factories.
pub type FactoryConfig = Map<String, Value>;

/// Builds an agent from the orchestrator and the merged configuration.
pub type AgentFactory =
    Arc<dyn Fn(&MindMatrix, &FactoryConfig) -> Result<Arc<dyn Agent>> + Send + Sync>;

/// Builds a workflow from the orchestrator and the merged configuration.
pub type WorkflowFactory =
    Arc<dyn Fn(&MindMatrix, &FactoryConfig) -> Result<Arc<dyn Workflow>> + Send + Sync>;

/// The four kinds of registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Agent,
    Workflow,
    VectorDb,
    Task,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Agent => "agent",
            Domain::Workflow => "workflow",
            Domain::VectorDb => "vectordb",
            Domain::Task => "task",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{domain} '{name}' is not registered")]
    NotFound { domain: Domain, name: String },
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

/// A single registration record.
pub struct Registration<B> {
    pub name: String,
    pub binding: B,
    pub config: FactoryConfig,
}

/// Append-only table of registrations for one domain.
pub struct Registry<B> {
    domain: Domain,
    entries: Vec<Registration<B>>,
}

impl<B> Registry<B> {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            entries: Vec::new(),
        }
    }

    /// Append a registration. Duplicate names are kept but never matched.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        binding: B,
        config: Option<FactoryConfig>,
    ) {
        let name = name.into();
        if self.has(&name) {
            tracing::warn!(
                domain = %self.domain,
                name = %name,
                "duplicate registration; the earlier entry keeps precedence"
            );
        } else {
            tracing::debug!(domain = %self.domain, name = %name, "registered");
        }
        self.entries.push(Registration {
            name,
            binding,
            config: config.unwrap_or_default(),
        });
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// First registration with `name`.
    pub fn find(&self, name: &str) -> std::result::Result<&Registration<B>, RegistryError> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| RegistryError::NotFound {
                domain: self.domain,
                name: name.to_string(),
            })
    }

    /// Registered names in registration order, duplicates included.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge call-time overrides into a registered config. Overrides win.
pub fn merge_config(base: &FactoryConfig, overrides: &FactoryConfig) -> FactoryConfig {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::io;

    fn config(value: Value) -> FactoryConfig {
        value.as_object().cloned().unwrap()
    }

    /// Log sink for a test-local subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_first_registration_wins() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let mut registry: Registry<u32> = Registry::new(Domain::Task);
        tracing::subscriber::with_default(subscriber, || {
            registry.register("embed", 1, None);
            registry.register("chunk", 3, None);
            registry.register("embed", 2, None);
        });

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find("embed").unwrap().binding, 1);

        let output = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        assert_eq!(output.matches("duplicate registration").count(), 1);
        assert!(output.contains("WARN"));
        assert!(output.contains("embed"));
    }

    #[test]
    fn test_names_in_registration_order() {
        let mut registry: Registry<()> = Registry::new(Domain::Agent);
        for name in ["zeta", "alpha", "mid"] {
            registry.register(name, (), None);
        }
        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_name_is_not_found() {
        let registry: Registry<()> = Registry::new(Domain::VectorDb);
        let err = registry.find("milvus").err().unwrap();
        assert_eq!(err.to_string(), "vectordb 'milvus' is not registered");
        assert!(matches!(AppError::from(err), AppError::NotFound(_)));
        assert!(!registry.has("milvus"));
    }

    #[test]
    fn test_override_wins_on_collision() {
        let base = config(json!({"model": "a", "temperature": 0.1}));
        let overrides = config(json!({"model": "b", "session_id": "s"}));

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged["model"], "b");
        assert_eq!(merged["temperature"], 0.1);
        assert_eq!(merged["session_id"], "s");
    }
}
