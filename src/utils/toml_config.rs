//! TOML-based configuration for MindMatrix
//!
//! Server, auth, model and agent settings live in `mindmatrix.toml`. Secrets
//! are never stored in the file; the file names the environment variables
//! that hold them.
//!
//! # Hot Reloading
//!
//! [`ConfigManager`] keeps the active configuration behind an `ArcSwap` and can
//! watch the file for changes. Readers always see a complete snapshot, so API
//! keys can be rotated without restarting the server.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::registry::FactoryConfig;

/// Root configuration structure loaded from mindmatrix.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindMatrixConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    /// Agents registered by the server binary, keyed by name
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9527
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// When false every request is let through
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Environment variable holding a comma-separated list of API keys
    #[serde(default = "default_api_keys_env")]
    pub api_keys_env: String,

    /// Environment variable holding the HS256 secret used to verify bearer tokens
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
}

fn default_true() -> bool {
    true
}

fn default_api_keys_env() -> String {
    "MINDMATRIX_API_KEYS".to_string()
}

fn default_jwt_secret_env() -> String {
    "MINDMATRIX_JWT_SECRET".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_keys_env: default_api_keys_env(),
            jwt_secret_env: default_jwt_secret_env(),
        }
    }
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable containing the API key
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key_env: default_llm_key_env(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

// ============= Memory Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Memories tagged with any of these topics are hidden from agents
    #[serde(default)]
    pub exclude_topics: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exclude_topics: Vec::new(),
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub goal: Option<String>,

    #[serde(default)]
    pub instructions: Vec<String>,

    /// Log full prompts at debug level
    #[serde(default)]
    pub debug: bool,
}

impl AgentConfig {
    /// Factory config for registering this agent under `name`.
    pub fn to_factory_config(&self, name: &str) -> FactoryConfig {
        let mut config = FactoryConfig::new();
        config.insert("name".into(), name.into());
        if let Some(description) = &self.description {
            config.insert("description".into(), description.clone().into());
        }
        if let Some(goal) = &self.goal {
            config.insert("goal".into(), goal.clone().into());
        }
        config.insert(
            "instructions".into(),
            serde_json::Value::from(self.instructions.clone()),
        );
        config.insert("debug".into(), self.debug.into());
        config
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    MissingEnvVar,
    NoApiKeys,
    UnverifiedBearer,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl MindMatrixConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MindMatrixConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.host must not be empty".to_string(),
            ));
        }
        if !matches!(self.server.log_format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "server.log_format must be 'pretty' or 'json', got '{}'",
                self.server.log_format
            )));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        if let Some(name) = self.agents.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "agent name '{}' must not be blank",
                name
            )));
        }
        Ok(())
    }

    /// Validate and collect non-fatal problems, mostly unset secrets
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        if self.resolve_env(&self.llm.api_key_env).is_none() {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::MissingEnvVar,
                message: format!(
                    "LLM API key variable '{}' is not set",
                    self.llm.api_key_env
                ),
            });
        }
        if self.auth.enabled {
            if self.api_keys().is_empty() {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::NoApiKeys,
                    message: format!(
                        "No API keys configured in '{}'; only bearer tokens will be accepted",
                        self.auth.api_keys_env
                    ),
                });
            }
            if self.jwt_secret().is_none() {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::UnverifiedBearer,
                    message: format!(
                        "'{}' is not set; bearer tokens are accepted without verification",
                        self.auth.jwt_secret_env
                    ),
                });
            }
        }
        Ok(warnings)
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }

    /// API keys accepted in the `api-key` header
    pub fn api_keys(&self) -> Vec<String> {
        self.resolve_env(&self.auth.api_keys_env)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Secret for verifying bearer tokens, if configured
    pub fn jwt_secret(&self) -> Option<String> {
        self.resolve_env(&self.auth.jwt_secret_env)
    }

    /// Get the model API key from the environment
    pub fn llm_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.llm.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.llm.api_key_env.clone()))
    }

    /// Get agent config by name
    pub fn get_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<MindMatrixConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = MindMatrixConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config.
    /// This won't have file watching capabilities.
    pub fn from_config(config: MindMatrixConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("mindmatrix.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<MindMatrixConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Replace the active configuration
    pub fn store(&self, config: MindMatrixConfig) {
        self.config.store(Arc::new(config));
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = MindMatrixConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let file_name = config_path.file_name().map(|n| n.to_os_string());
        let config_arc = Arc::clone(&self.config);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the parent directory so editors that replace the file are seen
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Let the write finish, then collapse the burst into one reload
                tokio::time::sleep(Duration::from_millis(300)).await;
                while rx.try_recv().is_ok() {}

                match MindMatrixConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

/// Starter configuration written by `mindmatrix-server init`
pub const STARTER_CONFIG: &str = r#"# MindMatrix server configuration

[server]
host = "127.0.0.1"
port = 9527
log_level = "info"
log_format = "pretty"  # or "json"

[auth]
enabled = true
api_keys_env = "MINDMATRIX_API_KEYS"      # comma-separated keys for the api-key header
jwt_secret_env = "MINDMATRIX_JWT_SECRET"  # verifies Authorization: Bearer tokens when set

[llm]
api_base = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
model = "gpt-4o-mini"
temperature = 0.7

[memory]
enabled = true
exclude_topics = []

[agents.chatter]
description = "You are Chatter, a friendly assistant that gives the final reply to the user."
goal = "Answer the user when no other collaborator matches the request."
instructions = ["Keep answers concise", "Use a natural conversational tone"]
"#;
