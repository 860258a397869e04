//! `init`: write a starter configuration.

use super::output::Output;
use crate::utils::toml_config::STARTER_CONFIG;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
#[derive(Debug, PartialEq)]
pub enum InitResult {
    Success,
    /// `mindmatrix.toml` exists and `--force` was not given
    AlreadyExists,
    Error(String),
}

pub const CONFIG_FILE: &str = "mindmatrix.toml";
pub const ENV_EXAMPLE_FILE: &str = ".env.example";

const ENV_EXAMPLE: &str = "# Comma-separated keys accepted in the api-key header
MINDMATRIX_API_KEYS=change-me
# Verifies Authorization: Bearer tokens (HS256). Leave unset to accept any bearer token.
# MINDMATRIX_JWT_SECRET=
OPENAI_API_KEY=
RUST_LOG=info
";

pub fn run(path: &Path, force: bool, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing MindMatrix");

    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() && !force {
        output.warning(&format!("{} already exists!", CONFIG_FILE));
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = fs::create_dir_all(path) {
        output.error(&format!("Failed to create {}: {}", path.display(), e));
        return InitResult::Error(e.to_string());
    }

    let files: [(PathBuf, &str); 2] = [
        (config_path, STARTER_CONFIG),
        (path.join(ENV_EXAMPLE_FILE), ENV_EXAMPLE),
    ];
    for (file, content) in &files {
        let name = file.display().to_string();
        if file.exists() && !force {
            output.skipped(&name, "already exists");
            continue;
        }
        if let Err(e) = fs::write(file, content) {
            output.error(&format!("Failed to write {}: {}", name, e));
            return InitResult::Error(e.to_string());
        }
        output.created(&name);
    }

    output.header("Next Steps");
    output.command("cp .env.example .env");
    output.command("mindmatrix-server");
    output.hint("API docs are served at /api-docs/openapi.json");

    InitResult::Success
}
