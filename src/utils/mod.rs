/// ShareGPT dataset helpers.
pub mod sharegpt;
/// TOML configuration with hot reload.
pub mod toml_config;
