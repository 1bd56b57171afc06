//! Layered configuration.
//!
//! Later layers win: the embedded `config/default.toml`, then optional files
//! under `config/` (`default`, the profile named by `JOBSTREAM_ENV`, `local`),
//! then `JOBSTREAM_*` environment variables.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File, FileFormat};

/// Defaults compiled into the binary
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

const ENV_PREFIX: &str = "JOBSTREAM";
const PROFILE_VAR: &str = "JOBSTREAM_ENV";
const DEFAULT_PROFILE: &str = "development";

/// Load the application configuration.
pub fn load_config() -> Result<AppConfig> {
    let profile = std::env::var(PROFILE_VAR).unwrap_or_else(|_| DEFAULT_PROFILE.to_string());
    resolve(file_layers(&profile), env_overrides())
}

fn file_layers(profile: &str) -> ConfigBuilder<DefaultState> {
    let embedded = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
    [
        "config/default".to_string(),
        format!("config/{profile}"),
        "config/local".to_string(),
    ]
    .iter()
    .fold(embedded, |builder, path| {
        builder.add_source(File::with_name(path).required(false))
    })
}

/// `JOBSTREAM_WORKER__TIMEOUT_SECS=45` sets `worker.timeout_secs`; list keys
/// take comma-separated values.
fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("worker.interpreter_args")
        .try_parsing(true)
}

fn resolve(files: ConfigBuilder<DefaultState>, env: Environment) -> Result<AppConfig> {
    files
        .add_source(env)
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
