//! Configuration loading, env substitution, and validation.
//!
//! Config files: `msgsync.toml`, `msgsync.yaml`, or `msgsync.json`
//! Searched in `./` then `~/.config/msgsync/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, and the
//! `TOKEN` / `CLIENT_ID` / `GUILD_ID` environment variables override the
//! Discord settings after parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, find_config_file, load_config},
    schema::{DiscordConfig, MetricsConfig, MsgsyncConfig, SyncConfig},
    validate::{Diagnostic, Severity, ValidationResult, load_and_validate},
};
