use std::path::{Path, PathBuf};

use secrecy::Secret;

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::MsgsyncConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "msgsync.toml",
    "msgsync.yaml",
    "msgsync.yml",
    "msgsync.json",
];

/// Environment variables that override parsed settings. The unprefixed names
/// come first so an existing `.env` with `TOKEN=` keeps working.
const TOKEN_VARS: &[&str] = &["TOKEN", "MSGSYNC_TOKEN"];
const CLIENT_ID_VARS: &[&str] = &["CLIENT_ID", "MSGSYNC_CLIENT_ID"];
const GUILD_ID_VARS: &[&str] = &["GUILD_ID", "MSGSYNC_GUILD_ID"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<MsgsyncConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Find the first config file in standard locations.
///
/// Search order:
/// 1. `./msgsync.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/msgsync/msgsync.{toml,yaml,yml,json}` (user-global)
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| PathBuf::from(*name))
        .chain(
            config_dir()
                .into_iter()
                .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name))),
        )
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/msgsync/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "msgsync").map(|d| d.config_dir().to_path_buf())
}

/// Apply `TOKEN`, `CLIENT_ID`, and `GUILD_ID` from the process environment.
pub fn apply_env_overrides(config: &mut MsgsyncConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

pub(crate) fn apply_overrides_with(config: &mut MsgsyncConfig, lookup: impl Fn(&str) -> Option<String>) {
    let first = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
    };

    if let Some(token) = first(TOKEN_VARS) {
        config.discord.token = Secret::new(token);
    }
    if let Some(id) = first(CLIENT_ID_VARS) {
        config.discord.application_id = Some(id);
    }
    if let Some(id) = first(GUILD_ID_VARS) {
        config.discord.guild_id = Some(id);
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<MsgsyncConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| Error::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msgsync.toml");
        std::fs::write(
            &path,
            "[discord]\ntoken = \"t\"\nguild_id = \"7\"\n\n[sync]\noperation_timeout_secs = 3\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.discord.token.expose_secret(), "t");
        assert_eq!(cfg.discord.guild_id.as_deref(), Some("7"));
        assert_eq!(cfg.sync.operation_timeout_secs, 3);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("msgsync.yaml");
        std::fs::write(&yaml, "sync:\n  dedupe_recipients: true\n").unwrap();
        assert!(load_config(&yaml).unwrap().sync.dedupe_recipients);

        let json = dir.path().join("msgsync.json");
        std::fs::write(&json, r#"{"discord": {"message_cache_size": 50}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().discord.message_cache_size, 50);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msgsync.ini");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to read "));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msgsync.toml");
        std::fs::write(&path, "[discord\n").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Parse { .. })));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let mut cfg: MsgsyncConfig =
            toml::from_str("[discord]\ntoken = \"from-file\"\nguild_id = \"1\"").unwrap();
        apply_overrides_with(&mut cfg, |name| match name {
            "TOKEN" => Some("from-env".into()),
            "MSGSYNC_CLIENT_ID" => Some("99".into()),
            "GUILD_ID" => Some("   ".into()),
            _ => None,
        });
        assert_eq!(cfg.discord.token.expose_secret(), "from-env");
        assert_eq!(cfg.discord.application_id.as_deref(), Some("99"));
        // blank values are ignored
        assert_eq!(cfg.discord.guild_id.as_deref(), Some("1"));
    }
}
