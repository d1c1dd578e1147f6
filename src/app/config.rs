//! File configuration: defaults the CLI falls back to.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::cli::StorageArg;
use series_downloader::orchestrator::MAX_CONCURRENCY;

const APP_DIR: &str = "series-downloader";

/// TOML-backed defaults.
///
/// ```toml
/// storage = "local"
/// output_dir = "/srv/series"
/// member_concurrency = 2
/// item_delay_ms = 500
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Default storage backend.
    pub storage: Option<StorageSetting>,
    /// Default root directory for local storage.
    pub output_dir: Option<PathBuf>,
    /// Default members downloaded at once.
    pub member_concurrency: Option<usize>,
    /// Default collections downloaded at once from a listing.
    pub collection_concurrency: Option<usize>,
    /// Default same-host item spacing in milliseconds.
    pub item_delay_ms: Option<u64>,
    /// Default pause before each network-bound member in milliseconds.
    pub member_delay_ms: Option<u64>,
    /// Default stagger between collection starts in milliseconds.
    pub collection_delay_ms: Option<u64>,
    /// Member-listing endpoint template (`{origin}`, `{slug}`).
    pub endpoint_template: Option<String>,
    /// Bound on "load more" clicks during interactive discovery.
    pub max_interactions: Option<usize>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

/// Storage labels accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageSetting {
    Local,
    Object,
}

impl From<StorageSetting> for StorageArg {
    fn from(value: StorageSetting) -> Self {
        match value {
            StorageSetting::Local => Self::Local,
            StorageSetting::Object => Self::Object,
        }
    }
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        validate_concurrency("member_concurrency", self.member_concurrency)?;
        validate_concurrency("collection_concurrency", self.collection_concurrency)?;
        validate_delay_ms("item_delay_ms", self.item_delay_ms, 60_000)?;
        validate_delay_ms("member_delay_ms", self.member_delay_ms, 60_000)?;
        validate_delay_ms("collection_delay_ms", self.collection_delay_ms, 600_000)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(template) = &self.endpoint_template
            && !template.contains("{slug}")
        {
            bail!("Invalid config value for `endpoint_template`: '{template}'. It must contain {{slug}}");
        }
        Ok(())
    }
}

fn validate_concurrency(field: &str, value: Option<usize>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_CONCURRENCY).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={MAX_CONCURRENCY}");
    }
    Ok(())
}

fn validate_delay_ms(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > max {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..={max}");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/series-downloader/config.toml`
/// 2. `$HOME/.config/series-downloader/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR).join("config.toml"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config_str(
            r#"
            storage = "object"
            output_dir = "/srv/series"
            member_concurrency = 2
            collection_concurrency = 3
            item_delay_ms = 250
            member_delay_ms = 0
            collection_delay_ms = 1000
            endpoint_template = "{origin}/api/chapters?slug={slug}"
            max_interactions = 4
            connect_timeout_secs = 5
            read_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.storage, Some(StorageSetting::Object));
        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/series")));
        assert_eq!(config.member_concurrency, Some(2));
        assert_eq!(config.item_delay_ms, Some(250));
        assert_eq!(config.max_interactions, Some(4));
        assert_eq!(config.read_timeout_secs, Some(60));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config_str("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(parse_config_str("concurency = 2").is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let err = parse_config_str("member_concurrency = 40").unwrap_err();
        assert!(err.to_string().contains("member_concurrency"));
        assert!(parse_config_str("item_delay_ms = 60001").is_err());
        assert!(parse_config_str("read_timeout_secs = 0").is_err());
        assert!(parse_config_str("endpoint_template = \"{origin}/api\"").is_err());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(load_file_config(Some(&temp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_explicit_path_loads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "storage = \"local\"\n").unwrap();
        let config = load_file_config(Some(&path)).unwrap();
        assert_eq!(config.storage, Some(StorageSetting::Local));
    }
}
