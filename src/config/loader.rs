// Configuration loader
// Loads client settings from ~/.rollcall/config.toml, then applies
// environment overrides

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::ClientConfig;
use crate::errors::config_parse_error;

pub const ENV_API_URL: &str = "ROLLCALL_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "ROLLCALL_TIMEOUT_SECS";

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".rollcall/config.toml"))
}

/// Load configuration from the default location and the environment
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(&default_config_path()?)
}

/// Load configuration from `path` (missing file means defaults) and the
/// environment
pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    let mut config = try_load_file(path)?.unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn try_load_file(path: &Path) -> Result<Option<ClientConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    #[derive(serde::Deserialize)]
    struct TomlConfig {
        #[serde(default)]
        client: Option<ClientConfig>,
    }

    let toml_config: TomlConfig = toml::from_str(&contents)
        .map_err(|e| anyhow!(config_parse_error(&path.display().to_string(), &e.to_string())))?;

    Ok(Some(toml_config.client.unwrap_or_default()))
}

/// Apply `ROLLCALL_*` overrides; `lookup` is the environment
pub(crate) fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.base_url = url.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
        config.timeout_seconds = raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a whole number of seconds (got {:?})", ENV_TIMEOUT_SECS, raw))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_base_url_and_timeout() {
        let mut config = ClientConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_API_URL, " https://school.example.com/api "),
                (ENV_TIMEOUT_SECS, "25"),
            ]),
        )
        .unwrap();
        assert_eq!(config.base_url, "https://school.example.com/api");
        assert_eq!(config.timeout_seconds, 25);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = ClientConfig::default();
        apply_env_overrides(&mut config, env(&[(ENV_API_URL, "  ")])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        let mut config = ClientConfig::default();
        let err = apply_env_overrides(&mut config, env(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }
}
