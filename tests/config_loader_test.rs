// Integration tests for config file loading

use rollcall::config::{load_config_from, ClientConfig, DEFAULT_BASE_URL, ENV_API_URL};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn env_url_unset() -> bool {
    std::env::var(ENV_API_URL).map_or(true, |v| v.trim().is_empty())
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

    let defaults = ClientConfig::default();
    assert_eq!(config.refresh_path, defaults.refresh_path);
    assert_eq!(config.login_route, "/login");
    assert_eq!(config.credentials_path, None);
    if env_url_unset() {
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}

#[test]
fn test_client_table_is_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[client]
base_url = "https://school.example.com/api"
refresh_path = "/token/refresh/"
login_route = "/signin"
credentials_path = "/var/lib/rollcall/creds.json"
"#,
    )
    .unwrap();

    let config = load_config_from(&path).unwrap();

    assert_eq!(config.refresh_path, "/token/refresh/");
    assert_eq!(config.login_route, "/signin");
    // Unset keys keep their defaults
    assert_eq!(config.login_path, ClientConfig::default().login_path);
    assert_eq!(
        config.credentials_path,
        Some(PathBuf::from("/var/lib/rollcall/creds.json"))
    );
    if env_url_unset() {
        assert_eq!(config.base_url, "https://school.example.com/api");
    }
}

#[test]
fn test_file_without_client_table_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "# nothing configured yet\n").unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.login_path, "/auth/login/");
}

#[test]
fn test_malformed_toml_points_at_client_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[client\nbase_url = ").unwrap();

    let err = load_config_from(&path).unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("Failed to parse config file"));
    assert!(msg.contains("[client]"));
}

#[test]
fn test_invalid_scheme_is_rejected() {
    if !env_url_unset() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[client]\nbase_url = \"ftp://school.example.com\"\n").unwrap();

    let err = load_config_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid configuration"));
}
