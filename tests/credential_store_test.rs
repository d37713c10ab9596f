// Integration tests for the file-backed credential store

use mockito::Server;
use rollcall::auth::{CredentialPair, CredentialStore, FileStore, StoreError};
use rollcall::client::ApiClient;
use rollcall::config::ClientConfig;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_missing_file_reads_as_signed_out() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("credentials.json"));

    assert_eq!(store.access_token().unwrap(), None);
    assert_eq!(store.refresh_token().unwrap(), None);
    // Clearing an absent session is fine
    store.clear().unwrap();
}

#[test]
fn test_credentials_survive_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/credentials.json");

    FileStore::new(&path)
        .save(&CredentialPair::new("a1", "r1"))
        .unwrap();

    let reopened = FileStore::new(&path);
    assert_eq!(reopened.access_token().unwrap().as_deref(), Some("a1"));
    assert_eq!(reopened.refresh_token().unwrap().as_deref(), Some("r1"));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, json!({"accessToken": "a1", "refreshToken": "r1"}));
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn test_clear_removes_only_session_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let store = FileStore::new(&path);

    store.save(&CredentialPair::new("a1", "r1")).unwrap();
    store.set("lastSchool", "42").unwrap();
    store.clear().unwrap();

    assert_eq!(store.access_token().unwrap(), None);
    assert_eq!(store.get("lastSchool").unwrap().as_deref(), Some("42"));
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    fs::write(&path, "{not json").unwrap();

    let err = FileStore::new(&path).access_token().unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert!(err.to_string().contains("credentials.json"));
}

#[tokio::test]
async fn test_refreshed_pair_is_written_to_disk() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/classrooms/")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/refresh/")
        .with_status(200)
        .with_body(json!({"access": "fresh"}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/classrooms/")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    FileStore::new(&path)
        .save(&CredentialPair::new("stale", "r1"))
        .unwrap();

    let client = ApiClient::new(
        ClientConfig::new(server.url()),
        Arc::new(FileStore::new(&path)),
    )
    .unwrap();
    client.get("/classrooms/").await.unwrap();

    // Backend did not rotate the refresh token, so the old one is kept
    let reopened = FileStore::new(&path);
    assert_eq!(reopened.access_token().unwrap().as_deref(), Some("fresh"));
    assert_eq!(reopened.refresh_token().unwrap().as_deref(), Some("r1"));
}
