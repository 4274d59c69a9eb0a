//! Unit tests for the SettingsEngine: file load/save, dot-path updates and
//! environment overrides.

use std::collections::HashMap;

use serde_json::json;
use tempfile::TempDir;

use smartmarks::services::settings_engine::{
    SettingsEngine, SettingsEngineTrait, ENV_ANON_KEY, ENV_BACKEND_URL, ENV_REALTIME_URL,
    ENV_REDIRECT_TO, ENV_SESSION_PASSPHRASE,
};
use smartmarks::types::errors::SettingsError;
use smartmarks::types::settings::AppSettings;

fn setup() -> (SettingsEngine, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("settings.json");
    let engine = SettingsEngine::new(Some(path.to_string_lossy().to_string()));
    (engine, dir)
}

#[test]
fn test_missing_file_loads_defaults() {
    let (mut engine, _dir) = setup();
    let settings = engine.load().unwrap();
    assert_eq!(settings, AppSettings::default());
    assert_eq!(settings.auth.provider, "google");
    assert!(settings.realtime.enabled);
    assert!(settings.realtime.owner_filter);
}

#[test]
fn test_save_creates_parent_dirs_and_reloads() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    engine
        .set_value("backend.url", json!("https://abc.supabase.co"))
        .unwrap();

    let mut again = SettingsEngine::new(Some(engine.get_config_path().to_string()));
    let settings = again.load().unwrap();
    assert_eq!(settings.backend.url, "https://abc.supabase.co");
}

#[test]
fn test_partial_file_fills_defaults() {
    let (mut engine, _dir) = setup();
    let path = std::path::Path::new(engine.get_config_path()).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"realtime": {"owner_filter": false}}"#).unwrap();

    let settings = engine.load().unwrap();
    assert!(!settings.realtime.owner_filter);
    assert_eq!(settings.realtime.table, "bookmarks");
    assert_eq!(settings.http.timeout_secs, 30);
}

#[test]
fn test_malformed_file_is_an_error() {
    let (mut engine, _dir) = setup();
    let path = std::path::Path::new(engine.get_config_path()).to_path_buf();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(engine.load(), Err(SettingsError::SerializationError(_))));
}

#[test]
fn test_set_value_rejects_unknown_key() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    assert!(matches!(
        engine.set_value("backend.nope", json!(1)),
        Err(SettingsError::InvalidKey(_))
    ));
    assert!(matches!(
        engine.set_value("", json!(1)),
        Err(SettingsError::InvalidKey(_))
    ));
}

#[test]
fn test_set_value_rejects_wrong_type() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    assert!(matches!(
        engine.set_value("http.timeout_secs", json!("soon")),
        Err(SettingsError::InvalidValue(_))
    ));
    assert_eq!(engine.get_settings().http.timeout_secs, 30);
}

#[test]
fn test_reset_restores_defaults() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    engine.set_value("auth.provider", json!("github")).unwrap();
    engine.reset().unwrap();
    assert_eq!(engine.get_settings().auth.provider, "google");
}

#[test]
fn test_env_overrides() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    let env: HashMap<&str, &str> = [
        (ENV_BACKEND_URL, "https://abc.supabase.co/"),
        (ENV_ANON_KEY, "anon-key"),
        (ENV_REALTIME_URL, "https://rt.example.com"),
        (ENV_REDIRECT_TO, ""),
    ]
    .into_iter()
    .collect();
    engine.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

    let s = engine.get_settings();
    assert_eq!(s.backend.anon_key, "anon-key");
    assert_eq!(s.backend.resolved_realtime_url(), "https://rt.example.com");
    assert_eq!(s.auth.redirect_to, "http://localhost:3000");
}

#[test]
fn test_env_overrides_session_passphrase() {
    let (mut engine, _dir) = setup();
    engine.load().unwrap();
    assert!(engine.get_settings().storage.uses_default_passphrase());

    engine.apply_env_overrides(|k| (k == ENV_SESSION_PASSPHRASE).then(|| " correct horse ".to_string()));
    let storage = &engine.get_settings().storage;
    assert_eq!(storage.passphrase, "correct horse");
    assert!(!storage.uses_default_passphrase());
}

#[test]
fn test_realtime_url_defaults_under_backend() {
    let mut settings = AppSettings::default();
    settings.backend.url = "https://abc.supabase.co/".into();
    assert_eq!(
        settings.backend.resolved_realtime_url(),
        "https://abc.supabase.co/realtime"
    );
}
