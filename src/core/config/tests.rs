use super::data::Config;
use super::io::ConfigError;
use crate::core::constants::{DEFAULT_APOLOGY, DEFAULT_BASE_URL, DEFAULT_GREETING, DEFAULT_MODEL};
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_config_persistence_roundtrip() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let config = Config {
        base_url: Some("http://localhost:11434/v1".to_string()),
        model: Some("llama3".to_string()),
        greeting: Some("Halo!".to_string()),
        markdown: Some(true),
        ..Default::default()
    };
    config.save_to_path(&config_path).expect("save failed");

    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_toml_reports_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "model = [unterminated").expect("write failed");

    let err = Config::load_from_path(&config_path).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_defaults_fill_runtime_settings() {
    let config = Config::default();

    let settings = config.session_settings();
    assert_eq!(settings.greeting, DEFAULT_GREETING);
    assert_eq!(settings.apology, DEFAULT_APOLOGY);

    let backend = config.backend_config("key".to_string());
    assert_eq!(backend.base_url, DEFAULT_BASE_URL);
    assert_eq!(backend.model, DEFAULT_MODEL);
    assert!(backend.system_instruction.is_some());
    assert!(!config.markdown_enabled());
}

#[test]
fn test_overrides_take_precedence() {
    let config: Config = toml::from_str(
        r#"
model = "gpt-4o"
error_message = "Waduh, gagal."
system_instruction = "Be brief."
"#,
    )
    .expect("parse failed");

    assert_eq!(config.session_settings().apology, "Waduh, gagal.");
    let backend = config.backend_config("key".to_string());
    assert_eq!(backend.model, "gpt-4o");
    assert_eq!(backend.system_instruction.as_deref(), Some("Be brief."));
}
