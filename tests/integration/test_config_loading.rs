use cadence::core::config::CadenceConfig;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
#[serial]
fn defaults_apply_without_a_config_file() {
    let config = CadenceConfig::load(None).unwrap();
    assert_eq!(config.database.url, "sqlite://cadence.db");
    assert_eq!(config.server.bind, "127.0.0.1:8474");
    assert_eq!(config.server.auth_token_env, "CADENCE_API_TOKEN");
    assert_eq!(config.execution.run_timeout_seconds, 60);
}

#[test]
#[serial]
fn file_values_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cadence.toml");
    fs::write(
        &path,
        r#"
[database]
url = "sqlite://custom.db"

[server]
bind = "127.0.0.1:9999"

[execution]
run_timeout_seconds = 15
"#,
    )
    .unwrap();

    let config = CadenceConfig::load(Some(&path)).unwrap();
    assert_eq!(config.database.url, "sqlite://custom.db");
    assert_eq!(config.server.bind, "127.0.0.1:9999");
    assert_eq!(config.execution.run_timeout_seconds, 15);
    // Untouched sections keep their defaults.
    assert_eq!(config.logging.level, "info");
}

#[test]
#[serial]
fn environment_overrides_beat_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cadence.toml");
    fs::write(
        &path,
        r#"
[database]
url = "sqlite://from-file.db"
"#,
    )
    .unwrap();

    std::env::set_var("CADENCE_DATABASE_URL", "sqlite://from-env.db");
    std::env::set_var("CADENCE_LOG_LEVEL", "debug");
    let config = CadenceConfig::load(Some(&path)).unwrap();
    std::env::remove_var("CADENCE_DATABASE_URL");
    std::env::remove_var("CADENCE_LOG_LEVEL");

    assert_eq!(config.database.url, "sqlite://from-env.db");
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn unparseable_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cadence.toml");
    fs::write(&path, "this is not toml [").unwrap();
    assert!(CadenceConfig::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn missing_explicit_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(CadenceConfig::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn zero_run_timeout_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cadence.toml");
    fs::write(
        &path,
        r#"
[execution]
run_timeout_seconds = 0
"#,
    )
    .unwrap();
    assert!(CadenceConfig::load(Some(&path)).is_err());
}
