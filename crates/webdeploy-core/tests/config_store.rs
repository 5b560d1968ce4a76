use std::path::PathBuf;

use tempfile::TempDir;

use webdeploy_core::config::{ConfigStore, DeployConfig, config_path_in};

#[test]
fn load_missing_returns_defaults() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_dir(&temp.path().join("config"));

    let config = store.load().unwrap();

    assert_eq!(config, DeployConfig::default());
    assert!(config.database.enabled);
    assert_eq!(config.installer.timeout_secs, 300);
    assert_eq!(
        config.catalog.version_check_url,
        "https://api1.whmcs.com/download/latest"
    );
}

#[test]
fn save_then_load_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_dir(&temp.path().join("config"));

    let mut config = DeployConfig::new();
    config.account = "acme".to_string();
    config.state_dir = Some(temp.path().join("state"));
    config.database.connection_limit = 30;
    config.scheduler.enabled = true;
    config.sites.web_root = PathBuf::from("/home/acme/sites");
    config.sites.owner = Some("acme".to_string());

    store.save(&config).unwrap();

    assert_eq!(store.config_path(), config_path_in(&temp.path().join("config")));
    assert!(store.config_path().exists());
    assert_eq!(store.load().unwrap(), config);
}

#[test]
fn save_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_dir(temp.path());

    let mut config = DeployConfig::new();
    config.catalog.version_check_url = "not a url".to_string();

    let err = store.save(&config).unwrap_err().to_string();
    assert!(err.contains("version_check_url"));
    assert!(!store.config_path().exists());
}

#[test]
fn load_reports_line_of_bad_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("webdeploy.toml");
    std::fs::write(&path, "account = \"acme\"\n[database\nhost = \"db\"\n").unwrap();

    let err = ConfigStore::from_path(path).load().unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("Failed to parse config file"), "{}", message);
    assert!(message.contains("TOML parsing error"), "{}", message);
}
