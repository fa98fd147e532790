//! Configuration resolution tests
//!
//! Tests that touch INKF_ROOT_FOLDER are marked #[serial] so they never
//! race on the process environment.

use inkf_common::config::{
    write_toml_config, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module").resolve();

    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(root_folder, defaults.root_folder);
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/inkf-env");

    let resolved = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/inkf-cli")))
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/inkf-cli"));
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/inkf-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/inkf-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new("test-module")
        .with_toml_config(&toml)
        .resolve();

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/tmp/inkf-env"));
}

#[test]
#[serial]
fn test_toml_used_when_env_absent() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/inkf-toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new("test-module")
        .with_toml_config(&toml)
        .resolve();

    assert_eq!(resolved, PathBuf::from("/tmp/inkf-toml"));
}

#[test]
fn test_initializer_creates_layout() {
    let temp = tempfile::TempDir::new().unwrap();
    let root = temp.path().join("nested").join("root");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(init.files_path().is_dir());
    assert_eq!(init.database_path().parent().unwrap(), root.as_path());
}

#[test]
fn test_toml_write_then_load() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("inkf-audiobook.toml");

    let config = TomlConfig {
        port: Some(5999),
        public_base_url: Some("https://cdn.example.com".to_string()),
        openai_api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    write_toml_config(&config, &path).unwrap();

    let loaded = TomlConfig::load(&path).unwrap();
    assert_eq!(loaded.port, Some(5999));
    assert_eq!(loaded.public_base_url.as_deref(), Some("https://cdn.example.com"));
    assert_eq!(loaded.openai_api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_unreadable_explicit_config_falls_back_to_defaults() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let config = TomlConfig::load_or_default(Some(&path), "inkf-audiobook");
    assert!(config.port.is_none());
}
