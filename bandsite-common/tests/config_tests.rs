//! Integration tests for configuration resolution and graceful degradation
//!
//! Tests that manipulate BANDSITE_CONFIG are marked with #[serial] so they run
//! sequentially, not in parallel.

use bandsite_common::config::{ConfigResolver, SiteConfig, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/bandsite-env.toml");

    let cli = PathBuf::from("/tmp/bandsite-cli.toml");
    let resolved = ConfigResolver::new(Some(&cli)).resolve();
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_path() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/bandsite-env.toml");

    let resolved = ConfigResolver::new(None).resolve();
    assert_eq!(resolved, Some(PathBuf::from("/tmp/bandsite-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_degrades_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    let missing = PathBuf::from("/nonexistent/bandsite/config.toml");
    let config = SiteConfig::load_or_default(Some(&missing));

    assert_eq!(config.site.default_page, "home");
    assert_eq!(config.site.pages.len(), 8);
}

#[test]
#[serial]
fn test_invalid_file_degrades_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[site]\ndefault_page = \"nowhere\"\n").unwrap();

    let config = SiteConfig::load_or_default(Some(&path));
    assert_eq!(config.site.default_page, "home");
}

#[test]
#[serial]
fn test_valid_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[site]
default_page = "bio"
base_url = "http://localhost:8000/"

[[site.pages]]
name = "home"
locator = "/home.html"

[[site.pages]]
name = "bio"
locator = "/bio.html"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = SiteConfig::load_or_default(Some(&path));
    assert_eq!(config.site.default_page, "bio");
    assert_eq!(config.site.base_url.as_deref(), Some("http://localhost:8000/"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.site.pages.len(), 2);
}
