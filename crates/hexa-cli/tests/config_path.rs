use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("hexa")
        .env("HEXA_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("hexa")
        .env("HEXA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("backend_url ="));
    assert!(contents.contains("[gate]"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("hexa")
        .env("HEXA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_set_backend_writes_url_and_key() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("hexa")
        .env("HEXA_HOME", dir.path())
        .args([
            "config",
            "set-backend",
            "--url",
            "https://project.example.co",
            "--anon-key",
            "public-anon",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://project.example.co"));

    let contents = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(contents.contains(r#"backend_url = "https://project.example.co""#));
    assert!(contents.contains(r#"anon_key = "public-anon""#));
}

#[test]
fn test_set_backend_rejects_invalid_url() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("hexa")
        .env("HEXA_HOME", dir.path())
        .args(["config", "set-backend", "--url", "not a url"])
        .assert()
        .failure();

    assert!(!dir.path().join("config.toml").exists());
}
