//! End-to-end account flows against a mocked backend.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

/// `hexa` pointed at the mock server with an isolated home.
fn hexa(home: &TempDir, server: &MockServer) -> Command {
    let mut cmd = cargo_bin_cmd!("hexa");
    cmd.env("HEXA_HOME", home.path())
        .env("HEXA_BACKEND_URL", server.uri())
        .env("HEXA_ANON_KEY", "anon-test-key")
        .env_remove("HEXA_LOG")
        .env_remove("HEXA_PASSWORD")
        .arg("--no-log-file");
    cmd
}

fn token_body(user_id: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": format!("access-{user_id}-0123456789"),
        "refresh_token": "refresh-0123456789",
        "expires_in": 3600,
        "user": { "id": user_id, "email": email }
    })
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_partial_json(serde_json::json!({ "email": "ana@example.com" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("u1", "ana@example.com")),
        )
        .mount(server)
        .await;
}

fn sign_in(home: &TempDir, server: &MockServer) {
    hexa(home, server)
        .args(["login", "--email", "ana@example.com", "--password", "pw123456"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as ana@example.com"));
}

#[tokio::test]
async fn test_status_without_session_shows_auth_flow() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    hexa(&home, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("state: unauthenticated"))
        .stdout(predicate::str::contains("screen: auth"));
}

#[tokio::test]
async fn test_login_persists_session_across_runs() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    sign_in(&home, &server);
    assert!(home.path().join("session.json").exists());

    hexa(&home, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("state: authenticated"))
        .stdout(predicate::str::contains("screen: main"))
        .stdout(predicate::str::contains("user: u1"));
}

#[tokio::test]
async fn test_rejected_login_reports_backend_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    hexa(&home, &server)
        .args(["login", "--email", "ana@example.com", "--password", "wrong"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid login credentials"));
    assert!(!home.path().join("session.json").exists());
}

#[tokio::test]
async fn test_register_pending_confirmation_asks_to_check_inbox() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u2",
            "email": "new@example.com"
        })))
        .mount(&server)
        .await;

    hexa(&home, &server)
        .args(["register", "--email", "new@example.com", "--password", "pw123456"])
        .assert()
        .success()
        .stdout(predicate::str::contains("check your inbox"));
    assert!(!home.path().join("session.json").exists());
}

#[tokio::test]
async fn test_logout_returns_to_auth_flow() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&home, &server);

    hexa(&home, &server)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    hexa(&home, &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("state: unauthenticated"));
}

#[tokio::test]
async fn test_password_mismatch_is_rejected_locally() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("PUT"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    sign_in(&home, &server);

    hexa(&home, &server)
        .args(["password", "--new", "secret1", "--confirm", "secret2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Passwords do not match"));
}

#[tokio::test]
async fn test_profile_update_upserts_row() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "u1",
            "email": "ana@example.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "username": "ana",
            "full_name": null,
            "avatar_url": null
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .and(body_partial_json(serde_json::json!({
            "id": "u1",
            "username": "ana",
            "full_name": "Ana Lima"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&home, &server);

    hexa(&home, &server)
        .args(["profile", "update", "--full-name", "Ana Lima"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile updated successfully"));
}

#[tokio::test]
async fn test_profile_requires_sign_in() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    hexa(&home, &server)
        .args(["profile", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}
