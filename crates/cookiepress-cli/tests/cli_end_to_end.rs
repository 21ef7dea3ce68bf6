use assert_cmd::Command;
use httpmock::MockServer;
use predicates::str::contains;
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cookiepress-cli"));
    cmd.env_remove("COOKIEPRESS_SERVER_URL");
    cmd
}

#[test]
fn generate_writes_binary_archive() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/api/generate")
            .json_body(serde_json::json!({
                "template_url": "https://github.com/o/r",
                "extra_context": {"project_name": "demo"}
            }));
        then.status(200)
            .header("content-type", "application/zip")
            .body("PK-binary");
    });

    let dir = TempDir::new().expect("tmp dir");
    let output = dir.path().join("out.zip");
    cli()
        .env("COOKIEPRESS_SERVER_URL", server.base_url())
        .args(["generate", "https://github.com/o/r", "-c", "project_name=demo", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(contains("9 bytes"));

    mock.assert();
    assert_eq!(std::fs::read(&output).expect("archive"), b"PK-binary");
}

#[test]
fn generate_decodes_base64_transport() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/api/generate");
        then.status(200)
            .header("content-type", "application/zip")
            .header("content-transfer-encoding", "base64")
            .body("UEsDBA==");
    });

    let dir = TempDir::new().expect("tmp dir");
    let output = dir.path().join("project.zip");
    cli()
        .args(["--server", &server.base_url(), "generate", "https://github.com/o/r", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(std::fs::read(&output).expect("archive"), b"PK\x03\x04");
}

#[test]
fn server_errors_are_reported_with_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/api/generate");
        then.status(500)
            .header("content-type", "text/plain")
            .body("Bad template: ZIP is empty");
    });

    let dir = TempDir::new().expect("tmp dir");
    let output = dir.path().join("project.zip");
    cli()
        .env("COOKIEPRESS_SERVER_URL", server.base_url())
        .args(["generate", "https://github.com/o/r", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("500"))
        .stderr(contains("Bad template: ZIP is empty"));

    assert!(!output.exists());
}

#[test]
fn variables_prints_template_config() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/o/r/main/cookiecutter.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"project_name": "My Project", "license": ["MIT", "BSD"]}"#);
    });

    cli()
        .args(["variables", &server.url("/o/r/main/cookiecutter.json")])
        .assert()
        .success()
        .stdout(contains("\"project_name\": \"My Project\""));
}

#[test]
fn invalid_server_fails_fast() {
    cli()
        .args(["--server", "ftp://nowhere", "generate", "https://github.com/o/r"])
        .assert()
        .failure()
        .stderr(contains("InvalidServer"));
}
