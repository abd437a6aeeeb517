//! Process-level checks for the `sync_wave_request` binary.

use tokio::process::Command;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn migrate_command(surreal_url: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sync_wave_request"));
    cmd.env("SURREAL_URL", surreal_url)
        .env("SURREAL_USER", "root")
        .env("SURREAL_PASS", "root")
        .env("SURREAL_NS", "seqera")
        .env("SURREAL_DB", "wave")
        .env("SURREAL_RESPONSE_SHAPE", "lenient")
        // Closed port: any connection attempt would fail loudly.
        .env("PG_HOST", "127.0.0.1")
        .env("PG_PORT", "1")
        .env("PG_DB", "wave")
        .env("PG_USER", "postgres")
        .env("PG_PASS", "postgres")
        .env("RUST_LOG", "off");
    cmd
}

#[tokio::test]
async fn source_500_exits_1_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("surreal is down"))
        .expect(1)
        .mount(&server)
        .await;

    let output = migrate_command(&format!("{}/sql", server.uri()))
        .output()
        .await
        .expect("run sync_wave_request");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Error querying SurrealDB: surreal is down"),
        "stdout: {stdout}"
    );
    assert!(!stdout.contains("Fetched"), "stdout: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("connect postgres"), "stderr: {stderr}");
}

#[tokio::test]
async fn bad_port_config_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(0)
        .mount(&server)
        .await;

    let output = migrate_command(&format!("{}/sql", server.uri()))
        .env("PG_PORT", "five")
        .output()
        .await
        .expect("run sync_wave_request");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PG_PORT"), "stderr: {stderr}");
}

#[tokio::test]
async fn progress_lines_precede_destination_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"status":"OK","result":[{"id":"wave_request:⟨a1⟩","x":1},{"id":"wave_request:⟨a1⟩","x":2},{"id":"wave_request:⟨b2⟩","x":3}]}]"#,
        ))
        .mount(&server)
        .await;

    let output = migrate_command(&format!("{}/sql", server.uri()))
        .output()
        .await
        .expect("run sync_wave_request");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Fetched 3 records from SurrealDB"), "stdout: {stdout}");
    assert!(
        stdout.contains("Prepared 2 unique records, 1 duplicates found"),
        "stdout: {stdout}"
    );
    assert!(!stdout.contains("Imported into PostgreSQL"), "stdout: {stdout}");

    // The temp buffer does not outlive the failed run.
    let path = stdout
        .lines()
        .find_map(|l| l.strip_prefix("Data written to temp file: "))
        .expect("temp file line");
    assert!(!std::path::Path::new(path).exists());
}
