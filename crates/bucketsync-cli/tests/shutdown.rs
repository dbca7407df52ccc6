//! Shutdown behavior of `bucketsync run`
//!
//! SIGTERM must stop the watch loop, print the summary and exit cleanly.

#![cfg(unix)]

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sigterm_stops_run_with_summary() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("mirror");
    std::fs::create_dir(&folder).unwrap();
    let endpoint = server.uri().trim_start_matches("http://").to_string();

    let mut child = Command::new(env!("CARGO_BIN_EXE_bucketsync"))
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .args([
            "run",
            "--endpoint",
            &endpoint,
            "--access-key",
            "AKIA",
            "--secret-key",
            "secret",
            "--bucket",
            "mirror",
            "--folder",
        ])
        .arg(&folder)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let mut output = Vec::new();

    let watching = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            let found = line.contains("Watching");
            output.push(line);
            if found {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(watching, "run never started watching: {output:?}");

    let pid = child.id().unwrap().to_string();
    let killed = std::process::Command::new("kill")
        .args(["-TERM", &pid])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = tokio::time::timeout(Duration::from_secs(30), child.wait())
        .await
        .expect("run did not exit after SIGTERM")
        .unwrap();
    while let Some(line) = lines.next_line().await.unwrap() {
        output.push(line);
    }

    assert!(status.success(), "exit status {status:?}, output {output:?}");
    assert!(
        output.iter().any(|l| l.contains("Stopped watching")),
        "no summary in {output:?}"
    );
}
