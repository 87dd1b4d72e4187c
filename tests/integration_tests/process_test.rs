//! Multi-process cluster tests
//!
//! Workers here are real child processes of the `herd` binary, talking to
//! the coordinator as newline-delimited JSON over stdin/stdout.

use std::net::SocketAddr;
use std::time::Duration;

use herd::coordinator::{CoordinatorConfig, CoordinatorServer, ProcessPool};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use super::fixtures::{client, wait_for_listener, ALICE_JSON};

const HERD_BIN: &str = env!("CARGO_BIN_EXE_herd");

fn worker_args() -> Vec<String> {
    ["worker", "--command-timeout", "5", "--no-request-logging"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn local(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_process_workers_share_coordinator_store() {
    let config = CoordinatorConfig::builder()
        .bind_address_str("127.0.0.1:0")
        .unwrap()
        .worker_count(2)
        .worker_base_port(38_610)
        .command_timeout_secs(5)
        .enable_request_logging(false)
        .build()
        .unwrap();
    let pool = ProcessPool::new(HERD_BIN, worker_args());

    let running = CoordinatorServer::new(config, pool)
        .unwrap()
        .launch()
        .await
        .unwrap();
    let workers = running.workers().to_vec();
    assert_eq!(workers.len(), 2);
    assert!(workers.iter().all(|w| w.pid.is_some()));
    for worker in &workers {
        wait_for_listener(local(worker.port)).await;
    }

    let addr = running.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(running.serve(async {
        let _ = stopped.await;
    }));

    let http = client();
    let created = http
        .post(format!("http://127.0.0.1:{}/api/users", workers[0].port))
        .body(ALICE_JSON)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Value = created.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let fetched = http
        .get(format!("http://127.0.0.1:{}/api/users/{id}", workers[1].port))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(fetched.json::<Value>().await.unwrap(), created);

    let listed: Value = http
        .get(format!("http://{addr}/api/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("coordinator did not stop")
        .unwrap()
        .unwrap();

    for worker in &workers {
        assert!(TcpStream::connect(local(worker.port)).await.is_err());
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_worker_process_exits_on_sigterm() {
    use herd::protocol::{encode_line, PortAssignment};
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let port = 38_630;
    let mut child = tokio::process::Command::new(HERD_BIN)
        .args(["worker", "--no-request-logging"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    let assignment = encode_line(&PortAssignment { port }).unwrap();
    stdin.write_all(assignment.as_bytes()).await.unwrap();
    stdin.flush().await.unwrap();
    wait_for_listener(local(port)).await;

    // Give the worker a moment to install its signal handlers.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let pid = child.id().unwrap();
    let sent = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    // stdin stays open, so only the signal can end the process.
    let status = tokio::time::timeout(Duration::from_secs(4), child.wait())
        .await
        .expect("worker kept running after SIGTERM")
        .unwrap();
    assert!(status.success());
    assert!(TcpStream::connect(local(port)).await.is_err());

    drop(stdin);
}
