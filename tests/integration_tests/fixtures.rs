//! Test fixtures for integration tests
//!
//! Provides sample request bodies and helpers for starting clusters

use std::net::SocketAddr;
use std::time::Duration;

use herd::coordinator::{CoordinatorConfig, CoordinatorServer, ServerError, TaskPool, WorkerInfo};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Valid user body
pub const ALICE_JSON: &str = r#"{"username":"alice","age":30,"hobbies":["chess","go"]}"#;

/// Valid replacement body
pub const ALICE_RENAMED_JSON: &str = r#"{"username":"alice2","age":31,"hobbies":[]}"#;

/// Body missing the hobbies field
pub const MISSING_FIELD_JSON: &str = r#"{"username":"bob","age":20}"#;

/// Body that is not JSON at all
pub const MALFORMED_JSON: &str = r#"{"username": "bob", "age": "#;

/// Well-formed v4 id that is never generated by the tests
pub const UNKNOWN_ID: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

/// HTTP client that never goes through a system proxy
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Wait until something accepts connections on `addr`
pub async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("nothing listening on {addr}");
}

/// A coordinator with in-process workers, serving in the background
pub struct TestCluster {
    pub addr: SocketAddr,
    pub workers: Vec<WorkerInfo>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestCluster {
    /// Start `count` workers on `base_port..` and an ephemeral public port
    pub async fn start(count: usize, base_port: u16) -> Self {
        let config = CoordinatorConfig::builder()
            .bind_address_str("127.0.0.1:0")
            .unwrap()
            .worker_count(count)
            .worker_base_port(base_port)
            .command_timeout_secs(5)
            .enable_request_logging(false)
            .build()
            .unwrap();
        let pool = TaskPool::new(config.worker_config());

        let running = CoordinatorServer::new(config, pool)
            .unwrap()
            .launch()
            .await
            .unwrap();

        let addr = running.local_addr();
        let workers = running.workers().to_vec();
        for worker in &workers {
            wait_for_listener(SocketAddr::from(([127, 0, 0, 1], worker.port))).await;
        }

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(running.serve(async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            workers,
            stop,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Direct URL of one worker, bypassing the balancer
    pub fn worker_url(&self, index: usize, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.workers[index].port, path)
    }

    /// Stop the balancer and every worker
    pub async fn stop(self) {
        let _ = self.stop.send(());
        self.handle.await.unwrap().unwrap();
    }
}
