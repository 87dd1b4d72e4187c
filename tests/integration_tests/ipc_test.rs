//! Worker-to-dispatcher command forwarding
//!
//! Drives a worker router whose executor forwards over channels to a live
//! dispatcher, without any sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use herd::coordinator::{Dispatcher, Envelope, WorkerHandle};
use herd::protocol::{CoordinatorMessage, IpcResponse, StoreResponse};
use herd::worker::{create_router, IpcExecutor};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use super::fixtures::ALICE_JSON;

/// Router for worker 0 wired to a dispatcher through in-memory channels
fn forwarding_router(timeout: Duration) -> Router {
    let (outbound, mut requests) = mpsc::unbounded_channel();
    let executor = Arc::new(IpcExecutor::new(outbound, timeout));
    let pending = executor.pending();

    let (to_worker, mut replies) = mpsc::unbounded_channel();
    let (inbox_tx, inbox) = mpsc::unbounded_channel();
    tokio::spawn(Dispatcher::new(vec![WorkerHandle::new(0, None, 0, to_worker)]).run(inbox));

    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            if inbox_tx.send(Envelope { worker: 0, request }).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(message) = replies.recv().await {
            if let CoordinatorMessage::Reply(reply) = message {
                pending.complete(reply);
            }
        }
    });

    create_router(executor)
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_forwarded_commands_hit_dispatcher_store() {
    let router = forwarding_router(Duration::from_secs(5));

    let (status, created) = call(&router, Method::POST, "/api/users", Some(ALICE_JSON)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (status, fetched) = call(&router, Method::GET, &format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, _) = call(&router, Method::DELETE, &format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, listed) = call(&router, Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, Value::Array(vec![]));
}

#[tokio::test]
async fn test_unanswered_command_times_out_as_500() {
    let (outbound, mut requests) = mpsc::unbounded_channel();
    let executor = Arc::new(IpcExecutor::new(outbound, Duration::from_millis(100)));
    let pending = executor.pending();
    let router = create_router(executor);

    let (status, body) = call(&router, Method::GET, "/api/users", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal Server Error");
    assert!(pending.is_empty());

    // A reply that shows up after the timeout matches nothing.
    let request = requests.recv().await.unwrap();
    assert!(!pending.complete(IpcResponse {
        request_id: request.request_id,
        response: StoreResponse::list(vec![]),
    }));
}
