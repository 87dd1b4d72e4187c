//! Balancer tests against stub upstreams
//!
//! Each upstream is a wiremock server that identifies itself in the
//! response body, so the order in which they are hit is observable.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use herd::coordinator::Balancer;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn upstream(name: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-upstream", name)
                .set_body_string(name),
        )
        .mount(&server)
        .await;
    server
}

async fn send(balancer: &Arc<Balancer>, request: Request<Body>) -> Response {
    balancer.clone().router().oneshot(request).await.unwrap()
}

async fn get(balancer: &Arc<Balancer>, uri: &str) -> Response {
    send(
        balancer,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

// ============================================================================
// Round Robin Tests
// ============================================================================

#[tokio::test]
async fn test_round_robin_two_workers() {
    let first = upstream("first").await;
    let second = upstream("second").await;
    let balancer = Arc::new(
        Balancer::new(vec![*first.address(), *second.address()], None).unwrap(),
    );

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(body_text(get(&balancer, "/api/users").await).await);
    }

    assert_eq!(seen, vec!["first", "second", "first", "second"]);
}

#[tokio::test]
async fn test_round_robin_is_shared_across_paths() {
    let servers = [upstream("a").await, upstream("b").await, upstream("c").await];
    let targets = servers.iter().map(|s| *s.address()).collect();
    let balancer = Arc::new(Balancer::new(targets, None).unwrap());

    let mut seen = Vec::new();
    for uri in ["/api/users", "/anything", "/api/users/x", "/", "/api"] {
        seen.push(body_text(get(&balancer, uri).await).await);
    }

    assert_eq!(seen, vec!["a", "b", "c", "a", "b"]);
}

// ============================================================================
// Pass-through Tests
// ============================================================================

#[tokio::test]
async fn test_request_and_response_passed_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/users/abc"))
        .and(query_param("dry", "1"))
        .and(header("x-request-tag", "t-1"))
        .and(body_json(json!({"username": "carol", "age": 5, "hobbies": []})))
        .respond_with(
            ResponseTemplate::new(418)
                .insert_header("x-upstream", "only")
                .set_body_string("short and stout"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let balancer = Arc::new(Balancer::new(vec![*server.address()], None).unwrap());
    let request = Request::builder()
        .method("PUT")
        .uri("/api/users/abc?dry=1")
        .header("x-request-tag", "t-1")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"username":"carol","age":5,"hobbies":[]}"#,
        ))
        .unwrap();

    let response = send(&balancer, request).await;

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-upstream"], "only");
    assert_eq!(body_text(response).await, "short and stout");
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_dead_worker_is_not_skipped() {
    let live = upstream("live").await;
    let balancer = Arc::new(Balancer::new(vec![dead_address(), *live.address()], None).unwrap());

    let first = get(&balancer, "/api/users").await;
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body_text(first).await).unwrap();
    assert_eq!(body, json!({"message": "Internal Server Error"}));

    let second = get(&balancer, "/api/users").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_text(second).await, "live");

    // The failed slot stays in rotation.
    let third = get(&balancer, "/api/users").await;
    assert_eq!(third.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_proxy_timeout_yields_500() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let balancer = Arc::new(
        Balancer::new(vec![*server.address()], Some(Duration::from_millis(200))).unwrap(),
    );

    let response = get(&balancer, "/api/users").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
