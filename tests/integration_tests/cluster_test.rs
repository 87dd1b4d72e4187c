//! Full cluster tests
//!
//! Each test starts a coordinator with in-process workers on its own port
//! range and talks to it over real HTTP:
//! 1. CRUD through the balancer against the shared store
//! 2. Concurrent creates from different workers
//! 3. Status codes for bad ids, unknown ids and bad bodies

use reqwest::StatusCode;
use serde_json::Value;

use super::fixtures::{
    client, TestCluster, ALICE_JSON, ALICE_RENAMED_JSON, MALFORMED_JSON, MISSING_FIELD_JSON,
    UNKNOWN_ID,
};

async fn json(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

// ============================================================================
// CRUD Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crud_through_balancer() {
    let cluster = TestCluster::start(2, 38_510).await;
    let http = client();

    let created = http
        .post(cluster.url("/api/users"))
        .header("content-type", "application/json")
        .body(ALICE_JSON)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(created.headers()["access-control-allow-origin"], "*");
    let created = json(created).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["username"], "alice");
    assert_eq!(created["hobbies"], serde_json::json!(["chess", "go"]));

    // The next request lands on the other worker and still sees the record.
    let fetched = http
        .get(cluster.url(&format!("/api/users/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json(fetched).await, created);

    let listed = json(http.get(cluster.url("/api/users")).send().await.unwrap()).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let updated = http
        .put(cluster.url(&format!("/api/users/{id}")))
        .body(ALICE_RENAMED_JSON)
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = json(updated).await;
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["username"], "alice2");
    assert_eq!(updated["age"], 31);

    let deleted = http
        .delete(cluster.url(&format!("/api/users/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = http
        .get(cluster.url(&format!("/api/users/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(gone).await["message"], "User not found");

    cluster.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_workers_share_one_store() {
    let cluster = TestCluster::start(3, 38_520).await;
    let http = client();

    // Bypass the balancer: create on worker 0, read on worker 2.
    let created = http
        .post(cluster.worker_url(0, "/api/users"))
        .body(ALICE_JSON)
        .send()
        .await
        .unwrap();
    let id = json(created).await["id"].as_str().unwrap().to_string();

    let fetched = http
        .get(cluster.worker_url(2, &format!("/api/users/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json(fetched).await["username"], "alice");

    cluster.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_creates_get_distinct_ids() {
    let cluster = TestCluster::start(2, 38_530).await;
    let http = client();

    let requests = (0..20).map(|_| {
        let http = http.clone();
        let url = cluster.url("/api/users");
        async move { http.post(url).body(ALICE_JSON).send().await.unwrap() }
    });
    let responses = futures::future::join_all(requests).await;

    let mut ids = Vec::new();
    for response in responses {
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(json(response).await["id"].as_str().unwrap().to_string());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);

    let listed = json(http.get(cluster.url("/api/users")).send().await.unwrap()).await;
    assert_eq!(listed.as_array().unwrap().len(), 20);

    cluster.stop().await;
}

// ============================================================================
// Error Status Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_statuses_through_balancer() {
    let cluster = TestCluster::start(2, 38_540).await;
    let http = client();

    let bad_id = http
        .get(cluster.url("/api/users/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(bad_id).await["message"], "Invalid userId");

    let unknown = http
        .delete(cluster.url(&format!("/api/users/{UNKNOWN_ID}")))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    for body in [MISSING_FIELD_JSON, MALFORMED_JSON] {
        let rejected = http
            .post(cluster.url("/api/users"))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(rejected).await["message"], "Invalid user body");
    }

    // Id errors win over body errors on PUT.
    let put = http
        .put(cluster.url("/api/users/not-a-uuid"))
        .body(MALFORMED_JSON)
        .send()
        .await
        .unwrap();
    assert_eq!(put.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(put).await["message"], "Invalid userId");

    let no_route = http.get(cluster.url("/api/other")).send().await.unwrap();
    assert_eq!(no_route.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(no_route).await["message"], "Not found");

    let preflight = http
        .request(reqwest::Method::OPTIONS, cluster.url("/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);

    cluster.stop().await;
}
