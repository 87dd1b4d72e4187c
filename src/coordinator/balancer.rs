//! Round-robin reverse proxy
//!
//! Every inbound request goes to the next worker in pool order over a fresh
//! upstream connection. Bodies are streamed in both directions. Status and
//! headers from the worker are passed back unchanged; connection-level
//! headers are dropped since they describe a single hop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tracing::debug;

use crate::worker::ApiError;

const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Public-facing load balancer
pub struct Balancer {
    targets: Vec<SocketAddr>,
    cursor: AtomicUsize,
    client: reqwest::Client,
}

impl Balancer {
    /// Balance across `targets` in the given order
    ///
    /// `proxy_timeout` bounds a whole proxied exchange; `None` waits for the
    /// worker indefinitely.
    pub fn new(
        targets: Vec<SocketAddr>,
        proxy_timeout: Option<Duration>,
    ) -> Result<Self, BalancerError> {
        if targets.is_empty() {
            return Err(BalancerError::NoTargets);
        }

        let mut builder = reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = proxy_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(BalancerError::Client)?;

        Ok(Self {
            targets,
            cursor: AtomicUsize::new(0),
            client,
        })
    }

    /// Pick the worker under the cursor and advance it
    pub fn next_target(&self) -> SocketAddr {
        let len = self.targets.len();
        let index = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or_else(|c| c);
        self.targets[index]
    }

    /// Router that proxies every method and path
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(proxy_handler).with_state(self)
    }

    /// Proxy one request; failures become a generic 500 and are not retried
    pub async fn forward(&self, request: Request) -> Response {
        let target = self.next_target();
        debug!(%target, method = %request.method(), uri = %request.uri(), "proxying request");

        match self.proxy(target, request).await {
            Ok(response) => response,
            Err(e) => ApiError::Internal(format!("proxy to {target} failed: {e}")).into_response(),
        }
    }

    async fn proxy(&self, target: SocketAddr, request: Request) -> Result<Response, reqwest::Error> {
        let (parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");

        let upstream = self
            .client
            .request(parts.method, format!("http://{target}{path}"))
            .headers(strip_hop_by_hop(parts.headers))
            .body(reqwest::Body::wrap_stream(body.into_data_stream()))
            .send()
            .await?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers().clone());

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

async fn proxy_handler(State(balancer): State<Arc<Balancer>>, request: Request) -> Response {
    balancer.forward(request).await
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
    headers
}

#[derive(Error, Debug)]
pub enum BalancerError {
    #[error("Balancer needs at least one worker")]
    NoTargets,

    #[error("Failed to build proxy client: {0}")]
    Client(#[source] reqwest::Error),
}
