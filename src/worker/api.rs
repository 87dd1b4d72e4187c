//! HTTP routes served by every worker
//!
//! | Method | Path              | Success | Failure            |
//! |--------|-------------------|---------|--------------------|
//! | GET    | `/api/users`      | 200     | -                  |
//! | GET    | `/api/users/{id}` | 200     | 400, 404           |
//! | POST   | `/api/users`      | 201     | 400                |
//! | PUT    | `/api/users/{id}` | 200     | 400, 404           |
//! | DELETE | `/api/users/{id}` | 204     | 400, 404           |
//! | OPTIONS| any               | 204     | -                  |
//!
//! Anything else is a 404. Paths are matched with their query string, so
//! `/api/users?x=1` is a 404 and `/api/users/{id}?x=1` carries an invalid id.
//! A body that is not valid JSON is treated as an empty object, so it fails
//! body validation with `Invalid user body`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::protocol::{Command, Outcome, Payload, StoreFault, StoreResponse};
use crate::store::{is_valid_user_id, User, UserData};

use super::executor::{CommandExecutor, ExecuteError};

pub const USERS_ROUTE: &str = "/api/users";
pub const USER_ROUTE: &str = "/api/users/{id}";

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Shared handler state
pub type ExecutorState = Arc<dyn CommandExecutor>;

// ============================================================================
// Errors
// ============================================================================

/// Request failures, each rendered as a fixed status and message
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid userId")]
    InvalidUserId,

    #[error("Invalid user body")]
    InvalidUserBody,

    #[error("User not found")]
    UserNotFound,

    #[error("Not found")]
    NotFound,

    /// Detail is logged, never sent to the client
    #[error("Internal Server Error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUserId | Self::InvalidUserBody => StatusCode::BAD_REQUEST,
            Self::UserNotFound | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreFault> for ApiError {
    fn from(fault: StoreFault) -> Self {
        match fault {
            StoreFault::InvalidUserId => Self::InvalidUserId,
            StoreFault::InternalServerError => {
                Self::Internal("store reported an internal fault".to_string())
            }
        }
    }
}

impl From<ExecuteError> for ApiError {
    fn from(err: ExecuteError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Error body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }

        let body = MessageResponse {
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the worker router
pub fn create_router(executor: ExecutorState) -> Router {
    Router::new()
        .route(USERS_ROUTE, any(users_collection))
        .route(USER_ROUTE, any(user_item))
        .fallback(fallback)
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(middleware::from_fn(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(executor)
}

/// Answer OPTIONS on any path with an empty 204
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(request).await
}

async fn fallback() -> ApiError {
    ApiError::NotFound
}

// ============================================================================
// Handlers
// ============================================================================

async fn users_collection(
    State(executor): State<ExecutorState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    if uri.query().is_some() {
        return Err(ApiError::NotFound);
    }

    match method {
        Method::GET => {
            let users = expect_list(executor.execute(Command::GetAll).await?)?;
            Ok((StatusCode::OK, Json(users)).into_response())
        }
        Method::POST => {
            let data = parse_user_body(&body)?;
            let user = expect_record(executor.execute(Command::Create { data }).await?)?;
            Ok((StatusCode::CREATED, Json(user)).into_response())
        }
        _ => Err(ApiError::NotFound),
    }
}

async fn user_item(
    State(executor): State<ExecutorState>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = match uri.query() {
        Some(query) => format!("{id}?{query}"),
        None => id,
    };

    match method {
        Method::GET => {
            let user = expect_record(executor.execute(Command::GetById { id }).await?)?;
            Ok((StatusCode::OK, Json(user)).into_response())
        }
        Method::PUT => {
            // The body is checked here, before the store sees the id, so the
            // id has to be checked first to keep its error taking precedence.
            if !is_valid_user_id(&id) {
                return Err(ApiError::InvalidUserId);
            }
            let data = parse_user_body(&body)?;
            let user = expect_record(executor.execute(Command::Update { id, data }).await?)?;
            Ok((StatusCode::OK, Json(user)).into_response())
        }
        Method::DELETE => {
            expect_record(executor.execute(Command::Delete { id }).await?)?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        _ => Err(ApiError::NotFound),
    }
}

/// Parse and validate a user body, substituting `{}` for unparseable input
fn parse_user_body(body: &[u8]) -> Result<UserData, ApiError> {
    let value = serde_json::from_slice::<serde_json::Value>(body)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()));

    UserData::from_json(value).ok_or(ApiError::InvalidUserBody)
}

fn expect_record(response: StoreResponse) -> Result<User, ApiError> {
    match response.into_outcome() {
        Outcome::Found(Payload::Record(user)) => Ok(user),
        Outcome::Found(Payload::List(_)) => {
            Err(ApiError::Internal("expected a record, store sent a list".to_string()))
        }
        Outcome::Missing => Err(ApiError::UserNotFound),
        Outcome::Rejected(fault) => Err(fault.into()),
    }
}

fn expect_list(response: StoreResponse) -> Result<Vec<User>, ApiError> {
    match response.into_outcome() {
        Outcome::Found(Payload::List(users)) => Ok(users),
        Outcome::Found(Payload::Record(_)) | Outcome::Missing => {
            Err(ApiError::Internal("expected a list from the store".to_string()))
        }
        Outcome::Rejected(fault) => Err(fault.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
