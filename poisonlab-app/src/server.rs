use axum::extract::{Request, State};
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use poisonlab_core::{AgentRelay, ChatOutcome, RelayError};
use poisonlab_policy::Variant;
use poisonlab_tools::{ToolInfo, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

pub const SECURITY_FEATURES: [&str; 5] = [
    "strict_cors",
    "security_headers",
    "path_allowlisting",
    "audit_logging",
    "no_tool_poisoning",
];

const SECURITY_HEADERS: [(HeaderName, &str); 7] = [
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'self'; frame-ancestors 'none'",
    ),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
    (header::PRAGMA, "no-cache"),
];

const PREFLIGHT_MAX_AGE: &str = "600";

#[derive(Clone)]
pub struct AppState {
    pub variant: Variant,
    pub registry: Arc<ToolRegistry>,
    pub relay: Arc<AgentRelay>,
    pub cors_origins: Arc<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Chat request failed: {}", self);
        let body = Json(json!({ "detail": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/chat", post(chat))
        .route("/tools", get(list_tools))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), cors));

    if state.variant.is_secure() {
        app = app.layer(middleware::from_fn(security_headers));
    }

    app.with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let outcome = state.relay.run(&request.message).await?;
    info!("Chat answered; tools called: {:?}", outcome.tools_called);
    Ok(Json(outcome))
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.registry.list(),
    })
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let mut body = json!({
        "status": "healthy",
        "version": state.variant.as_str(),
        "tools": state.registry.count(),
    });
    if state.variant.is_secure() {
        body["security_features"] = json!(SECURITY_FEATURES);
    }
    Json(body)
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Secure: only configured origins, `GET`/`POST`, `Content-Type`, no
/// credentials. Vulnerable: reflects any origin and allows credentials.
async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(origin) = request.headers().get(header::ORIGIN).cloned() else {
        return next.run(request).await;
    };

    let allowed = match state.variant {
        Variant::Vulnerable => true,
        Variant::Secure => origin
            .to_str()
            .map(|origin| state.cors_origins.iter().any(|allowed| allowed == origin))
            .unwrap_or(false),
    };

    let preflight = request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    if !preflight {
        let mut response = next.run(request).await;
        if allowed {
            allow_origin(response.headers_mut(), origin, state.variant);
        }
        return response;
    }

    if !allowed {
        debug!("Rejected preflight from {:?}", origin);
        return (StatusCode::BAD_REQUEST, "Disallowed CORS origin").into_response();
    }

    let requested_headers = request
        .headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned();

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    match state.variant {
        Variant::Secure => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            );
        }
        Variant::Vulnerable => {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("DELETE, GET, HEAD, OPTIONS, PATCH, POST, PUT"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                requested_headers.unwrap_or_else(|| HeaderValue::from_static("*")),
            );
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
    allow_origin(headers, origin, state.variant);
    response
}

fn allow_origin(headers: &mut HeaderMap, origin: HeaderValue, variant: Variant) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    if !variant.is_secure() {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}
