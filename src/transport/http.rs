//! Thin HTTP/WebSocket adapter over the query engine (spec.md §6). The wire
//! shapes here — REST endpoints plus a `/ws` message protocol — match the
//! reference transport's contract; everything interesting happens in
//! `core::query`/`core::manager`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Router, http::Request};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::core::manager::IndexManager;
use crate::daemon_config::DaemonConfig;
use crate::error::SemadexError;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<IndexManager>,
    pub config: Arc<DaemonConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let requires_auth = state.config.requires_auth();

    let mut router = Router::new()
        .route("/api/indexes", get(list_indexes))
        .route("/api/indexes/active", post(switch_active_index))
        .route("/api/query", get(query))
        .route("/ws", get(ws_upgrade));

    if requires_auth {
        router = router.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
    }

    router
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(state)
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let expected = match &state.config.auth {
        Some(key) => key,
        None => return next.run(request).await,
    };
    let provided = headers.get("X-API-Key").and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        next.run(request).await
    } else {
        error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid API key")
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "active_index": state.manager.active_name(),
        "indexes": state.manager.names(),
    }))
}

async fn list_indexes(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "indexes": state.manager.list_info() }))
}

#[derive(Deserialize)]
struct SwitchIndexBody {
    index: String,
}

async fn switch_active_index(
    State(state): State<AppState>,
    Json(body): Json<SwitchIndexBody>,
) -> Response {
    match state.manager.switch_to(&body.index) {
        Ok(_) => Json(json!({ "active_index": body.index })).into_response(),
        Err(e) => semadex_error_response(&e),
    }
}

#[derive(Deserialize)]
struct QueryParams {
    q: String,
    #[serde(default = "default_top_k")]
    k: usize,
    index: Option<String>,
    #[serde(rename = "type")]
    type_tag: Option<String>,
    #[serde(default = "default_expand")]
    expand: bool,
    expand_depth: Option<usize>,
    min_score: Option<f32>,
}

fn default_top_k() -> usize {
    10
}

fn default_expand() -> bool {
    true
}

async fn query(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    let loaded = match state
        .manager
        .ensure_loaded(params.index.as_deref().or(state.config.default_index.as_deref()))
    {
        Ok(l) => l,
        Err(e) => return semadex_error_response(&e),
    };
    let engine = loaded.query_engine(state.manager.embedder());
    match engine.query(
        &params.q,
        params.k,
        params.type_tag.as_deref(),
        params.expand,
        params.expand_depth,
        params.min_score,
    ) {
        Ok(result) => Json(result).into_response(),
        Err(e) => semadex_error_response(&e),
    }
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsRequest {
    Query {
        id: Option<String>,
        q: String,
        #[serde(default = "default_top_k")]
        k: usize,
        index: Option<String>,
        #[serde(rename = "type")]
        type_tag: Option<String>,
        #[serde(default = "default_expand")]
        expand: bool,
        expand_depth: Option<usize>,
        min_score: Option<f32>,
    },
    ListIndexes {
        id: Option<String>,
    },
    SwitchIndex {
        id: Option<String>,
        index: String,
    },
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };

        let reply = match serde_json::from_str::<WsRequest>(&text) {
            Ok(req) => handle_ws_request(&state, req),
            Err(e) => json!({
                "type": "error",
                "code": "INVALID_REQUEST",
                "message": format!("Invalid JSON: {e}"),
            }),
        };

        if socket.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }
}

fn handle_ws_request(state: &AppState, req: WsRequest) -> serde_json::Value {
    match req {
        WsRequest::ListIndexes { id } => json!({
            "type": "index_list",
            "id": id,
            "indexes": state.manager.list_info(),
        }),
        WsRequest::SwitchIndex { id, index } => match state.manager.switch_to(&index) {
            Ok(_) => json!({ "type": "index_switched", "id": id, "index": index }),
            Err(e) => ws_error(id, &e),
        },
        WsRequest::Query {
            id,
            q,
            k,
            index,
            type_tag,
            expand,
            expand_depth,
            min_score,
        } => {
            let loaded = match state
                .manager
                .ensure_loaded(index.as_deref().or(state.config.default_index.as_deref()))
            {
                Ok(l) => l,
                Err(e) => return ws_error(id, &e),
            };
            let engine = loaded.query_engine(state.manager.embedder());
            match engine.query(&q, k, type_tag.as_deref(), expand, expand_depth, min_score) {
                Ok(result) => json!({ "type": "query_result", "id": id, "result": result }),
                Err(e) => ws_error(id, &e),
            }
        }
    }
}

fn ws_error(id: Option<String>, err: &SemadexError) -> serde_json::Value {
    json!({
        "type": "error",
        "id": id,
        "code": err.kind(),
        "message": err.to_string(),
    })
}

fn semadex_error_response(err: &SemadexError) -> Response {
    let status = match err.kind() {
        "INVALID_REQUEST" => StatusCode::BAD_REQUEST,
        "UNKNOWN_INDEX" | "INDEX_NOT_LOADED" => StatusCode::NOT_FOUND,
        "EMBEDDER_FAILURE" | "IO_FAILURE" | "CORRUPT_ARTIFACT" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.kind(), &err.to_string())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "code": code, "message": message }))).into_response()
}

/// Eagerly load the configured default index and run one dummy query so the
/// first real client request isn't the one paying for cold load + embedder
/// warmup.
pub async fn warmup(state: &AppState) {
    let Some(name) = state.config.default_index.clone() else {
        return;
    };
    match state.manager.switch_to(&name) {
        Ok(loaded) => {
            let engine = loaded.query_engine(state.manager.embedder());
            let _ = engine.query("warmup", 1, None, false, None, None);
            info!(index = %name, "warmed up default index");
        }
        Err(e) => warn!(index = %name, error = %e, "failed to warm up default index"),
    }
}
