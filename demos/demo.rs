use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use request_snapshot::{
    LogEmitter, MultiHandler, OutputFormat, RequestId, RequestLoggerConfig, RequestLoggerLayer,
    TracingHandler,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, RwLock},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// In-memory user store standing in for a real repository
#[derive(Debug, Clone, Default)]
struct AppState {
    users: Arc<RwLock<HashMap<String, User>>>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn not_found(id: &str, request_id: &RequestId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": format!("user {id} not found"),
            "request_id": request_id,
        })),
    )
        .into_response()
}

async fn health_check(request_id: RequestId) -> Json<Value> {
    Json(json!({
        "message": "API is running",
        "request_id": request_id,
        "timestamp": now(),
    }))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request_id: RequestId,
) -> Response {
    let users = state.users.read().unwrap_or_else(|e| e.into_inner());
    match users.get(&id) {
        Some(user) => Json(json!({
            "user_id": user.id,
            "request_id": request_id,
            "message": "User retrieved successfully",
            "timestamp": now(),
        }))
        .into_response(),
        None => not_found(&id, &request_id),
    }
}

async fn create_user(State(state): State<AppState>, request_id: RequestId) -> Response {
    let created = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: created,
        updated_at: created,
    };
    state
        .users
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .insert(user.id.clone(), user.clone());

    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user_id": user.id,
            "request_id": request_id,
            "timestamp": now(),
        })),
    )
        .into_response()
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request_id: RequestId,
) -> Response {
    let mut users = state.users.write().unwrap_or_else(|e| e.into_inner());
    match users.get_mut(&id) {
        Some(user) => {
            user.updated_at = Utc::now();
            Json(json!({
                "user_id": user.id,
                "request_id": request_id,
                "message": "User updated successfully",
                "timestamp": now(),
            }))
            .into_response()
        }
        None => not_found(&id, &request_id),
    }
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request_id: RequestId,
) -> Response {
    let removed = state
        .users
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&id);
    match removed {
        Some(_) => Json(json!({
            "message": "User deleted successfully",
            "user_id": id,
            "request_id": request_id,
            "timestamp": now(),
        }))
        .into_response(),
        None => not_found(&id, &request_id),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "request-snapshot-demo".into());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let json_output = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let format = if json_output {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let handler = MultiHandler::new()
        .with(LogEmitter::stdout().with_format(format))
        .with(TracingHandler);

    let app = Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/user", axum::routing::post(create_user))
        .route(
            "/api/v1/user/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(AppState::default())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestLoggerLayer::new(
                    RequestLoggerConfig::default(),
                    handler,
                ))
                .into_inner(),
        );

    info!("Demo server endpoints:");
    info!("  GET    /api/v1/health     - Health check");
    info!("  POST   /api/v1/user       - Create a user");
    info!("  GET    /api/v1/user/{{id}}  - Fetch a user");
    info!("  PUT    /api/v1/user/{{id}}  - Touch a user");
    info!("  DELETE /api/v1/user/{{id}}  - Delete a user");
    info!("");
    info!("Try these commands:");
    info!("  curl http://localhost:{port}/api/v1/health");
    info!("  curl -H 'Authorization: Bearer secret' http://localhost:{port}/api/v1/health?verbose=1");
    info!("  curl -X POST http://localhost:{port}/api/v1/user");

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Starting {app_name} on port {port}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
