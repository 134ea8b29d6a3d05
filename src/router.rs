use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::chat::ChatService;
use crate::error::ChatError;
use crate::models::{ChatRequest, HealthResponse};

pub const SERVICE_NAME: &str = "Azure AI Foundry Chat API";

pub struct RouterState {
  pub chat: ChatService,
}

pub fn build_router(state: RouterState) -> Router {
  Router::new()
    .route("/", get(health))
    .route("/chat", post(chat))
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any),
    )
    .with_state(Arc::new(state))
}

pub async fn run_router(listener: TcpListener, state: RouterState) -> anyhow::Result<()> {
  let app = build_router(state);
  info!(addr = %listener.local_addr()?, "listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(err) = tokio::signal::ctrl_c().await {
    warn!(error = %err, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "ok".to_string(),
    service: SERVICE_NAME.to_string(),
    ready: true,
  })
}

async fn chat(
  State(state): State<Arc<RouterState>>,
  payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
  let req = match payload {
    Ok(Json(req)) => req,
    Err(rejection) => {
      warn!(error = %rejection, "rejected chat body");
      return error_response(StatusCode::BAD_REQUEST, "invalid_request", &rejection.body_text());
    }
  };

  match state.chat.handle_chat(req).await {
    Ok(res) => (StatusCode::OK, Json(res)).into_response(),
    Err(err) => chat_error_response(&err),
  }
}

fn chat_error_response(err: &ChatError) -> Response {
  error_response(err.status_code(), err.code(), err.public_message())
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
  let body = Json(serde_json::json!({ "detail": message, "code": code }));
  (status, body).into_response()
}
