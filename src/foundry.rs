use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::TokenSource;
use crate::config::{FoundryConfig, HttpConfig};
use crate::error::ChatError;
use crate::models::{Created, MessageList, NewMessage, NewRun, RunState, ThreadMessage};

/// The remote thread/run protocol. None of these calls are idempotent.
#[async_trait]
pub trait AgentsApi: Send + Sync {
  async fn create_thread(&self) -> Result<String, ChatError>;

  async fn send_message(&self, thread_id: &str, content: &str) -> Result<(), ChatError>;

  async fn start_run(&self, thread_id: &str) -> Result<String, ChatError>;

  async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunState, ChatError>;

  async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatError>;
}

pub struct FoundryClient {
  http: reqwest::Client,
  threads_url: String,
  api_version: String,
  agent_id: String,
  tokens: Arc<dyn TokenSource>,
}

impl FoundryClient {
  pub fn new(
    foundry: &FoundryConfig,
    http: &HttpConfig,
    tokens: Arc<dyn TokenSource>,
  ) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(http.request_timeout())
      .connect_timeout(http.request_timeout())
      .build()?;
    Ok(Self {
      http: client,
      threads_url: foundry.threads_url(),
      api_version: foundry.api_version.clone(),
      agent_id: foundry.agent_id.clone(),
      tokens,
    })
  }

  // A fresh token per call; the credential may have rolled over since the last one.
  async fn headers(&self) -> Result<HeaderMap, ChatError> {
    let token = self.tokens.token().await?;
    let mut headers = HeaderMap::new();
    headers.insert(
      AUTHORIZATION,
      HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|err| ChatError::Internal(format!("invalid bearer token: {err}")))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.threads_url, path)
  }

  async fn send(
    &self,
    step: &'static str,
    req: reqwest::RequestBuilder,
  ) -> Result<reqwest::Response, ChatError> {
    let resp = req
      .headers(self.headers().await?)
      .query(&[("api-version", self.api_version.as_str())])
      .send()
      .await
      .map_err(|err| ChatError::upstream(step, err))?;

    if !resp.status().is_success() {
      let upstream_status = resp.status();
      let text = resp.text().await.unwrap_or_default();
      return Err(ChatError::Upstream {
        step,
        reason: format!("Foundry error ({}): {}", upstream_status, text),
      });
    }
    debug!(step, status = %resp.status(), "foundry call ok");
    Ok(resp)
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    step: &'static str,
    req: reqwest::RequestBuilder,
  ) -> Result<T, ChatError> {
    let body = self
      .send(step, req)
      .await?
      .bytes()
      .await
      .map_err(|err| ChatError::upstream(step, err))?;
    serde_json::from_slice(&body).map_err(|err| ChatError::decode(step, err))
  }
}

#[async_trait]
impl AgentsApi for FoundryClient {
  async fn create_thread(&self) -> Result<String, ChatError> {
    let req = self.http.post(self.url("")).json(&serde_json::json!({}));
    let created: Created = self.send_json("create_thread", req).await?;
    Ok(created.id)
  }

  async fn send_message(&self, thread_id: &str, content: &str) -> Result<(), ChatError> {
    let req = self
      .http
      .post(self.url(&format!("/{thread_id}/messages")))
      .json(&NewMessage {
        role: "user",
        content,
      });
    self.send("send_message", req).await?;
    Ok(())
  }

  async fn start_run(&self, thread_id: &str) -> Result<String, ChatError> {
    let req = self
      .http
      .post(self.url(&format!("/{thread_id}/runs")))
      .json(&NewRun {
        assistant_id: &self.agent_id,
      });
    let created: Created = self.send_json("start_run", req).await?;
    Ok(created.id)
  }

  async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunState, ChatError> {
    let req = self.http.get(self.url(&format!("/{thread_id}/runs/{run_id}")));
    self.send_json("get_run", req).await
  }

  async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ChatError> {
    let req = self.http.get(self.url(&format!("/{thread_id}/messages")));
    let list: MessageList = self.send_json("list_messages", req).await?;
    Ok(list.data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::StaticToken;
  use crate::error::AuthError;
  use crate::models::RunStatus;
  use axum::extract::{Path, Query};
  use axum::http::StatusCode;
  use axum::routing::{get, post};
  use axum::{Json, Router};
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct CountingToken {
    calls: AtomicUsize,
  }

  #[async_trait]
  impl TokenSource for CountingToken {
    fn name(&self) -> &'static str {
      "counting"
    }

    async fn token(&self) -> Result<String, AuthError> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
      Ok(format!("tok-{n}"))
    }
  }

  struct FailingToken;

  #[async_trait]
  impl TokenSource for FailingToken {
    fn name(&self) -> &'static str {
      "failing"
    }

    async fn token(&self) -> Result<String, AuthError> {
      Err(AuthError::Empty)
    }
  }

  fn check(headers: &axum::http::HeaderMap, q: &HashMap<String, String>) {
    assert!(headers
      .get("authorization")
      .and_then(|v| v.to_str().ok())
      .map(|v| v.starts_with("Bearer tok-"))
      .unwrap_or(false));
    assert_eq!(q.get("api-version").map(String::as_str), Some("2025-05-01"));
  }

  fn fake_foundry() -> Router {
    let base = "/api/projects/demo/threads";
    Router::new()
      .route(
        base,
        post(|headers: axum::http::HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
          check(&headers, &q);
          Json(serde_json::json!({ "id": "thread_1", "object": "thread" }))
        }),
      )
      .route(
        &format!("{base}/:thread/messages"),
        post(
          |Path(thread): Path<String>,
           headers: axum::http::HeaderMap,
           Query(q): Query<HashMap<String, String>>,
           Json(body): Json<serde_json::Value>| async move {
            check(&headers, &q);
            assert_eq!(thread, "thread_1");
            assert_eq!(body["role"], "user");
            assert_eq!(body["content"], "What is the return policy?");
            Json(serde_json::json!({ "id": "msg_1" }))
          },
        )
        .get(|Path(thread): Path<String>| async move {
          assert_eq!(thread, "thread_1");
          Json(serde_json::json!({
            "data": [
              { "role": "assistant", "content": [{ "type": "text", "text": { "value": "Returns accepted within 30 days." } }] },
              { "role": "user", "content": [{ "type": "text", "text": { "value": "What is the return policy?" } }] }
            ]
          }))
        }),
      )
      .route(
        &format!("{base}/:thread/runs"),
        post(|Json(body): Json<serde_json::Value>| async move {
          assert_eq!(body["assistant_id"], "asst_1");
          Json(serde_json::json!({ "id": "run_1", "status": "queued" }))
        }),
      )
      .route(
        &format!("{base}/:thread/runs/:run"),
        get(|Path((thread, run)): Path<(String, String)>| async move {
          assert_eq!((thread.as_str(), run.as_str()), ("thread_1", "run_1"));
          Json(serde_json::json!({ "id": "run_1", "status": "completed" }))
        }),
      )
  }

  async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
  }

  fn client(endpoint: String, tokens: Arc<dyn TokenSource>) -> FoundryClient {
    client_with(endpoint, tokens, &HttpConfig::default())
  }

  fn client_with(endpoint: String, tokens: Arc<dyn TokenSource>, http: &HttpConfig) -> FoundryClient {
    let foundry = FoundryConfig {
      endpoint,
      project: "demo".to_string(),
      agent_id: "asst_1".to_string(),
      ..FoundryConfig::default()
    };
    FoundryClient::new(&foundry, http, tokens).unwrap()
  }

  async fn create_thread_against(body: &'static str) -> ChatError {
    let app = Router::new().route(
      "/api/projects/demo/threads",
      post(move || async move { ([("content-type", "application/json")], body) }),
    );
    let endpoint = serve(app).await;
    let foundry = client(endpoint, Arc::new(StaticToken::new("tok-x")));
    foundry.create_thread().await.unwrap_err()
  }

  #[tokio::test]
  async fn walks_the_thread_protocol_with_fresh_tokens() {
    let endpoint = serve(fake_foundry()).await;
    let tokens = Arc::new(CountingToken {
      calls: AtomicUsize::new(0),
    });
    let foundry = client(endpoint, tokens.clone());

    let thread = foundry.create_thread().await.unwrap();
    assert_eq!(thread, "thread_1");
    foundry.send_message(&thread, "What is the return policy?").await.unwrap();
    let run = foundry.start_run(&thread).await.unwrap();
    assert_eq!(run, "run_1");
    let state = foundry.get_run(&thread, &run).await.unwrap();
    assert_eq!(state.status, RunStatus::Completed);
    let messages = foundry.list_messages(&thread).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "assistant");

    assert_eq!(tokens.calls.load(Ordering::SeqCst), 5);
  }

  #[tokio::test]
  async fn non_success_status_is_upstream_error() {
    let app = Router::new().route(
      "/api/projects/demo/threads",
      post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let endpoint = serve(app).await;
    let foundry = client(endpoint, Arc::new(StaticToken::new("tok-x")));

    match foundry.create_thread().await {
      Err(ChatError::Upstream { step, reason }) => {
        assert_eq!(step, "create_thread");
        assert!(reason.contains("503"));
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn connection_refused_is_upstream_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let foundry = client(format!("http://{addr}"), Arc::new(StaticToken::new("tok-x")));

    let err = foundry.create_thread().await.unwrap_err();
    assert!(matches!(err, ChatError::Upstream { step: "create_thread", .. }));
  }

  #[tokio::test]
  async fn token_failure_stops_before_the_call() {
    let foundry = client("http://127.0.0.1:9".to_string(), Arc::new(FailingToken));
    let err = foundry.create_thread().await.unwrap_err();
    assert!(matches!(err, ChatError::Auth(AuthError::Empty)));
  }

  #[tokio::test]
  async fn json_without_id_is_internal_error() {
    let err = create_thread_against("{}").await;
    assert!(matches!(err, ChatError::Internal(_)), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[tokio::test]
  async fn non_json_success_body_is_upstream_error() {
    let err = create_thread_against("<html>proxy</html>").await;
    assert!(matches!(err, ChatError::Upstream { step: "create_thread", .. }), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
  }

  #[tokio::test]
  async fn truncated_body_is_upstream_error() {
    let err = create_thread_against(r#"{"id":"thr"#).await;
    assert!(matches!(err, ChatError::Upstream { .. }), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
  }

  #[tokio::test]
  async fn slow_call_hits_per_request_timeout() {
    let app = Router::new().route(
      "/api/projects/demo/threads",
      post(|| async {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Json(serde_json::json!({ "id": "too_late" }))
      }),
    );
    let endpoint = serve(app).await;
    let foundry = client_with(
      endpoint,
      Arc::new(StaticToken::new("tok-x")),
      &HttpConfig {
        request_timeout_secs: 1,
      },
    );

    let started = std::time::Instant::now();
    let err = foundry.create_thread().await.unwrap_err();
    assert!(matches!(err, ChatError::Upstream { step: "create_thread", .. }), "{err:?}");
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    assert!(started.elapsed() < std::time::Duration::from_secs(4));
  }
}
