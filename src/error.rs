use axum::http::StatusCode;
use serde_json::error::Category;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
  #[error("token request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("token endpoint returned {status}: {body}")]
  Rejected { status: u16, body: String },

  #[error("keyring lookup failed: {0}")]
  Keyring(#[from] keyring::Error),

  #[error("credential lookup task failed: {0}")]
  Lookup(#[from] tokio::task::JoinError),

  #[error("credential is empty")]
  Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
  #[error("userQuery cannot be empty")]
  Validation,

  #[error("token acquisition failed: {0}")]
  Auth(#[from] AuthError),

  #[error("upstream {step} failed: {reason}")]
  Upstream { step: &'static str, reason: String },

  #[error("agent run did not finish within {waited_secs}s")]
  Timeout { waited_secs: u64 },

  #[error("agent run {status}: {message}")]
  RunFailed { status: String, message: String },

  #[error("internal error: {0}")]
  Internal(String),
}

impl ChatError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      ChatError::Validation => StatusCode::BAD_REQUEST,
      ChatError::Upstream { .. } => StatusCode::BAD_GATEWAY,
      ChatError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
      ChatError::Auth(_) | ChatError::RunFailed { .. } | ChatError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ChatError::Validation => "invalid_request",
      ChatError::Auth(_) => "auth_failed",
      ChatError::Upstream { .. } => "upstream_unavailable",
      ChatError::Timeout { .. } => "agent_timeout",
      ChatError::RunFailed { .. } => "agent_run_failed",
      ChatError::Internal(_) => "internal_error",
    }
  }

  /// Coarse message safe to return to callers; upstream detail stays in the logs.
  pub fn public_message(&self) -> &'static str {
    match self {
      ChatError::Validation => "userQuery cannot be empty",
      ChatError::Upstream { .. } => "Failed to connect to Azure agent",
      ChatError::Timeout { .. } => "Agent timed out",
      ChatError::Auth(_) | ChatError::RunFailed { .. } | ChatError::Internal(_) => {
        "Internal server error"
      }
    }
  }

  pub(crate) fn upstream(step: &'static str, err: reqwest::Error) -> Self {
    ChatError::Upstream {
      step,
      reason: err.to_string(),
    }
  }

  /// A body that is not JSON at all counts as a broken upstream; well-formed JSON
  /// with the wrong shape is ours to report.
  pub(crate) fn decode(step: &'static str, err: serde_json::Error) -> Self {
    match err.classify() {
      Category::Data => ChatError::Internal(format!("{step}: unexpected response shape: {err}")),
      Category::Syntax | Category::Eof | Category::Io => ChatError::Upstream {
        step,
        reason: format!("response is not JSON: {err}"),
      },
    }
  }
}
