use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
  #[serde(default)]
  pub user_query: String,
  pub context: Option<String>,
  pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatResponse {
  pub answer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
  pub status: String,
  pub service: String,
  pub ready: bool,
}

// Wire types for the Foundry agents threads API.

#[derive(Deserialize, Debug)]
pub struct Created {
  pub id: String,
}

#[derive(Serialize, Debug)]
pub struct NewMessage<'a> {
  pub role: &'a str,
  pub content: &'a str,
}

#[derive(Serialize, Debug)]
pub struct NewRun<'a> {
  pub assistant_id: &'a str,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Queued,
  InProgress,
  RequiresAction,
  Cancelling,
  Completed,
  Failed,
  Cancelled,
  Expired,
  #[serde(other)]
  Unknown,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
    )
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RunStatus::Queued => "queued",
      RunStatus::InProgress => "in_progress",
      RunStatus::RequiresAction => "requires_action",
      RunStatus::Cancelling => "cancelling",
      RunStatus::Completed => "completed",
      RunStatus::Failed => "failed",
      RunStatus::Cancelled => "cancelled",
      RunStatus::Expired => "expired",
      RunStatus::Unknown => "unknown",
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
pub struct RunError {
  pub message: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RunState {
  #[serde(default = "unknown_status", deserialize_with = "status_or_unknown")]
  pub status: RunStatus,
  pub error: Option<RunError>,
}

fn unknown_status() -> RunStatus {
  RunStatus::Unknown
}

// `"status": null` reads as a run we cannot classify yet, not a broken payload.
fn status_or_unknown<'de, D>(deserializer: D) -> Result<RunStatus, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<RunStatus>::deserialize(deserializer)?.unwrap_or(RunStatus::Unknown))
}

#[derive(Deserialize, Debug, Default)]
pub struct MessageList {
  #[serde(default)]
  pub data: Vec<ThreadMessage>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ThreadMessage {
  #[serde(default)]
  pub role: String,
  #[serde(default)]
  pub content: Vec<ContentBlock>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ContentBlock {
  pub text: Option<TextContent>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TextContent {
  pub value: Option<String>,
}
