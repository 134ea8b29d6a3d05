use std::sync::Arc;

use tracing::{debug, error, info, warn, Instrument};

use crate::error::ChatError;
use crate::foundry::AgentsApi;
use crate::models::{ChatRequest, ChatResponse};
use crate::poller::{await_completion, PollSettings};
use crate::reply::extract_latest_assistant_reply;

pub struct ChatService {
  api: Arc<dyn AgentsApi>,
  poll: PollSettings,
}

impl ChatService {
  pub fn new(api: Arc<dyn AgentsApi>, poll: PollSettings) -> Self {
    Self { api, poll }
  }

  /// Runs one query through a fresh thread: create, post, run, poll, read back.
  pub async fn handle_chat(&self, req: ChatRequest) -> Result<ChatResponse, ChatError> {
    let query = req.user_query.trim();
    if query.is_empty() {
      return Err(ChatError::Validation);
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let user_id = req.user_id.as_deref().unwrap_or("anonymous");
    let span = tracing::info_span!("chat", %request_id, user_id);

    async {
      info!(query, "chat query received");
      if let Some(context) = req.context.as_deref() {
        debug!(context, "caller context not forwarded");
      }

      let result = self.run_pipeline(query).await;
      match &result {
        Ok(_) => info!("chat answered"),
        Err(err @ ChatError::RunFailed { .. }) => error!(error = %err, "agent run failed"),
        Err(err @ ChatError::Timeout { .. }) => warn!(error = %err, "agent timed out"),
        Err(err) => error!(error = %err, "chat pipeline failed"),
      }
      result
    }
    .instrument(span)
    .await
  }

  async fn run_pipeline(&self, query: &str) -> Result<ChatResponse, ChatError> {
    let thread_id = self.api.create_thread().await?;
    debug!(%thread_id, "thread created");

    self.api.send_message(&thread_id, query).await?;

    let run_id = self.api.start_run(&thread_id).await?;
    debug!(%thread_id, %run_id, "run started");

    await_completion(self.api.as_ref(), &thread_id, &run_id, self.poll).await?;

    let messages = self.api.list_messages(&thread_id).await?;
    Ok(ChatResponse {
      answer: extract_latest_assistant_reply(&messages),
    })
  }
}
