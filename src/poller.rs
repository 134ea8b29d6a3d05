use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PollingConfig;
use crate::error::ChatError;
use crate::foundry::AgentsApi;
use crate::models::RunStatus;

#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
  pub interval: Duration,
  pub max_wait: Duration,
}

impl From<&PollingConfig> for PollSettings {
  fn from(config: &PollingConfig) -> Self {
    Self {
      interval: config.interval(),
      max_wait: config.max_wait(),
    }
  }
}

impl Default for PollSettings {
  fn default() -> Self {
    PollSettings::from(&PollingConfig::default())
  }
}

/// Polls a run at a fixed interval until it reaches a terminal status.
///
/// The ceiling is checked before every fetch, so no status request is issued
/// once `max_wait` has elapsed. The sleep yields to the runtime.
pub async fn await_completion(
  api: &dyn AgentsApi,
  thread_id: &str,
  run_id: &str,
  settings: PollSettings,
) -> Result<(), ChatError> {
  let started = Instant::now();
  let mut polls = 0u32;

  loop {
    if started.elapsed() > settings.max_wait {
      warn!(thread_id, run_id, polls, "agent run exceeded poll ceiling");
      return Err(ChatError::Timeout {
        waited_secs: settings.max_wait.as_secs(),
      });
    }

    let state = api.get_run(thread_id, run_id).await?;
    polls += 1;

    if state.status.is_terminal() {
      if state.status != RunStatus::Completed {
        let message = state
          .error
          .and_then(|e| e.message)
          .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ChatError::RunFailed {
          status: state.status.as_str().to_string(),
          message,
        });
      }
      debug!(thread_id, run_id, polls, "agent run completed");
      return Ok(());
    }

    tokio::time::sleep(settings.interval).await;
  }
}
