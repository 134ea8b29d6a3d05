mod auth;
mod chat;
mod config;
mod error;
mod foundry;
mod logger;
mod models;
mod poller;
mod reply;
mod router;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use chat::ChatService;
use config::AppConfig;
use foundry::FoundryClient;
use poller::PollSettings;
use router::{run_router, RouterState};

#[tokio::main]
async fn main() {
  if let Err(err) = run().await {
    error!("fatal: {err:#}");
    eprintln!("foundry-relay: {err:#}");
    std::process::exit(1);
  }
}

async fn run() -> anyhow::Result<()> {
  let config = AppConfig::load()?;
  logger::init(&config.logging)?;

  info!(
    endpoint = %config.foundry.endpoint,
    project = %config.foundry.project,
    agent_id = %config.foundry.agent_id,
    "setting up Azure authentication"
  );
  let tokens = auth::from_config(&config.auth, config.http.request_timeout())?;
  tokens
    .token()
    .await
    .with_context(|| format!("initial token acquisition via {} failed", tokens.name()))?;
  info!(source = tokens.name(), "Azure authentication ready");

  let client = FoundryClient::new(&config.foundry, &config.http, tokens)?;
  let state = RouterState {
    chat: ChatService::new(Arc::new(client), PollSettings::from(&config.polling)),
  };

  let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
    .await
    .with_context(|| format!("binding {}", config.server.bind_addr))?;
  run_router(listener, state).await
}
