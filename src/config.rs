use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH_ENV: &str = "FOUNDRY_RELAY_CONFIG";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
  pub foundry: FoundryConfig,
  pub polling: PollingConfig,
  pub http: HttpConfig,
  pub server: ServerConfig,
  pub logging: LoggingConfig,
  pub auth: AuthConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct FoundryConfig {
  pub endpoint: String,
  pub project: String,
  pub agent_id: String,
  pub api_version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PollingConfig {
  pub interval_ms: u64,
  pub max_wait_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct HttpConfig {
  pub request_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
  pub bind_addr: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct LoggingConfig {
  pub file: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthConfig {
  pub scope: String,
  pub authority_host: String,
  pub tenant_id: Option<String>,
  pub client_id: Option<String>,
  #[serde(skip_serializing)]
  pub client_secret: Option<String>,
  #[serde(skip_serializing)]
  pub access_token: Option<String>,
  pub keyring_service: Option<String>,
  pub keyring_user: Option<String>,
}

impl Default for FoundryConfig {
  fn default() -> Self {
    Self {
      endpoint: String::new(),
      project: String::new(),
      agent_id: String::new(),
      api_version: "2025-05-01".to_string(),
    }
  }
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      interval_ms: 1500,
      max_wait_secs: 90,
    }
  }
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      request_timeout_secs: 30,
    }
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_addr: "0.0.0.0:3000".to_string(),
    }
  }
}

impl Default for AuthConfig {
  fn default() -> Self {
    Self {
      scope: "https://ai.azure.com/.default".to_string(),
      authority_host: "https://login.microsoftonline.com".to_string(),
      tenant_id: None,
      client_id: None,
      client_secret: None,
      access_token: None,
      keyring_service: None,
      keyring_user: None,
    }
  }
}

impl FoundryConfig {
  /// Collection URL for agent threads, e.g. `https://x.services.ai.azure.com/api/projects/p/threads`.
  pub fn threads_url(&self) -> String {
    format!(
      "{}/api/projects/{}/threads",
      self.endpoint.trim_end_matches('/'),
      self.project
    )
  }
}

impl PollingConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_millis(self.interval_ms)
  }

  pub fn max_wait(&self) -> Duration {
    Duration::from_secs(self.max_wait_secs)
  }
}

impl HttpConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

impl AppConfig {
  /// Defaults, then the JSON file named by `FOUNDRY_RELAY_CONFIG`, then environment overrides.
  pub fn load() -> anyhow::Result<Self> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
      Ok(path) if !path.trim().is_empty() => load_file(Path::new(path.trim()))?,
      _ => AppConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
  }

  pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get("FOUNDRY_ENDPOINT") {
      self.foundry.endpoint = v;
    }
    if let Some(v) = get("FOUNDRY_PROJECT") {
      self.foundry.project = v;
    }
    if let Some(v) = get("FOUNDRY_AGENT_ID") {
      self.foundry.agent_id = v;
    }
    if let Some(v) = get("FOUNDRY_API_VERSION") {
      self.foundry.api_version = v;
    }
    if let Some(v) = get("FOUNDRY_POLL_INTERVAL_MS") {
      self.polling.interval_ms = parse_number("FOUNDRY_POLL_INTERVAL_MS", &v)?;
    }
    if let Some(v) = get("FOUNDRY_POLL_TIMEOUT_SECS") {
      self.polling.max_wait_secs = parse_number("FOUNDRY_POLL_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = get("FOUNDRY_REQUEST_TIMEOUT_SECS") {
      self.http.request_timeout_secs = parse_number("FOUNDRY_REQUEST_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = get("BIND_ADDR") {
      self.server.bind_addr = v;
    }
    if let Some(v) = get("PORT") {
      let port: u16 = parse_number("PORT", &v)?;
      let host = self
        .server
        .bind_addr
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string());
      self.server.bind_addr = format!("{host}:{port}");
    }
    if let Some(v) = get("LOG_FILE") {
      self.logging.file = Some(v);
    }
    if let Some(v) = get("AZURE_TOKEN_SCOPE") {
      self.auth.scope = v;
    }
    if let Some(v) = get("AZURE_AUTHORITY_HOST") {
      self.auth.authority_host = v;
    }
    if let Some(v) = get("AZURE_TENANT_ID") {
      self.auth.tenant_id = Some(v);
    }
    if let Some(v) = get("AZURE_CLIENT_ID") {
      self.auth.client_id = Some(v);
    }
    if let Some(v) = get("AZURE_CLIENT_SECRET") {
      self.auth.client_secret = Some(v);
    }
    if let Some(v) = get("AZURE_ACCESS_TOKEN") {
      self.auth.access_token = Some(v);
    }
    if let Some(v) = get("FOUNDRY_KEYRING_SERVICE") {
      self.auth.keyring_service = Some(v);
    }
    if let Some(v) = get("FOUNDRY_KEYRING_USER") {
      self.auth.keyring_user = Some(v);
    }
    Ok(())
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    if self.foundry.endpoint.trim().is_empty() {
      bail!("Foundry endpoint not set (FOUNDRY_ENDPOINT).");
    }
    if self.foundry.project.trim().is_empty() {
      bail!("Foundry project not set (FOUNDRY_PROJECT).");
    }
    if self.foundry.agent_id.trim().is_empty() {
      bail!("Foundry agent id not set (FOUNDRY_AGENT_ID).");
    }
    if self.foundry.api_version.trim().is_empty() {
      bail!("Foundry API version is empty.");
    }
    if self.polling.interval_ms == 0 || self.polling.max_wait_secs == 0 {
      bail!("Polling interval and ceiling must be greater than zero.");
    }
    if self.http.request_timeout_secs == 0 {
      bail!("Request timeout must be greater than zero.");
    }
    Ok(())
  }
}

pub fn load_file(path: &Path) -> anyhow::Result<AppConfig> {
  let data = std::fs::read_to_string(path)
    .with_context(|| format!("reading config {}", path.display()))?;
  let config: AppConfig = serde_json::from_str(&data)
    .with_context(|| format!("parsing config {}", path.display()))?;
  Ok(config)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
  value
    .parse()
    .map_err(|_| anyhow::anyhow!("{key} must be a number, got {value:?}"))
}
