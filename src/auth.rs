use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::error::AuthError;

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Supplies bearer tokens for outbound Foundry calls.
///
/// Implementations must not cache: every call is expected to hand back a token
/// that is valid for the request about to be made.
#[async_trait]
pub trait TokenSource: Send + Sync {
  fn name(&self) -> &'static str;

  async fn token(&self) -> Result<String, AuthError>;
}

pub struct StaticToken {
  token: String,
}

impl StaticToken {
  pub fn new(token: impl Into<String>) -> Self {
    Self { token: token.into() }
  }
}

#[async_trait]
impl TokenSource for StaticToken {
  fn name(&self) -> &'static str {
    "static"
  }

  async fn token(&self) -> Result<String, AuthError> {
    non_empty(self.token.clone())
  }
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
}

/// OAuth2 client-credentials grant against Microsoft Entra ID.
pub struct ClientSecretCredential {
  client: reqwest::Client,
  token_url: String,
  client_id: String,
  client_secret: String,
  scope: String,
}

impl ClientSecretCredential {
  pub fn new(
    client: reqwest::Client,
    authority_host: &str,
    tenant_id: &str,
    client_id: &str,
    client_secret: &str,
    scope: &str,
  ) -> Self {
    Self {
      client,
      token_url: format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
      ),
      client_id: client_id.to_string(),
      client_secret: client_secret.to_string(),
      scope: scope.to_string(),
    }
  }
}

#[async_trait]
impl TokenSource for ClientSecretCredential {
  fn name(&self) -> &'static str {
    "client_secret"
  }

  async fn token(&self) -> Result<String, AuthError> {
    let form = [
      ("grant_type", "client_credentials"),
      ("client_id", self.client_id.as_str()),
      ("client_secret", self.client_secret.as_str()),
      ("scope", self.scope.as_str()),
    ];
    let resp = self.client.post(&self.token_url).form(&form).send().await?;
    read_token(resp).await
  }
}

/// Token from the instance metadata service of an Azure-hosted workload.
pub struct ManagedIdentityCredential {
  client: reqwest::Client,
  endpoint: String,
  resource: String,
  client_id: Option<String>,
}

impl ManagedIdentityCredential {
  pub fn new(client: reqwest::Client, scope: &str, client_id: Option<String>) -> Self {
    Self::with_endpoint(client, IMDS_TOKEN_URL, scope, client_id)
  }

  pub fn with_endpoint(
    client: reqwest::Client,
    endpoint: &str,
    scope: &str,
    client_id: Option<String>,
  ) -> Self {
    Self {
      client,
      endpoint: endpoint.to_string(),
      resource: scope_to_resource(scope),
      client_id,
    }
  }
}

#[async_trait]
impl TokenSource for ManagedIdentityCredential {
  fn name(&self) -> &'static str {
    "managed_identity"
  }

  async fn token(&self) -> Result<String, AuthError> {
    let mut query = vec![
      ("api-version", "2018-02-01"),
      ("resource", self.resource.as_str()),
    ];
    if let Some(client_id) = self.client_id.as_deref() {
      query.push(("client_id", client_id));
    }
    let resp = self
      .client
      .get(&self.endpoint)
      .header("Metadata", "true")
      .query(&query)
      .send()
      .await?;
    read_token(resp).await
  }
}

/// Bearer token kept in the OS credential store.
pub struct KeyringToken {
  service: String,
  user: String,
}

impl KeyringToken {
  pub fn new(service: &str, user: &str) -> Self {
    Self {
      service: service.to_string(),
      user: user.to_string(),
    }
  }
}

#[async_trait]
impl TokenSource for KeyringToken {
  fn name(&self) -> &'static str {
    "keyring"
  }

  async fn token(&self) -> Result<String, AuthError> {
    let service = self.service.clone();
    let user = self.user.clone();
    off_worker(move || {
      let entry = keyring::Entry::new(&service, &user)?;
      non_empty(entry.get_password()?)
    })
    .await
  }
}

// Credential stores can block on IPC; keep that off the async workers.
async fn off_worker<T, F>(lookup: F) -> Result<T, AuthError>
where
  F: FnOnce() -> Result<T, AuthError> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(lookup).await?
}

/// Picks a credential the way a default Azure credential chain would:
/// explicit token, service principal secret, keyring entry, then managed identity.
pub fn from_config(config: &AuthConfig, timeout: Duration) -> anyhow::Result<Arc<dyn TokenSource>> {
  if let Some(token) = config.access_token.as_deref() {
    return Ok(Arc::new(StaticToken::new(token)));
  }

  let client = reqwest::Client::builder().timeout(timeout).build()?;

  if let (Some(tenant), Some(client_id), Some(secret)) = (
    config.tenant_id.as_deref(),
    config.client_id.as_deref(),
    config.client_secret.as_deref(),
  ) {
    return Ok(Arc::new(ClientSecretCredential::new(
      client,
      &config.authority_host,
      tenant,
      client_id,
      secret,
      &config.scope,
    )));
  }

  if let (Some(service), Some(user)) = (
    config.keyring_service.as_deref(),
    config.keyring_user.as_deref(),
  ) {
    return Ok(Arc::new(KeyringToken::new(service, user)));
  }

  Ok(Arc::new(ManagedIdentityCredential::new(
    client,
    &config.scope,
    config.client_id.clone(),
  )))
}

async fn read_token(resp: reqwest::Response) -> Result<String, AuthError> {
  if !resp.status().is_success() {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    return Err(AuthError::Rejected { status, body });
  }
  let body: TokenResponse = resp.json().await?;
  non_empty(body.access_token)
}

fn non_empty(token: String) -> Result<String, AuthError> {
  if token.trim().is_empty() {
    Err(AuthError::Empty)
  } else {
    Ok(token)
  }
}

fn scope_to_resource(scope: &str) -> String {
  scope.strip_suffix("/.default").unwrap_or(scope).to_string()
}
