use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Installs the global subscriber: stdout always, plus an append-only log file when configured.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  let file_layer = match config.file.as_deref() {
    Some(path) => Some(file_layer(Path::new(path))?),
    None => None,
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_target(false))
    .with(file_layer)
    .try_init()?;
  Ok(())
}

fn file_layer<S>(path: &Path) -> anyhow::Result<Box<dyn Layer<S> + Send + Sync>>
where
  S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
  if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir)?;
  }
  let file = OpenOptions::new().create(true).append(true).open(path)?;
  Ok(
    fmt::layer()
      .with_ansi(false)
      .with_writer(Mutex::new(file))
      .boxed(),
  )
}
