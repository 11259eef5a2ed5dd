//! Logging setup for the `bungae` orchestrator.
//!
//! Library users: bungae-core and bungae-resolver emit `tracing` events
//! on their own — install your own subscriber if you want to see them.
//! `init_tracing` is a convenience for application entry points.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
  Silent,
  Error,
  Warn,
  #[default]
  Info,
  Debug,
}

impl LogLevel {
  fn as_filter(&self) -> &'static str {
    match self {
      LogLevel::Silent => "off",
      LogLevel::Error => "error",
      LogLevel::Warn => "warn",
      LogLevel::Info => "info",
      LogLevel::Debug => "debug",
    }
  }
}

impl std::str::FromStr for LogLevel {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "silent" | "off" => Ok(LogLevel::Silent),
      "error" => Ok(LogLevel::Error),
      "warn" | "warning" => Ok(LogLevel::Warn),
      "info" => Ok(LogLevel::Info),
      "debug" => Ok(LogLevel::Debug),
      other => Err(format!("invalid log level: {other}")),
    }
  }
}

/// Installs a global `tracing` subscriber. Only the first call across the
/// process takes effect, so it's safe to call from every entry point
/// (build once, dev server once) without coordinating.
pub fn init_tracing(level: LogLevel) {
  INIT.call_once(|| {
    let filter = EnvFilter::builder()
      .with_default_directive(level.as_filter().parse().unwrap())
      .from_env_lossy();

    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().compact().with_target(false))
      .init();
  });
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn log_level_parses_common_spellings() {
    assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Silent);
    assert!("bogus".parse::<LogLevel>().is_err());
  }

  #[test]
  fn log_level_defaults_to_info() {
    assert_eq!(LogLevel::default(), LogLevel::Info);
  }
}
