//! Process-wide settings and per-pool configuration.
//!
//! The only process-wide state is the zero-allocation advisory flag. Pools
//! read it once, when they are built, into their own [`PoolConfig`].

use std::{
  env,
  sync::atomic::{AtomicBool, Ordering},
};

/// Environment variable read by [`init_from_env`].
pub const WARN_ZERO_ALLOC_ENV: &str = "RPOOL_WARN_ZERO_ALLOC";

static WARN_ZERO_ALLOC: AtomicBool = AtomicBool::new(false);

/// Enables or disables the zero-byte allocation advisory for pools built
/// from now on.
pub fn set_warn_zero_alloc(enabled: bool) {
  WARN_ZERO_ALLOC.store(enabled, Ordering::Relaxed);
}

/// Current process-wide zero-byte advisory setting. Defaults to `false`.
pub fn warn_zero_alloc() -> bool {
  WARN_ZERO_ALLOC.load(Ordering::Relaxed)
}

/// Loads process-wide settings from the environment.
///
/// Unset or unrecognized values leave the current setting alone.
pub fn init_from_env() {
  if let Some(enabled) = env::var(WARN_ZERO_ALLOC_ENV).ok().as_deref().and_then(parse_flag) {
    set_warn_zero_alloc(enabled);
  }
}

/// Restores every process-wide setting to its default.
pub fn reset() {
  set_warn_zero_alloc(false);
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

/// Settings fixed for the lifetime of one [`Pool`](crate::Pool) or
/// [`Address`](crate::Address).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
  /// Emit a `tracing` warning when a zero-byte block is requested.
  pub warn_zero_alloc: bool,
}

impl PoolConfig {
  /// Returns a copy with the zero-byte advisory set to `enabled`.
  #[must_use]
  pub const fn warn_zero_alloc(
    mut self,
    enabled: bool,
  ) -> Self {
    self.warn_zero_alloc = enabled;
    self
  }
}

impl Default for PoolConfig {
  /// Snapshots the process-wide settings.
  fn default() -> Self {
    Self {
      warn_zero_alloc: warn_zero_alloc(),
    }
  }
}

#[cfg(test)]
pub(crate) mod capture {
  use std::{io, sync::Arc};

  use parking_lot::Mutex;

  /// Log lines written by a test-local `fmt` subscriber.
  #[derive(Clone, Default)]
  pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

  impl CapturedLogs {
    pub(crate) fn count(
      &self,
      needle: &str,
    ) -> usize {
      String::from_utf8_lossy(&self.0.lock()).matches(needle).count()
    }
  }

  impl io::Write for CapturedLogs {
    fn write(
      &mut self,
      buf: &[u8],
    ) -> io::Result<usize> {
      self.0.lock().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  /// Runs `f` with a thread-local subscriber and returns what it logged.
  pub(crate) fn capture_logs(f: impl FnOnce()) -> CapturedLogs {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(move || writer.clone())
      .with_ansi(false)
      .finish();

    tracing::subscriber::with_default(subscriber, f);
    logs
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_flag() {
    assert_eq!(parse_flag("1"), Some(true));
    assert_eq!(parse_flag(" TRUE "), Some(true));
    assert_eq!(parse_flag("on"), Some(true));
    assert_eq!(parse_flag("off"), Some(false));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag("maybe"), None);
  }

  #[test]
  fn test_builder_overrides_snapshot() {
    let config = PoolConfig { warn_zero_alloc: false }.warn_zero_alloc(true);
    assert!(config.warn_zero_alloc);
  }

  #[test]
  fn test_default_snapshots_process_setting() {
    set_warn_zero_alloc(true);
    let enabled = PoolConfig::default();
    reset();
    let disabled = PoolConfig::default();

    assert!(enabled.warn_zero_alloc);
    assert!(!disabled.warn_zero_alloc);
    assert!(!warn_zero_alloc());
  }
}
