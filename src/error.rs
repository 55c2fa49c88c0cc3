//! Error carried by a supply's `quit` terminal.
//!
//! A supply ends in exactly one of two ways: `done` or `quit(SupplyError)`.
//! The same error is handed to every tap of a fan-out, so [`SupplyError`] is
//! cheap to clone.

use std::{any::Any, error::Error as StdError, fmt, sync::Arc};
use thiserror::Error;

/// Failure delivered through `quit`.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SupplyError {
  /// A plain message, usually supplied by a producer.
  #[error("{0}")]
  Message(Arc<str>),

  /// A user closure panicked while the engine invoked it.
  #[error("callback panicked: {0}")]
  Panicked(Arc<str>),

  /// Any other error raised by user code.
  #[error(transparent)]
  Custom(Arc<dyn StdError + Send + Sync>),

  /// A throttle control message could not be understood.
  #[error("invalid control message `{message}`: {reason}")]
  Control {
    /// The raw message as received.
    message: String,
    /// Why it was rejected.
    reason: &'static str,
  },

  /// An operation needed at least one value but the supply had none.
  #[error("supply completed without a value")]
  Empty,
}

impl SupplyError {
  /// Create an error from a message.
  pub fn msg(message: impl fmt::Display) -> Self {
    SupplyError::Message(message.to_string().into())
  }

  /// Wrap an arbitrary error.
  pub fn custom<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    SupplyError::Custom(Arc::new(err))
  }

  /// Convert a panic payload caught with `catch_unwind`.
  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "unknown panic payload".to_string()
    };
    SupplyError::Panicked(message.into())
  }

  /// Returns a short stable label for logs.
  pub fn as_label(&self) -> &'static str {
    match self {
      SupplyError::Message(_) => "supply_message",
      SupplyError::Panicked(_) => "supply_panicked",
      SupplyError::Custom(_) => "supply_custom",
      SupplyError::Control { .. } => "supply_control",
      SupplyError::Empty => "supply_empty",
    }
  }
}

impl From<&str> for SupplyError {
  fn from(message: &str) -> Self { SupplyError::Message(message.into()) }
}

impl From<String> for SupplyError {
  fn from(message: String) -> Self { SupplyError::Message(message.into()) }
}

/// Run a user closure, turning a panic into [`SupplyError::Panicked`].
///
/// Every mapper, predicate, reducer and processing function goes through
/// this so a failing closure quits its operator instead of unwinding through
/// the delivery loop.
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, SupplyError> {
  std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(SupplyError::from_panic)
}

/// Like [`guarded`] for closures that already return a `Result`.
pub(crate) fn guarded_try<R>(
  f: impl FnOnce() -> Result<R, SupplyError>,
) -> Result<R, SupplyError> {
  guarded(f).and_then(|r| r)
}
