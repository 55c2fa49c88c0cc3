//! Subscription handle.
//!
//! A [`Tap`] is returned by every `tap`/`act` call. It is not generic over the
//! value type: the typed callbacks live in the tap's
//! [`Subscriber`](crate::subscriber::Subscriber), the handle only owns the
//! closed flag and the on-close hooks.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{
  fmt::{Debug, Formatter},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

type Hook = Box<dyn FnOnce() + Send>;

pub(crate) struct TapState {
  closed: AtomicBool,
  hooks: Mutex<SmallVec<[Hook; 2]>>,
}

impl TapState {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(TapState { closed: AtomicBool::new(false), hooks: Mutex::new(SmallVec::new()) })
  }

  #[inline]
  pub(crate) fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

  /// Register a hook run once when the tap closes. Runs right away if the tap
  /// is already closed.
  pub(crate) fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
    {
      let mut hooks = self.hooks.lock();
      if !self.is_closed() {
        hooks.push(Box::new(hook));
        return;
      }
    }
    hook();
  }

  /// Close and run the hooks. Only the first call does anything.
  pub(crate) fn close(&self) {
    let hooks = {
      let mut hooks = self.hooks.lock();
      if self.closed.swap(true, Ordering::AcqRel) {
        return;
      }
      std::mem::take(&mut *hooks)
    };
    tracing::trace!(hooks = hooks.len(), "tap closed");
    for hook in hooks {
      hook();
    }
  }
}

/// One subscription to a supply.
///
/// Closing is idempotent, may be called from inside the tap's own callbacks
/// and may race with in-flight delivery: a callback already running may
/// finish, but once `close` returns no further callback starts for this
/// tap. A tap also closes by itself after its done/quit callback ran.
/// Dropping a `Tap` does not close it.
#[derive(Clone)]
pub struct Tap {
  state: Arc<TapState>,
}

impl Tap {
  pub(crate) fn from_state(state: Arc<TapState>) -> Self { Tap { state } }

  /// Stop receiving values and release the production behind this tap.
  pub fn close(&self) { self.state.close() }

  pub fn is_closed(&self) -> bool { self.state.is_closed() }

  /// Run `hook` when this tap closes (immediately if it already has).
  pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) { self.state.on_close(hook) }

  /// Wrap the tap so it is closed when the guard is dropped.
  pub fn close_when_dropped(self) -> TapGuard { TapGuard(self) }
}

impl Debug for Tap {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Tap").field("is_closed", &self.is_closed()).finish()
  }
}

/// "RAII" wrapper closing its tap on drop.
#[must_use]
#[derive(Debug)]
pub struct TapGuard(Tap);

impl TapGuard {
  pub fn tap(&self) -> &Tap { &self.0 }
}

impl Drop for TapGuard {
  fn drop(&mut self) { self.0.close() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;

  #[test]
  fn close_is_idempotent() {
    let tap = Tap::from_state(TapState::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    tap.on_close(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    });
    tap.close();
    tap.clone().close();
    assert!(tap.is_closed());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn late_hook_runs_immediately() {
    let tap = Tap::from_state(TapState::new());
    tap.close();
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    tap.on_close(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn hook_may_close_again() {
    let state = TapState::new();
    let c_state = state.clone();
    state.on_close(move || c_state.close());
    state.close();
    assert!(state.is_closed());
  }

  #[test]
  fn concurrent_close_runs_hooks_once() {
    let tap = Tap::from_state(TapState::new());
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
      let c_hits = hits.clone();
      tap.on_close(move || {
        c_hits.fetch_add(1, Ordering::SeqCst);
      });
    }
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let tap = tap.clone();
        std::thread::spawn(move || tap.close())
      })
      .collect();
    handles.into_iter().for_each(|h| h.join().unwrap());
    assert_eq!(hits.load(Ordering::SeqCst), 4);
  }

  #[test]
  fn guard_closes_on_drop() {
    let tap = Tap::from_state(TapState::new());
    {
      let _guard = tap.clone().close_when_dropped();
    }
    assert!(tap.is_closed());
  }
}
