//! Observer trait and implementations
//!
//! The Observer trait defines the consumer side of a tap. It has three
//! methods: `emit` (for values), `done` (successful completion) and `quit`
//! (failure). The engine guarantees that calls on one observer never overlap
//! and that `done`/`quit` is the last call it receives.

use crate::error::SupplyError;

/// Observer trait: the callbacks of one tap.
pub trait Observer<T>: Send + 'static {
  /// Receive the next value.
  fn emit(&mut self, value: T);

  /// The supply finished successfully. No more calls follow.
  fn done(&mut self);

  /// The supply failed. No more calls follow.
  fn quit(&mut self, err: SupplyError);

  /// Whether `quit` actually handles the error.
  ///
  /// When this returns `false` the engine treats a quit as unhandled and
  /// re-raises it on the delivering thread.
  fn handles_quit(&self) -> bool { true }
}

impl<T, O> Observer<T> for Box<O>
where
  O: Observer<T> + ?Sized,
{
  #[inline]
  fn emit(&mut self, value: T) { (**self).emit(value) }
  #[inline]
  fn done(&mut self) { (**self).done() }
  #[inline]
  fn quit(&mut self, err: SupplyError) { (**self).quit(err) }
  #[inline]
  fn handles_quit(&self) -> bool { (**self).handles_quit() }
}

/// Observer built from closures, used by `tap`, `tap_done` and `tap_all`.
pub struct FnObserver<N, D, Q> {
  on_emit: N,
  on_done: Option<D>,
  on_quit: Option<Q>,
}

/// Placeholder type for an absent done callback.
pub type NoDone = fn();
/// Placeholder type for an absent quit callback.
pub type NoQuit = fn(SupplyError);

impl<N> FnObserver<N, NoDone, NoQuit> {
  pub fn new(on_emit: N) -> Self { FnObserver { on_emit, on_done: None, on_quit: None } }
}

impl<N, D, Q> FnObserver<N, D, Q> {
  pub fn with_done<D2>(self, on_done: D2) -> FnObserver<N, D2, Q> {
    FnObserver { on_emit: self.on_emit, on_done: Some(on_done), on_quit: self.on_quit }
  }

  pub fn with_quit<Q2>(self, on_quit: Q2) -> FnObserver<N, D, Q2> {
    FnObserver { on_emit: self.on_emit, on_done: self.on_done, on_quit: Some(on_quit) }
  }
}

impl<T, N, D, Q> Observer<T> for FnObserver<N, D, Q>
where
  N: FnMut(T) + Send + 'static,
  D: FnOnce() + Send + 'static,
  Q: FnOnce(SupplyError) + Send + 'static,
{
  #[inline]
  fn emit(&mut self, value: T) { (self.on_emit)(value) }

  fn done(&mut self) {
    if let Some(on_done) = self.on_done.take() {
      on_done();
    }
  }

  fn quit(&mut self, err: SupplyError) {
    if let Some(on_quit) = self.on_quit.take() {
      on_quit(err);
    }
  }

  fn handles_quit(&self) -> bool { self.on_quit.is_some() }
}
