//! Start: run a closure asynchronously for every value.

use std::sync::Arc;

use crate::{
  promise::Promise,
  scheduler::SharedScheduler,
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// For every value, run `f` on `scheduler` and emit a supply that yields
  /// its result and is done, or quits if `f` panicked.
  ///
  /// The inner supplies are emitted right away, before `f` finished; use
  /// [`migrate`](Supply::migrate) or [`ops::merge`](crate::ops::merge) to
  /// flatten them.
  pub fn start<U, F>(&self, scheduler: SharedScheduler, f: F) -> Supply<Supply<U>>
  where
    U: Clone + Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    self.derive(move |out: &Emitter<Supply<U>>| {
      let (f, scheduler, out) = (f.clone(), scheduler.clone(), out.clone());
      move |v: T| {
        let f = f.clone();
        let promise = Promise::start(&*scheduler, move || Ok(f(v)));
        out.emit(Supply::from_promise(promise));
      }
    })
  }
}
