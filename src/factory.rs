//! Constructors of on-demand supplies.

use parking_lot::Mutex;

use crate::{
  error::SupplyError,
  promise::Promise,
  scheduler::{Duration, SharedScheduler},
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Creates a supply that produces values from an iterator.
  ///
  /// Every tap iterates its own clone of `values`, then completes. Emission
  /// stops early once the tap is closed.
  ///
  /// ```
  /// use supply::prelude::*;
  ///
  /// Supply::from_iter(0..10).tap(|v| println!("{},", v));
  /// ```
  pub fn from_iter<I>(values: I) -> Self
  where
    I: IntoIterator<Item = T> + Clone + Send + 'static,
  {
    let values = Mutex::new(values);
    Supply::on_demand(move |emitter: Emitter<T>| {
      let values = values.lock().clone();
      for value in values {
        if emitter.is_closed() {
          return;
        }
        emitter.emit(value);
      }
      emitter.done();
    })
  }

  /// Same as [`from_iter`](Supply::from_iter) for an owned list.
  pub fn from_list(values: Vec<T>) -> Self { Self::from_iter(values) }

  /// One value, then done.
  pub fn just(value: T) -> Self { Self::from_iter(std::iter::once(value)) }

  /// Done without any value.
  pub fn empty() -> Self { Supply::on_demand(|emitter: Emitter<T>| emitter.done()) }

  /// Quits every tap with `err`.
  pub fn failed(err: impl Into<SupplyError>) -> Self {
    let err = err.into();
    Supply::on_demand(move |emitter: Emitter<T>| emitter.quit(err.clone()))
  }

  /// Emits the promise's value and completes, or quits if it was broken.
  /// Taps made after the promise settled still see its result.
  pub fn from_promise(promise: Promise<T>) -> Self {
    Supply::on_demand(move |emitter: Emitter<T>| {
      promise.then(move |result| match result {
        Ok(value) => {
          emitter.emit(value);
          emitter.done();
        }
        Err(err) => emitter.quit(err),
      })
    })
  }
}

impl Supply<usize> {
  /// Emits 0, 1, 2, … every `period`, the first value after `delay` (right
  /// away when `None`).
  ///
  /// On-demand: each tap starts its own counter at 0 and closing the tap
  /// cancels its timer.
  pub fn interval(period: Duration, delay: Option<Duration>, scheduler: SharedScheduler) -> Self {
    Supply::on_demand(move |emitter: Emitter<usize>| {
      let mut next = 0;
      let ticker = emitter.clone();
      let handle = scheduler.schedule_repeating(delay, period, move || {
        if ticker.is_closed() {
          return false;
        }
        ticker.emit(next);
        next += 1;
        true
      });
      emitter.on_close(move || handle.cancel());
    })
  }
}
