//! Migrate: follow only the most recent inner supply.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
  observer::FnObserver,
  subscriber::Subscriber,
  supply::{Emitter, Supply},
  tap::Tap,
};

impl<T: Clone + Send + 'static> Supply<Supply<T>> {
  /// Flatten a supply of supplies by tapping each new inner supply and
  /// closing the tap on the previous one.
  ///
  /// Done and quit follow the outer supply; a quit of the current inner
  /// supply quits too, while its done is ignored.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let outer = Supplier::<Supply<i32>>::new();
  /// let first = Supplier::new();
  /// let second = Supplier::new();
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// outer.supply().migrate().tap(move |v| c_seen.lock().unwrap().push(v));
  ///
  /// outer.emit(first.supply());
  /// first.emit(1);
  /// outer.emit(second.supply());
  /// first.emit(2);
  /// second.emit(3);
  /// assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
  /// ```
  pub fn migrate(&self) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let current: Arc<Mutex<Option<Tap>>> = Arc::new(Mutex::new(None));
      let c_current = current.clone();
      emitter.on_close(move || {
        if let Some(tap) = c_current.lock().take() {
          tap.close();
        }
      });
      let out = emitter.clone();
      emitter.pipe(&source, move |inner: Supply<T>| {
        if let Some(previous) = current.lock().take() {
          tracing::debug!("migrating to a new inner supply");
          previous.close();
        }
        if out.is_closed() {
          return;
        }
        let (next, quit) = (out.clone(), out.clone());
        let upstream = Subscriber::new(
          FnObserver::new(move |v| next.emit(v))
            .with_done(|| {})
            .with_quit(move |err| quit.quit(err)),
        );
        // linked through `current` before the inner production starts
        let tap = upstream.tap();
        *current.lock() = Some(tap.clone());
        if out.is_closed() {
          tap.close();
          return;
        }
        inner.attach(upstream);
      });
    })
  }
}
