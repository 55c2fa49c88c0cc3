//! Left folds over a supply.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
  error::guarded,
  observer::FnObserver,
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Fold the values with `f`, emitting only the final result when the
  /// upstream is done. An empty supply is done without a value.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let total = Arc::new(Mutex::new(0));
  /// let c_total = total.clone();
  /// Supply::from_iter(1..=5).reduce(|acc, v| acc + v).tap(move |v| *c_total.lock().unwrap() = v);
  /// assert_eq!(*total.lock().unwrap(), 15);
  /// ```
  pub fn reduce<F>(&self, f: F) -> Supply<T>
  where
    F: Fn(T, T) -> T + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let acc: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
      let (next_acc, done_acc) = (acc.clone(), acc);
      let (f, out, done, quit) = (f.clone(), emitter.clone(), emitter.clone(), emitter.clone());
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| {
          let failed = {
            let mut acc = next_acc.lock();
            let folded = match acc.take() {
              None => Ok(v),
              Some(prev) => guarded(|| f(prev, v)),
            };
            folded.map(|folded| *acc = Some(folded)).err()
          };
          if let Some(err) = failed {
            out.quit(err);
          }
        })
        .with_done(move || {
          let result = done_acc.lock().take();
          if let Some(result) = result {
            done.emit(result);
          }
          done.done();
        })
        .with_quit(move |err| quit.quit(err)),
      );
    })
  }

  /// Like [`reduce`](Supply::reduce), but emits every intermediate result,
  /// starting with the first value itself.
  pub fn produce<F>(&self, f: F) -> Supply<T>
  where
    F: Fn(T, T) -> T + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    self.derive(move |out: &Emitter<T>| {
      let (f, out) = (f.clone(), out.clone());
      let mut acc: Option<T> = None;
      move |v: T| {
        let folded = match acc.take() {
          None => Ok(v),
          Some(prev) => guarded(|| f(prev, v)),
        };
        match folded {
          Ok(folded) => {
            acc = Some(folded.clone());
            out.emit(folded);
          }
          Err(err) => out.quit(err),
        }
      }
    })
  }
}
