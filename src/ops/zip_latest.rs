//! Combine the most recent values of several supplies.

use parking_lot::Mutex;
use std::sync::Arc;

use super::gate::Gate;
use crate::{
  error::guarded,
  observer::FnObserver,
  supply::{Emitter, Supply},
};

/// Emit `combiner(latest)` whenever any input emits, `latest` holding the
/// most recent value of every input.
///
/// Nothing is emitted until every input has produced a value, unless
/// `initial` provides a starting value per input (it must have one entry
/// per supply, extra entries are ignored). Done as soon as any input is
/// done; quit on the first quit.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use supply::prelude::*;
///
/// let a = Supplier::<i32>::new();
/// let b = Supplier::<i32>::new();
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// ops::zip_latest(vec![a.supply(), b.supply()], |row| row.iter().sum::<i32>(), None)
///   .tap(move |v| c_seen.lock().unwrap().push(v));
/// a.emit(1);
/// b.emit(10);
/// a.emit(2);
/// assert_eq!(*seen.lock().unwrap(), vec![11, 12]);
/// ```
pub fn zip_latest<T, U, F>(
  supplies: Vec<Supply<T>>,
  combiner: F,
  initial: Option<Vec<T>>,
) -> Supply<U>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
  let combiner = Arc::new(combiner);
  let initial = Mutex::new(initial);
  Supply::on_demand(move |emitter: Emitter<U>| {
    if supplies.is_empty() {
      emitter.done();
      return;
    }
    let latest: Vec<Option<T>> = match &*initial.lock() {
      Some(initial) => (0..supplies.len()).map(|i| initial.get(i).cloned()).collect(),
      None => vec![None; supplies.len()],
    };
    let gate = Gate::new(latest, emitter.clone());
    for (idx, source) in supplies.iter().enumerate() {
      if emitter.is_closed() {
        break;
      }
      let combiner = combiner.clone();
      let (next, done, quit) = (gate.clone(), gate.clone(), gate.clone());
      emitter.tap_upstream(
        source,
        FnObserver::new(move |v| {
          next.with(|latest, outbox| {
            latest[idx] = Some(v);
            let Some(row) = latest.iter().cloned().collect::<Option<Vec<T>>>() else {
              return;
            };
            match guarded(|| combiner(row)) {
              Ok(combined) => outbox.emit(combined),
              Err(err) => outbox.quit(err),
            }
          })
        })
        .with_done(move || done.with(|_, outbox| outbox.done()))
        .with_quit(move |err| quit.with(|_, outbox| outbox.quit(err))),
      );
    }
  })
}
