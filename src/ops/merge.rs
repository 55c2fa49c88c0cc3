//! Merge: interleave the values of several supplies.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use crate::{
  observer::FnObserver,
  supply::{Emitter, Supply},
};

/// Combine supplies into one by merging their emissions.
///
/// Done once every input is done; the first quit quits the merged supply
/// and closes the taps on the other inputs. Zero inputs give a supply that
/// is done right away.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use supply::prelude::*;
///
/// let numbers = Supplier::<i32>::new();
/// let even = numbers.supply().grep(|v| v % 2 == 0);
/// let odd = numbers.supply().grep(|v| v % 2 != 0);
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// ops::merge(vec![even, odd]).tap(move |v| c_seen.lock().unwrap().push(v));
/// (0..4).for_each(|v| numbers.emit(v));
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
/// ```
pub fn merge<T: Clone + Send + 'static>(supplies: Vec<Supply<T>>) -> Supply<T> {
  Supply::on_demand(move |emitter: Emitter<T>| {
    if supplies.is_empty() {
      emitter.done();
      return;
    }
    let remaining = Arc::new(AtomicUsize::new(supplies.len()));
    for source in &supplies {
      if emitter.is_closed() {
        break;
      }
      let (out, done, quit) = (emitter.clone(), emitter.clone(), emitter.clone());
      let remaining = remaining.clone();
      emitter.tap_upstream(
        source,
        FnObserver::new(move |v| out.emit(v))
          .with_done(move || {
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
              done.done();
            }
          })
          .with_quit(move |err| quit.quit(err)),
      );
    }
  })
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Merge this supply with `other`.
  pub fn merge(&self, other: &Supply<T>) -> Supply<T> { merge(vec![self.clone(), other.clone()]) }
}
