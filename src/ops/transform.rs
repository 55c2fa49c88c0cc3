//! Per-value operators: transforms, predicates and counting.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
  error::{guarded, guarded_try, SupplyError},
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Creates a new supply which calls a closure on each value and emits its
  /// return.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_list(vec![1, 2, 3]).map(|v| v * 2).tap(move |v| c_seen.lock().unwrap().push(v));
  /// assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
  /// ```
  pub fn map<U, F>(&self, f: F) -> Supply<U>
  where
    U: Clone + Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
  {
    self.try_map(move |v| Ok(f(v)))
  }

  /// Like [`map`](Supply::map) with a fallible closure; an `Err` quits.
  pub fn try_map<U, F>(&self, f: F) -> Supply<U>
  where
    U: Clone + Send + 'static,
    F: Fn(T) -> Result<U, SupplyError> + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    self.derive(move |out: &Emitter<U>| {
      let (f, out) = (f.clone(), out.clone());
      move |v| out.emit_result(guarded_try(|| f(v)))
    })
  }

  /// Keep only values matching `predicate`.
  pub fn grep<F>(&self, predicate: F) -> Supply<T>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    self.try_grep(move |v| Ok(predicate(v)))
  }

  /// Like [`grep`](Supply::grep) with a fallible predicate; an `Err` quits.
  pub fn try_grep<F>(&self, predicate: F) -> Supply<T>
  where
    F: Fn(&T) -> Result<bool, SupplyError> + Send + Sync + 'static,
  {
    let predicate = Arc::new(predicate);
    self.derive(move |out: &Emitter<T>| {
      let (predicate, out) = (predicate.clone(), out.clone());
      move |v| match guarded_try(|| predicate(&v)) {
        Ok(true) => out.emit(v),
        Ok(false) => {}
        Err(err) => out.quit(err),
      }
    })
  }

  /// Map and filter in one step: `None` results are dropped.
  pub fn filter_map<U, F>(&self, f: F) -> Supply<U>
  where
    U: Clone + Send + 'static,
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    self.derive(move |out: &Emitter<U>| {
      let (f, out) = (f.clone(), out.clone());
      move |v| match guarded(|| f(v)) {
        Ok(Some(u)) => out.emit(u),
        Ok(None) => {}
        Err(err) => out.quit(err),
      }
    })
  }

  /// Pass every value through after running `block` on it.
  ///
  /// All taps of the returned supply share one lock, so `block` never runs
  /// concurrently with itself, whichever thread delivers.
  pub fn inspect<F>(&self, block: F) -> Supply<T>
  where
    F: Fn(&T) + Send + Sync + 'static,
  {
    let block = Arc::new(block);
    let lock = Arc::new(Mutex::new(()));
    self.derive(move |out: &Emitter<T>| {
      let (block, lock, out) = (block.clone(), lock.clone(), out.clone());
      move |v| {
        let outcome = {
          let _guard = lock.lock();
          guarded(|| block(&v))
        };
        match outcome {
          Ok(()) => out.emit(v),
          Err(err) => out.quit(err),
        }
      }
    })
  }

  /// Emit the first `n` values, then done.
  pub fn head(&self, n: usize) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      if n == 0 {
        emitter.done();
        return;
      }
      let out = emitter.clone();
      let mut taken = 0;
      emitter.pipe(&source, move |v| {
        taken += 1;
        out.emit(v);
        if taken == n {
          out.done();
        }
      });
    })
  }

  /// Drop the first `n` values.
  pub fn skip(&self, n: usize) -> Supply<T> {
    self.derive(move |out: &Emitter<T>| {
      let out = out.clone();
      let mut skipped = 0;
      move |v| {
        if skipped < n {
          skipped += 1;
        } else {
          out.emit(v);
        }
      }
    })
  }

  /// The first value, then done. Done without a value if there was none.
  pub fn first(&self) -> Supply<T> { self.head(1) }

  /// Emits how many values were seen so far, once per value.
  pub fn elems(&self) -> Supply<usize> {
    self.derive(|out: &Emitter<usize>| {
      let out = out.clone();
      let mut count = 0;
      move |_: T| {
        count += 1;
        out.emit(count);
      }
    })
  }
}
