//! Zip operator implementation
//!
//! Zip combines values of several supplies index-aligned: the n-th emitted
//! combination holds the n-th value of every input. Each input has its own
//! FIFO buffer; a combination is emitted as soon as every buffer holds a
//! value. The zipped supply is done once some input is done and its buffer
//! is drained, since no further combination can be formed.

use std::{collections::VecDeque, sync::Arc};

use super::gate::Gate;
use crate::{
  error::guarded,
  observer::FnObserver,
  supply::{Emitter, Supply},
};

// ==================== Shared State ====================

struct ZipState<T> {
  buffers: Vec<VecDeque<T>>,
  completed: Vec<bool>,
}

impl<T> ZipState<T> {
  fn new(inputs: usize) -> Self {
    ZipState {
      buffers: (0..inputs).map(|_| VecDeque::new()).collect(),
      completed: vec![false; inputs],
    }
  }

  /// Pop one value of every input if all have one pending.
  fn pop_row(&mut self) -> Option<Vec<T>> {
    if self.buffers.iter().any(VecDeque::is_empty) {
      return None;
    }
    self.buffers.iter_mut().map(VecDeque::pop_front).collect()
  }

  fn exhausted(&self) -> bool {
    self.buffers.iter().zip(&self.completed).any(|(buffer, done)| *done && buffer.is_empty())
  }
}

// ==================== Operators ====================

/// Zip the values of `supplies` into vectors.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use supply::prelude::*;
///
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// ops::zip(vec![Supply::from_iter(0..3), Supply::from_iter(10..20)])
///   .tap(move |row| c_seen.lock().unwrap().push(row));
/// assert_eq!(*seen.lock().unwrap(), vec![vec![0, 10], vec![1, 11], vec![2, 12]]);
/// ```
pub fn zip<T: Clone + Send + 'static>(supplies: Vec<Supply<T>>) -> Supply<Vec<T>> {
  zip_with(supplies, |row| row)
}

/// Zip the values of `supplies`, emitting `combiner(row)` for every row.
///
/// A panicking combiner quits the zipped supply. Zero inputs give a supply
/// that is done right away.
pub fn zip_with<T, U, F>(supplies: Vec<Supply<T>>, combiner: F) -> Supply<U>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  F: Fn(Vec<T>) -> U + Send + Sync + 'static,
{
  let combiner = Arc::new(combiner);
  Supply::on_demand(move |emitter: Emitter<U>| {
    if supplies.is_empty() {
      emitter.done();
      return;
    }
    let gate = Gate::new(ZipState::new(supplies.len()), emitter.clone());
    for (idx, source) in supplies.iter().enumerate() {
      if emitter.is_closed() {
        break;
      }
      let (next, done, quit) = (gate.clone(), gate.clone(), gate.clone());
      let combiner = combiner.clone();
      emitter.tap_upstream(
        source,
        FnObserver::new(move |v| {
          next.with(|state, outbox| {
            state.buffers[idx].push_back(v);
            if let Some(row) = state.pop_row() {
              match guarded(|| combiner(row)) {
                Ok(combined) => outbox.emit(combined),
                Err(err) => return outbox.quit(err),
              }
            }
            if state.exhausted() {
              outbox.done();
            }
          })
        })
        .with_done(move || {
          done.with(|state, outbox| {
            state.completed[idx] = true;
            if state.exhausted() {
              outbox.done();
            }
          })
        })
        .with_quit(move |err| quit.with(|_, outbox| outbox.quit(err))),
      );
    }
  })
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Zip this supply with `other` into pairs.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_list(vec![1, 2, 3])
  ///   .zip_pair(&Supply::from_list(vec!['a', 'b', 'c']))
  ///   .tap(move |pair| c_seen.lock().unwrap().push(pair));
  /// assert_eq!(*seen.lock().unwrap(), vec![(1, 'a'), (2, 'b'), (3, 'c')]);
  /// ```
  pub fn zip_pair<U>(&self, other: &Supply<U>) -> Supply<(T, U)>
  where
    U: Clone + Send + 'static,
  {
    #[derive(Clone)]
    enum Side<A, B> {
      Left(A),
      Right(B),
    }
    let left = self.map(Side::Left);
    let right = other.map(Side::Right);
    zip_with(vec![left, right], |row| {
      let mut row = row.into_iter();
      match (row.next(), row.next()) {
        (Some(Side::Left(a)), Some(Side::Right(b))) => Some((a, b)),
        _ => None,
      }
    })
    .filter_map(|pair| pair)
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use parking_lot::Mutex;
  use std::sync::Arc;

  fn record<T>(supply: &Supply<T>) -> Arc<Mutex<Vec<String>>>
  where
    T: Clone + Send + std::fmt::Debug + 'static,
  {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    supply.tap_all(
      move |v| l1.lock().push(format!("{v:?}")),
      move || l2.lock().push("done".into()),
      move |e| l3.lock().push(format!("quit:{e}")),
    );
    log
  }

  #[test]
  fn pairs_then_done() {
    let zipped = Supply::from_list(vec![1, 2, 3]).zip_pair(&Supply::from_list(vec!["a", "b", "c"]));
    assert_eq!(*record(&zipped).lock(), vec!["(1, \"a\")", "(2, \"b\")", "(3, \"c\")", "done"]);
  }

  #[test]
  fn done_once_shortest_is_drained() {
    let a = Supplier::new();
    let b = Supplier::new();
    let log = record(&ops::zip(vec![a.supply(), b.supply()]));
    a.emit(1);
    a.emit(2);
    a.done();
    // input `a` is done but still has buffered values
    assert!(log.lock().is_empty());
    b.emit(10);
    assert_eq!(*log.lock(), vec!["[1, 10]"]);
    b.emit(20);
    assert_eq!(*log.lock(), vec!["[1, 10]", "[2, 20]", "done"]);
    assert_eq!(b.tap_count(), 0);
  }

  #[test]
  fn zip_with_combiner() {
    let sum = ops::zip_with(
      vec![Supply::from_iter(0..3), Supply::from_iter(10..13), Supply::from_iter(100..200)],
      |row| row.iter().sum::<i32>(),
    );
    assert_eq!(*record(&sum).lock(), vec!["110", "113", "116", "done"]);
  }

  #[test]
  fn quit_passes_through() {
    let a = Supplier::<i32>::new();
    let b = Supplier::<i32>::new();
    let log = record(&a.supply().zip_pair(&b.supply()));
    a.emit(1);
    b.quit("broken");
    assert_eq!(*log.lock(), vec!["quit:broken"]);
    assert_eq!(a.tap_count(), 0);
  }

  #[test]
  fn panicking_combiner_quits() {
    let zipped = ops::zip_with(vec![Supply::just(1), Supply::just(0)], |row| row[0] / row[1]);
    let log = record(&zipped);
    assert_eq!(log.lock().len(), 1);
    assert!(log.lock()[0].starts_with("quit:callback panicked"));
  }

  #[test]
  fn downstream_can_feed_an_input() {
    let a = Supplier::<i32>::new();
    let b = Supplier::<i32>::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let (c_seen, feedback) = (seen.clone(), b.clone());
    ops::zip(vec![a.supply(), b.supply()]).tap(move |row| {
      c_seen.lock().push(row.clone());
      if row[0] == 1 {
        feedback.emit(20);
      }
    });
    b.emit(10);
    a.emit(1);
    a.emit(2);
    assert_eq!(*seen.lock(), vec![vec![1, 10], vec![2, 20]]);
  }
}
