//! Batch operator implementation
//!
//! Collects values into vectors, flushing a batch when it holds `elems`
//! values or when `seconds` have passed since the previous flush, whichever
//! comes first. When the stream was idle for longer than `seconds`, the
//! window restarts at the next value. A partial batch is flushed when the
//! upstream is done and dropped when it quits. Empty batches are never
//! emitted.

use std::sync::Arc;

use super::gate::Gate;
use crate::{
  observer::FnObserver,
  scheduler::{default_scheduler, Duration, SharedScheduler, TaskHandle},
  supply::{Emitter, Supply},
};

// ==================== BatchConfig ====================

/// Options of [`Supply::batch`].
///
/// With neither `elems` nor `seconds` set, everything is emitted as one
/// batch when the upstream is done.
#[derive(Clone)]
pub struct BatchConfig {
  pub elems: Option<usize>,
  pub seconds: Option<Duration>,
  pub scheduler: SharedScheduler,
}

impl Default for BatchConfig {
  fn default() -> Self {
    BatchConfig { elems: None, seconds: None, scheduler: default_scheduler() }
  }
}

impl BatchConfig {
  pub fn new() -> Self { Self::default() }

  /// Flush once a batch holds `elems` values. Zero is treated as one.
  pub fn elems(mut self, elems: usize) -> Self {
    self.elems = Some(elems.max(1));
    self
  }

  /// Flush once `seconds` passed since the previous flush.
  pub fn seconds(mut self, seconds: Duration) -> Self {
    self.seconds = Some(seconds);
    self
  }

  pub fn scheduler(mut self, scheduler: SharedScheduler) -> Self {
    self.scheduler = scheduler;
    self
  }
}

// ==================== State ====================

struct BatchState<T> {
  items: Vec<T>,
  last_flush: Duration,
  generation: u64,
  timer: Option<TaskHandle>,
}

impl<T> BatchState<T> {
  fn take_batch(&mut self, now: Duration) -> Vec<T> {
    self.generation += 1;
    self.last_flush = now;
    if let Some(timer) = self.timer.take() {
      timer.cancel();
    }
    std::mem::take(&mut self.items)
  }
}

type BatchGate<T> = Arc<Gate<BatchState<T>, Vec<T>>>;

fn arm_timer<T: Clone + Send + 'static>(
  gate: &BatchGate<T>,
  locked: &mut BatchState<T>,
  seconds: Duration,
  scheduler: &SharedScheduler,
) {
  let now = scheduler.now();
  // a window that lapsed while idle restarts at the value's arrival
  let deadline = locked.last_flush + seconds;
  let delay = if deadline > now { deadline - now } else { seconds };
  let generation = locked.generation;
  let (gate, clock) = (gate.clone(), scheduler.clone());
  let handle = scheduler.schedule_once(Some(delay), move || {
    gate.with(|state, outbox| {
      if state.generation != generation || state.items.is_empty() {
        return;
      }
      outbox.emit(state.take_batch(clock.now()));
    })
  });
  locked.timer = Some(handle);
}

// ==================== Operator ====================

impl<T: Clone + Send + 'static> Supply<T> {
  /// Group values into batches, see [`BatchConfig`].
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_iter(1..=5)
  ///   .batch(BatchConfig::new().elems(2))
  ///   .tap(move |batch| c_seen.lock().unwrap().push(batch));
  /// assert_eq!(*seen.lock().unwrap(), vec![vec![1, 2], vec![3, 4], vec![5]]);
  /// ```
  pub fn batch(&self, config: BatchConfig) -> Supply<Vec<T>> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<Vec<T>>| {
      let BatchConfig { elems, seconds, scheduler } = config.clone();
      let state =
        BatchState { items: vec![], last_flush: scheduler.now(), generation: 0, timer: None };
      let gate = Gate::new(state, emitter.clone());

      let weak = Arc::downgrade(&gate);
      emitter.on_close(move || {
        if let Some(gate) = weak.upgrade() {
          gate.with(|state, _| {
            if let Some(timer) = state.timer.take() {
              timer.cancel();
            }
          })
        }
      });

      let (next, done, quit) = (gate.clone(), gate.clone(), gate);
      let clock = scheduler.clone();
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| {
          next.with(|locked, outbox| {
            locked.items.push(v);
            if elems.map_or(false, |elems| locked.items.len() >= elems) {
              outbox.emit(locked.take_batch(scheduler.now()));
            } else if let Some(seconds) = seconds.filter(|_| locked.timer.is_none()) {
              arm_timer(&next, locked, seconds, &scheduler);
            }
          })
        })
        .with_done(move || {
          done.with(|state, outbox| {
            let batch = state.take_batch(clock.now());
            if !batch.is_empty() {
              outbox.emit(batch);
            }
            outbox.done();
          })
        })
        .with_quit(move |err| quit.with(|_, outbox| outbox.quit(err))),
      );
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use parking_lot::Mutex;
  use std::sync::Arc;

  #[test]
  fn count_flush_and_partial_on_done() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    Supply::from_iter(0..7)
      .batch(BatchConfig::new().elems(3))
      .tap(move |batch| c_seen.lock().push(batch));
    assert_eq!(*seen.lock(), vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
  }

  #[test]
  fn time_flush() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    supplier
      .supply()
      .batch(BatchConfig::new().seconds(Duration::from_secs(1)).scheduler(scheduler.shared()))
      .tap(move |batch| c_seen.lock().push(batch));

    supplier.emit(1);
    scheduler.advance_by(Duration::from_millis(400));
    supplier.emit(2);
    scheduler.advance_by(Duration::from_millis(600));
    assert_eq!(*seen.lock(), vec![vec![1, 2]]);

    // nothing pending: the next window starts with the next value
    scheduler.advance_by(Duration::from_secs(3));
    supplier.emit(3);
    scheduler.advance_by(Duration::from_millis(999));
    assert_eq!(seen.lock().len(), 1);
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(*seen.lock(), vec![vec![1, 2], vec![3]]);
  }

  #[test]
  fn count_wins_over_time() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    supplier
      .supply()
      .batch(
        BatchConfig::new().elems(2).seconds(Duration::from_secs(1)).scheduler(scheduler.shared()),
      )
      .tap(move |batch| c_seen.lock().push(batch));
    supplier.emit('a');
    supplier.emit('b');
    supplier.emit('c');
    scheduler.advance_by(Duration::from_millis(500));
    assert_eq!(*seen.lock(), vec![vec!['a', 'b']]);
    scheduler.advance_by(Duration::from_millis(500));
    assert_eq!(*seen.lock(), vec![vec!['a', 'b'], vec!['c']]);
  }

  #[test]
  fn close_cancels_timer() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let tap = supplier
      .supply()
      .batch(BatchConfig::new().seconds(Duration::from_secs(1)).scheduler(scheduler.shared()))
      .tap(|_| unreachable!());
    supplier.emit(1);
    assert_eq!(scheduler.pending_count(), 1);
    tap.close();
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.advance_by(Duration::from_secs(2));
  }

  #[test]
  fn quit_drops_partial_batch() {
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2) = (log.clone(), log.clone());
    let supplier = Supplier::new();
    supplier.supply().batch(BatchConfig::new().elems(10)).tap_all(
      move |b: Vec<i32>| l1.lock().push(format!("{b:?}")),
      || {},
      move |e| l2.lock().push(format!("quit:{e}")),
    );
    supplier.emit(1);
    supplier.quit("stop");
    assert_eq!(*log.lock(), vec!["quit:stop"]);
  }

  #[test]
  fn flushed_batch_can_feed_the_source() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let (c_seen, feedback) = (seen.clone(), supplier.clone());
    supplier
      .supply()
      .batch(BatchConfig::new().seconds(Duration::from_secs(1)).scheduler(scheduler.shared()))
      .tap(move |batch| {
        if batch == vec![1] {
          feedback.emit(2);
        }
        c_seen.lock().push(batch);
      });
    supplier.emit(1);
    scheduler.advance_by(Duration::from_secs(1));
    assert_eq!(*seen.lock(), vec![vec![1]]);
    scheduler.advance_by(Duration::from_secs(1));
    assert_eq!(*seen.lock(), vec![vec![1], vec![2]]);
  }
}
