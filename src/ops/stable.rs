//! Stable: emit a value only once the stream has been quiet for a while.

use std::sync::Arc;

use super::gate::Gate;
use crate::{
  observer::FnObserver,
  scheduler::{Duration, SharedScheduler, TaskHandle},
  supply::{Emitter, Supply},
};

struct StableState<T> {
  trailing_value: Option<T>,
  generation: u64,
  task_handle: Option<TaskHandle>,
}

impl<T> StableState<T> {
  fn cancel(&mut self) {
    if let Some(handle) = self.task_handle.take() {
      handle.cancel();
    }
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Emit a value only when no newer value arrived within `time` after it.
  ///
  /// Every value restarts the quiet period. A value still waiting when the
  /// upstream is done is emitted before done; on quit it is dropped.
  ///
  /// ```
  /// use std::sync::Arc;
  /// use supply::prelude::*;
  ///
  /// let scheduler = TestScheduler::new();
  /// let supplier = Supplier::new();
  /// let seen = Arc::new(parking_lot::Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// supplier
  ///   .supply()
  ///   .stable(Duration::from_millis(100), scheduler.shared())
  ///   .tap(move |v| c_seen.lock().push(v));
  ///
  /// supplier.emit(42);
  /// supplier.emit(43);
  /// supplier.emit(44);
  /// scheduler.advance_by(Duration::from_millis(100));
  /// assert_eq!(*seen.lock(), vec![44]);
  /// ```
  pub fn stable(&self, time: Duration, scheduler: SharedScheduler) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let state = StableState { trailing_value: None, generation: 0, task_handle: None };
      let gate = Gate::new(state, emitter.clone());

      let weak = Arc::downgrade(&gate);
      emitter.on_close(move || {
        if let Some(gate) = weak.upgrade() {
          gate.with(|state, _| state.cancel());
        }
      });

      let (next, done, quit) = (gate.clone(), gate.clone(), gate);
      let scheduler = scheduler.clone();
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| {
          next.with(|locked, _| {
            locked.cancel();
            locked.generation += 1;
            locked.trailing_value = Some(v);
            let generation = locked.generation;
            let gate = next.clone();
            let handle = scheduler.schedule_once(Some(time), move || {
              gate.with(|state, outbox| {
                if state.generation != generation {
                  return;
                }
                state.task_handle = None;
                if let Some(value) = state.trailing_value.take() {
                  outbox.emit(value);
                }
              })
            });
            locked.task_handle = Some(handle);
          })
        })
        .with_done(move || {
          done.with(|state, outbox| {
            state.cancel();
            if let Some(value) = state.trailing_value.take() {
              outbox.emit(value);
            }
            outbox.done();
          })
        })
        .with_quit(move |err| {
          quit.with(|state, outbox| {
            state.cancel();
            state.trailing_value = None;
            outbox.quit(err);
          })
        }),
      );
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use parking_lot::Mutex;
  use std::sync::Arc;

  fn setup(
    time: u64,
  ) -> (TestScheduler, Supplier<i32>, Arc<Mutex<Vec<String>>>, Tap) {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    let tap = supplier.supply().stable(Duration::from_millis(time), scheduler.shared()).tap_all(
      move |v: i32| l1.lock().push(v.to_string()),
      move || l2.lock().push("done".into()),
      move |e| l3.lock().push(format!("quit:{e}")),
    );
    (scheduler, supplier, log, tap)
  }

  #[test]
  fn only_the_last_of_a_burst() {
    let (scheduler, supplier, log, _) = setup(100);
    supplier.emit(42);
    scheduler.advance_by(Duration::from_millis(30));
    supplier.emit(43);
    scheduler.advance_by(Duration::from_millis(30));
    supplier.emit(44);
    scheduler.advance_by(Duration::from_millis(99));
    assert!(log.lock().is_empty());
    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(*log.lock(), vec!["44"]);

    supplier.emit(45);
    scheduler.advance_by(Duration::from_millis(200));
    assert_eq!(*log.lock(), vec!["44", "45"]);
  }

  #[test]
  fn done_flushes_pending_value() {
    let (_scheduler, supplier, log, _) = setup(100);
    supplier.emit(1);
    supplier.emit(2);
    supplier.done();
    assert_eq!(*log.lock(), vec!["2", "done"]);
  }

  #[test]
  fn quit_drops_pending_value() {
    let (scheduler, supplier, log, _) = setup(100);
    supplier.emit(1);
    supplier.quit("gone");
    scheduler.advance_by(Duration::from_millis(200));
    assert_eq!(*log.lock(), vec!["quit:gone"]);
  }

  #[test]
  fn close_cancels_pending_emission() {
    let (scheduler, supplier, log, tap) = setup(100);
    supplier.emit(1);
    tap.close();
    assert_eq!(scheduler.pending_count(), 0);
    scheduler.advance_by(Duration::from_millis(200));
    assert!(log.lock().is_empty());
  }

  #[test]
  fn settled_value_can_feed_the_source() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let (c_seen, feedback) = (seen.clone(), supplier.clone());
    supplier.supply().stable(Duration::from_millis(100), scheduler.shared()).tap(move |v| {
      c_seen.lock().push(v);
      if v < 3 {
        feedback.emit(v + 1);
      }
    });
    supplier.emit(1);
    scheduler.advance_by(Duration::from_millis(100));
    assert_eq!(*seen.lock(), vec![1]);
    scheduler.advance_by(Duration::from_millis(200));
    assert_eq!(*seen.lock(), vec![1, 2, 3]);
  }
}
