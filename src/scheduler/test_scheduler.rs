//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed,
//! enabling deterministic testing of `stable`, `batch`, `interval`,
//! `throttle` and friends.
//!
//! ```rust
//! use std::sync::Arc;
//! use supply::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let seen = Arc::new(parking_lot::Mutex::new(vec![]));
//! let c_seen = seen.clone();
//! Supply::interval(Duration::from_millis(10), None, scheduler.shared())
//!   .tap(move |v| c_seen.lock().push(v));
//!
//! scheduler.advance_by(Duration::from_millis(25));
//! assert_eq!(*seen.lock(), vec![0, 1, 2]);
//! ```
//!
//! Tasks run synchronously on the thread calling `advance_by`/`flush`, with
//! the scheduler's own lock released, so a task may schedule further tasks.
//! Unlike a thread-local clock, one instance can be shared with producers
//! living on other threads.

use parking_lot::Mutex;
use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc};

use super::{Duration, Scheduler, SharedScheduler, Task, TaskHandle, TaskState};

// ==================== Internal State ====================

#[derive(Default)]
struct TestSchedulerState {
  virtual_time: Duration,
  task_queue: BinaryHeap<ScheduledTask>,
  next_task_id: usize,
}

struct ScheduledTask {
  scheduled_time: Duration,
  task_id: usize,
  task: Task,
  handle: TaskHandle,
}

impl PartialEq for ScheduledTask {
  fn eq(&self, other: &Self) -> bool {
    self.scheduled_time == other.scheduled_time && self.task_id == other.task_id
  }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledTask {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by task_id
    other
      .scheduled_time
      .cmp(&self.scheduled_time)
      .then_with(|| other.task_id.cmp(&self.task_id))
  }
}

impl TestSchedulerState {
  fn push(&mut self, scheduled_time: Duration, task: Task, handle: TaskHandle) {
    let task_id = self.next_task_id;
    self.next_task_id += 1;
    self.task_queue.push(ScheduledTask { scheduled_time, task_id, task, handle });
  }
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
///
/// Clones share the same clock and queue.
#[derive(Clone, Default)]
pub struct TestScheduler {
  state: Arc<Mutex<TestSchedulerState>>,
}

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// This scheduler as a [`SharedScheduler`] for operator arguments.
  pub fn shared(&self) -> SharedScheduler { Arc::new(self.clone()) }

  /// Get the current virtual time.
  pub fn now(&self) -> Duration { self.state.lock().virtual_time }

  /// Number of tasks still waiting to run, cancelled ones excluded.
  pub fn pending_count(&self) -> usize {
    self
      .state
      .lock()
      .task_queue
      .iter()
      .filter(|t| !t.handle.is_cancelled())
      .count()
  }

  /// Advance virtual time by `duration`, running every task that becomes due
  /// in time order.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.now() + duration;
    while self.run_next(Some(target)) {}
    let mut state = self.state.lock();
    if state.virtual_time < target {
      state.virtual_time = target;
    }
  }

  /// Run pending tasks until the queue is empty, jumping the clock forward as
  /// needed. Repeating tasks that never finish stop after `max_runs` runs.
  pub fn flush(&self, max_runs: usize) {
    for _ in 0..max_runs {
      if !self.run_next(None) {
        break;
      }
    }
  }

  fn run_next(&self, until: Option<Duration>) -> bool {
    let next = {
      let mut state = self.state.lock();
      match state.task_queue.peek() {
        Some(t) if until.map_or(true, |until| t.scheduled_time <= until) => {
          let t = state.task_queue.pop();
          if let Some(t) = &t {
            if state.virtual_time < t.scheduled_time {
              state.virtual_time = t.scheduled_time;
            }
          }
          t
        }
        _ => None,
      }
    };
    let Some(mut scheduled) = next else { return false };
    if scheduled.handle.is_cancelled() {
      return true;
    }
    if let TaskState::Sleeping(period) = (scheduled.task)() {
      if !scheduled.handle.is_cancelled() {
        let at = scheduled.scheduled_time + period;
        self.state.lock().push(at, scheduled.task, scheduled.handle);
      }
    }
    true
  }
}

impl Scheduler for TestScheduler {
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let mut state = self.state.lock();
    let at = state.virtual_time + delay.unwrap_or(Duration::ZERO);
    state.push(at, task, handle.clone());
    handle
  }

  fn now(&self) -> Duration { TestScheduler::now(self) }
}
