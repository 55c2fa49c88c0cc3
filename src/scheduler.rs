//! Scheduling abstraction used by every timing based constructor.
//!
//! A [`Scheduler`] runs a [`Task`] now or after a delay. A task reports what
//! should happen next through [`TaskState`]: finish, or sleep and run again.
//! That is enough to express one-shot timers, intervals and the throttle
//! refill loop.
//!
//! There is no ambient scheduler. Timing operators take a
//! [`SharedScheduler`] argument; callers that do not care pass
//! [`default_scheduler()`], a single process-wide [`TokioScheduler`].

use once_cell::sync::Lazy;
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};
pub use std::time::{Duration, Instant};

mod test_scheduler;
mod thread_scheduler;
mod tokio_scheduler;

pub use test_scheduler::TestScheduler;
pub use thread_scheduler::ThreadScheduler;
pub use tokio_scheduler::TokioScheduler;

/// What a task wants after one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  /// The task is complete and is dropped.
  Finished,
  /// Run the task again after the given duration.
  Sleeping(Duration),
}

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnMut() -> TaskState + Send>;

/// A Scheduler is an object to order tasks and schedule their execution.
pub trait Scheduler: Send + Sync {
  /// Run `task` after `delay` (immediately when `None`). The returned handle
  /// cancels every future run of the task.
  fn schedule(&self, task: Task, delay: Option<Duration>) -> TaskHandle;

  /// Time elapsed on this scheduler's clock since it was created.
  fn now(&self) -> Duration;
}

/// Reference counted scheduler passed to timing operators.
pub type SharedScheduler = Arc<dyn Scheduler>;

impl dyn Scheduler {
  /// Schedule a closure that runs exactly once.
  pub fn schedule_once<F>(&self, delay: Option<Duration>, f: F) -> TaskHandle
  where
    F: FnOnce() + Send + 'static,
  {
    let mut f = Some(f);
    self.schedule(
      Box::new(move || {
        if let Some(f) = f.take() {
          f();
        }
        TaskState::Finished
      }),
      delay,
    )
  }

  /// Schedule `f` to run after `delay` and then every `period` for as long as
  /// it returns `true`.
  pub fn schedule_repeating<F>(
    &self,
    delay: Option<Duration>,
    period: Duration,
    mut f: F,
  ) -> TaskHandle
  where
    F: FnMut() -> bool + Send + 'static,
  {
    self.schedule(
      Box::new(move || if f() { TaskState::Sleeping(period) } else { TaskState::Finished }),
      delay,
    )
  }
}

/// Cancellation handle of a scheduled task.
///
/// Cancelling is idempotent. Schedulers check the handle before every run, so
/// a task that is currently executing completes its run but is never run
/// again.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
  cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
  pub fn new() -> Self { Self::default() }

  pub fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      tracing::trace!("scheduled task cancelled");
    }
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

static DEFAULT_SCHEDULER: Lazy<SharedScheduler> = Lazy::new(|| Arc::new(TokioScheduler::new()));

/// The process-wide default scheduler.
///
/// Built on first use and never dropped. Every call returns a handle to the
/// same instance.
pub fn default_scheduler() -> SharedScheduler { DEFAULT_SCHEDULER.clone() }
