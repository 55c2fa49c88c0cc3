use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Handle, Runtime};

use super::{Duration, Instant, Scheduler, Task, TaskHandle, TaskState};

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
  Builder::new_multi_thread()
    .enable_time()
    .thread_name("supply-scheduler")
    .build()
    .expect("failed to build the supply scheduler runtime")
});

/// Scheduler backed by a multi-threaded tokio runtime.
///
/// Tasks may block (user callbacks often do), so every run is wrapped in
/// `block_in_place`. That requires a multi-thread runtime: the one built by
/// [`TokioScheduler::new`] is, a handle passed to
/// [`TokioScheduler::with_handle`] must be too.
#[derive(Clone)]
pub struct TokioScheduler {
  handle: Handle,
  epoch: Instant,
}

impl TokioScheduler {
  /// Scheduler on the crate's own lazily built runtime.
  pub fn new() -> Self { Self::with_handle(RUNTIME.handle().clone()) }

  /// Scheduler spawning onto an existing multi-thread runtime.
  pub fn with_handle(handle: Handle) -> Self { TokioScheduler { handle, epoch: Instant::now() } }
}

impl Default for TokioScheduler {
  fn default() -> Self { Self::new() }
}

impl Scheduler for TokioScheduler {
  fn schedule(&self, mut task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    self.handle.spawn(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      while !c_handle.is_cancelled() {
        match tokio::task::block_in_place(&mut task) {
          TaskState::Finished => break,
          TaskState::Sleeping(period) => tokio::time::sleep(period).await,
        }
      }
    });
    handle
  }

  fn now(&self) -> Duration { self.epoch.elapsed() }
}
