use std::thread;

use super::{Duration, Instant, Scheduler, Task, TaskHandle, TaskState};

/// Scheduler that creates a new OS thread for each task.
///
/// Sleeps are plain `thread::sleep`, so a cancelled task notices the
/// cancellation when its current sleep ends.
#[derive(Clone)]
pub struct ThreadScheduler {
  epoch: Instant,
}

impl ThreadScheduler {
  pub fn new() -> Self { ThreadScheduler { epoch: Instant::now() } }
}

impl Default for ThreadScheduler {
  fn default() -> Self { Self::new() }
}

impl Scheduler for ThreadScheduler {
  fn schedule(&self, mut task: Task, delay: Option<Duration>) -> TaskHandle {
    let handle = TaskHandle::new();
    let c_handle = handle.clone();
    let spawned = thread::Builder::new()
      .name("supply-task".into())
      .spawn(move || {
        if let Some(delay) = delay {
          thread::sleep(delay);
        }
        while !c_handle.is_cancelled() {
          match task() {
            TaskState::Finished => break,
            TaskState::Sleeping(period) => thread::sleep(period),
          }
        }
      });
    if let Err(err) = spawned {
      tracing::error!(%err, "failed to spawn scheduler thread");
      handle.cancel();
    }
    handle
  }

  fn now(&self) -> Duration { self.epoch.elapsed() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc::channel;

  #[test]
  fn runs_on_another_thread() {
    let scheduler = ThreadScheduler::new();
    let (tx, rx) = channel();
    let caller = thread::current().id();
    scheduler.schedule(
      Box::new(move || {
        tx.send(thread::current().id()).unwrap();
        TaskState::Finished
      }),
      Some(Duration::from_millis(1)),
    );
    assert_ne!(rx.recv().unwrap(), caller);
  }

  #[test]
  fn cancelled_before_start_never_runs() {
    let scheduler = ThreadScheduler::new();
    let (tx, rx) = channel::<()>();
    let handle = scheduler.schedule(
      Box::new(move || {
        tx.send(()).unwrap();
        TaskState::Finished
      }),
      Some(Duration::from_millis(30)),
    );
    handle.cancel();
    assert!(rx.recv_timeout(Duration::from_millis(80)).is_err());
  }
}
