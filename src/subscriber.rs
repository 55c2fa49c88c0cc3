//! Per-tap ordered delivery.
//!
//! Every tap owns a [`Subscriber`]: an event queue plus the tap's observer.
//! Producers push events from any thread. Whichever thread finds the queue
//! idle becomes its single drainer and delivers queued events in order until
//! the queue is empty, so the observer never sees overlapping calls. A push
//! from inside the observer's own callback (re-entrant emit) is queued and
//! delivered after the current callback returns.

use parking_lot::Mutex;
use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use crate::{
  error::SupplyError,
  observer::Observer,
  tap::{Tap, TapState},
};

/// One notification travelling to a tap.
pub(crate) enum Event<T> {
  Emit(T),
  Done,
  Quit(SupplyError),
}

impl<T> Event<T> {
  #[inline]
  fn is_terminal(&self) -> bool { !matches!(self, Event::Emit(_)) }
}

struct Queue<T> {
  events: VecDeque<Event<T>>,
  draining: bool,
}

pub(crate) struct Subscriber<T> {
  tap: Arc<TapState>,
  terminated: AtomicBool,
  queue: Mutex<Queue<T>>,
  observer: Mutex<Box<dyn Observer<T>>>,
}

impl<T: Send + 'static> Subscriber<T> {
  pub(crate) fn new(observer: impl Observer<T>) -> Arc<Self> {
    Arc::new(Subscriber {
      tap: TapState::new(),
      terminated: AtomicBool::new(false),
      queue: Mutex::new(Queue { events: VecDeque::new(), draining: false }),
      observer: Mutex::new(Box::new(observer)),
    })
  }

  pub(crate) fn tap(&self) -> Tap { Tap::from_state(self.tap.clone()) }

  pub(crate) fn state(&self) -> &Arc<TapState> { &self.tap }

  /// Closed by its consumer, or a terminal event has already been accepted.
  #[inline]
  pub(crate) fn is_finished(&self) -> bool {
    self.tap.is_closed() || self.terminated.load(Ordering::Acquire)
  }

  /// Queue `event` and deliver it unless another thread is already draining.
  ///
  /// Returns the error of a quit that reached an observer without a quit
  /// handler. The caller re-raises it once it has released its own state.
  #[must_use]
  pub(crate) fn push(&self, event: Event<T>) -> Option<SupplyError> {
    if self.tap.is_closed() {
      return None;
    }
    {
      let mut queue = self.queue.lock();
      if event.is_terminal() {
        if self.terminated.swap(true, Ordering::AcqRel) {
          return None;
        }
      } else if self.terminated.load(Ordering::Acquire) {
        return None;
      }
      queue.events.push_back(event);
      if queue.draining {
        return None;
      }
      queue.draining = true;
    }
    self.drain()
  }

  fn drain(&self) -> Option<SupplyError> {
    let _reset = DrainReset(&self.queue);
    let mut unhandled = None;
    loop {
      let event = {
        let mut queue = self.queue.lock();
        if self.tap.is_closed() {
          queue.events.clear();
        }
        match queue.events.pop_front() {
          Some(event) => event,
          None => {
            queue.draining = false;
            return unhandled;
          }
        }
      };
      match event {
        Event::Emit(value) => {
          let mut observer = self.observer.lock();
          // a close that raced the queue check wins
          if !self.tap.is_closed() {
            observer.emit(value);
          }
        }
        Event::Done => {
          {
            let mut observer = self.observer.lock();
            if !self.tap.is_closed() {
              observer.done();
            }
          }
          self.tap.close();
        }
        Event::Quit(err) => {
          {
            let mut observer = self.observer.lock();
            if self.tap.is_closed() {
              tracing::debug!(error = %err, "quit raced a close, dropped");
            } else if observer.handles_quit() {
              observer.quit(err);
            } else {
              tracing::error!(
                error = %err,
                label = err.as_label(),
                "quit reached a tap without a quit handler"
              );
              unhandled = Some(err);
            }
          }
          self.tap.close();
        }
      }
    }
  }
}

/// Clears the draining flag if an observer panics mid-delivery, so the tap
/// does not wedge. The normal exit path clears it under the queue lock.
struct DrainReset<'a, T>(&'a Mutex<Queue<T>>);

impl<T> Drop for DrainReset<'_, T> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.lock().draining = false;
    }
  }
}

/// Re-raise an unhandled quit on the current thread.
pub(crate) fn raise_unhandled(err: Option<SupplyError>) {
  if let Some(err) = err {
    panic!("unhandled quit: {err}");
  }
}
