//! Operators moving delivery onto a scheduler: `delayed` and `schedule_on`.
//!
//! Both park every signal in a FIFO queue and schedule one task per signal.
//! A task moves the oldest parked signal to a ready queue, which is drained
//! by one thread at a time, so signals keep their order even on a
//! multi-threaded scheduler.

use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

use super::gate::Signal;
use crate::{
  observer::FnObserver,
  scheduler::{Duration, SharedScheduler},
  supply::{Emitter, Supply},
};

struct RelayState<T> {
  parked: VecDeque<Signal<T>>,
  ready: VecDeque<Signal<T>>,
  draining: bool,
}

struct Relay<T> {
  state: Mutex<RelayState<T>>,
  out: Emitter<T>,
}

impl<T: Send + 'static> Relay<T> {
  fn new(out: Emitter<T>) -> Arc<Self> {
    let relay = Arc::new(Relay {
      state: Mutex::new(RelayState {
        parked: VecDeque::new(),
        ready: VecDeque::new(),
        draining: false,
      }),
      out,
    });
    let weak = Arc::downgrade(&relay);
    relay.out.on_close(move || {
      if let Some(relay) = weak.upgrade() {
        let mut state = relay.state.lock();
        state.parked.clear();
        state.ready.clear();
      }
    });
    relay
  }

  fn hop(
    self: &Arc<Self>,
    signal: Signal<T>,
    scheduler: &SharedScheduler,
    delay: Option<Duration>,
  ) {
    self.state.lock().parked.push_back(signal);
    let relay = self.clone();
    scheduler.schedule_once(delay, move || relay.release());
  }

  fn release(&self) {
    {
      let mut state = self.state.lock();
      if let Some(signal) = state.parked.pop_front() {
        state.ready.push_back(signal);
      }
      if state.draining || self.out.is_closed() {
        return;
      }
      state.draining = true;
    }
    let _reset = ReleaseReset(&self.state);
    loop {
      let signal = {
        let mut state = self.state.lock();
        match state.ready.pop_front() {
          Some(signal) => signal,
          None => {
            state.draining = false;
            return;
          }
        }
      };
      match signal {
        Signal::Emit(v) => self.out.emit(v),
        Signal::Done => self.out.done(),
        Signal::Quit(err) => self.out.quit(err),
      }
    }
  }
}

struct ReleaseReset<'a, T>(&'a Mutex<RelayState<T>>);

impl<T> Drop for ReleaseReset<'_, T> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.lock().draining = false;
    }
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Deliver every value and the done `delay` later, in order. A quit is
  /// delivered right away and drops the values still waiting.
  ///
  /// ```
  /// use std::sync::Arc;
  /// use supply::prelude::*;
  ///
  /// let scheduler = TestScheduler::new();
  /// let seen = Arc::new(parking_lot::Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_list(vec![1, 2])
  ///   .delayed(Duration::from_secs(1), scheduler.shared())
  ///   .tap(move |v| c_seen.lock().push(v));
  /// assert!(seen.lock().is_empty());
  /// scheduler.advance_by(Duration::from_secs(1));
  /// assert_eq!(*seen.lock(), vec![1, 2]);
  /// ```
  pub fn delayed(&self, delay: Duration, scheduler: SharedScheduler) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let relay = Relay::new(emitter.clone());
      let (next, done) = (relay.clone(), relay);
      let (next_scheduler, done_scheduler) = (scheduler.clone(), scheduler.clone());
      let quit = emitter.clone();
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| next.hop(Signal::Emit(v), &next_scheduler, Some(delay)))
          .with_done(move || done.hop(Signal::Done, &done_scheduler, Some(delay)))
          .with_quit(move |err| quit.quit(err)),
      );
    })
  }

  /// Deliver every signal from a task on `scheduler` instead of the thread
  /// that produced it, keeping their order.
  pub fn schedule_on(&self, scheduler: SharedScheduler) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let relay = Relay::new(emitter.clone());
      let (next, done, quit) = (relay.clone(), relay.clone(), relay);
      let (s1, s2, s3) = (scheduler.clone(), scheduler.clone(), scheduler.clone());
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| next.hop(Signal::Emit(v), &s1, None))
          .with_done(move || done.hop(Signal::Done, &s2, None))
          .with_quit(move |err| quit.hop(Signal::Quit(err), &s3, None)),
      );
    })
  }
}
