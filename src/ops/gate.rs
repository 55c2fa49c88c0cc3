//! Serialized delivery for operators with shared state.
//!
//! A [`Gate`] owns an operator's state together with its output emitter.
//! Handlers update the state under the gate's lock and queue their output in
//! an [`Outbox`]; the queue is delivered once the lock is released, by one
//! thread at a time. A downstream callback feeding a value back into the
//! operator therefore queues behind the running delivery instead of waiting
//! on the lock it already holds.

use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

use crate::{error::SupplyError, supply::Emitter};

pub(crate) enum Signal<T> {
  Emit(T),
  Done,
  Quit(SupplyError),
}

/// Output queued while a gate's state is locked.
pub(crate) struct Outbox<U> {
  signals: VecDeque<Signal<U>>,
}

impl<U> Outbox<U> {
  pub(crate) fn emit(&mut self, value: U) { self.signals.push_back(Signal::Emit(value)) }

  pub(crate) fn done(&mut self) { self.signals.push_back(Signal::Done) }

  pub(crate) fn quit(&mut self, err: SupplyError) { self.signals.push_back(Signal::Quit(err)) }
}

struct Gated<S, U> {
  state: S,
  outbox: Outbox<U>,
  delivering: bool,
}

pub(crate) struct Gate<S, U> {
  inner: Mutex<Gated<S, U>>,
  out: Emitter<U>,
}

impl<S, U: Send + 'static> Gate<S, U> {
  pub(crate) fn new(state: S, out: Emitter<U>) -> Arc<Self> {
    let outbox = Outbox { signals: VecDeque::new() };
    Arc::new(Gate { inner: Mutex::new(Gated { state, outbox, delivering: false }), out })
  }

  /// Run `f` on the locked state, then deliver what it queued.
  pub(crate) fn with<R>(&self, f: impl FnOnce(&mut S, &mut Outbox<U>) -> R) -> R {
    let result = {
      let mut inner = self.inner.lock();
      let Gated { state, outbox, .. } = &mut *inner;
      f(state, outbox)
    };
    self.deliver();
    result
  }

  fn deliver(&self) {
    {
      let mut inner = self.inner.lock();
      if inner.delivering {
        return;
      }
      inner.delivering = true;
    }
    let _reset = DeliverReset(&self.inner);
    loop {
      let signal = {
        let mut inner = self.inner.lock();
        match inner.outbox.signals.pop_front() {
          Some(signal) => signal,
          None => {
            inner.delivering = false;
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

struct DeliverReset<'a, S, U>(&'a Mutex<Gated<S, U>>);

impl<S, U> Drop for DeliverReset<'_, S, U> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      let mut inner = self.0.lock();
      inner.delivering = false;
      inner.outbox.signals.clear();
    }
  }
}
