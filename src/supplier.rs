//! Write side of a live supply.
//!
//! A [`Supplier`] exclusively owns the registry of active taps. Every
//! [`Supply`] obtained from it is a read handle sharing that registry, and
//! each registered tap keeps only a `Weak` pointer back to it, used to
//! deregister on close.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  sync::{Arc, Weak},
};

use crate::{
  error::SupplyError,
  subscriber::{raise_unhandled, Event, Subscriber},
  supply::Supply,
};

type Slots<T> = SmallVec<[(usize, Arc<Subscriber<T>>); 4]>;

#[derive(Clone)]
pub(crate) enum Outcome {
  Done,
  Quit(SupplyError),
}

impl Outcome {
  fn event<T>(&self) -> Event<T> {
    match self {
      Outcome::Done => Event::Done,
      Outcome::Quit(err) => Event::Quit(err.clone()),
    }
  }
}

struct RegistryState<T> {
  slots: Slots<T>,
  next_id: usize,
  outcome: Option<Outcome>,
}

/// Active taps of one live supply.
pub(crate) struct Registry<T> {
  state: Mutex<RegistryState<T>>,
  pub(crate) act_lock: Arc<Mutex<()>>,
}

impl<T: Clone + Send + 'static> Registry<T> {
  fn new() -> Arc<Self> {
    Arc::new(Registry {
      state: Mutex::new(RegistryState { slots: SmallVec::new(), next_id: 0, outcome: None }),
      act_lock: Arc::new(Mutex::new(())),
    })
  }

  /// Register a subscriber. A finished supply answers with its terminal
  /// right away instead.
  pub(crate) fn attach(self: &Arc<Self>, subscriber: Arc<Subscriber<T>>) {
    let attached = {
      let mut state = self.state.lock();
      match &state.outcome {
        Some(outcome) => Err(outcome.clone()),
        None => {
          let id = state.next_id;
          state.next_id += 1;
          state.slots.push((id, subscriber.clone()));
          tracing::trace!(id, taps = state.slots.len(), "tap attached to live supply");
          Ok(id)
        }
      }
    };
    match attached {
      Ok(id) => {
        let registry = Arc::downgrade(self);
        subscriber.state().on_close(move || Registry::detach(&registry, id));
      }
      Err(outcome) => raise_unhandled(subscriber.push(outcome.event())),
    }
  }

  fn detach(registry: &Weak<Self>, id: usize) {
    if let Some(registry) = registry.upgrade() {
      registry.state.lock().slots.retain(|(slot, _)| *slot != id);
    }
  }

  fn snapshot(&self) -> Option<SmallVec<[Arc<Subscriber<T>>; 4]>> {
    let state = self.state.lock();
    if state.outcome.is_some() {
      return None;
    }
    Some(state.slots.iter().map(|(_, s)| s.clone()).collect())
  }

  fn emit(&self, value: T) {
    let Some(subscribers) = self.snapshot() else {
      tracing::trace!("emit after completion ignored");
      return;
    };
    let mut iter = subscribers.into_iter().peekable();
    let mut fan_out = FanOut::default();
    while let Some(subscriber) = iter.next() {
      if iter.peek().is_some() {
        fan_out.push(&subscriber, Event::Emit(value.clone()));
      } else {
        fan_out.push(&subscriber, Event::Emit(value));
        break;
      }
    }
    fan_out.finish();
  }

  fn finish(&self, outcome: Outcome) {
    let slots = {
      let mut state = self.state.lock();
      if state.outcome.is_some() {
        return;
      }
      state.outcome = Some(outcome.clone());
      std::mem::take(&mut state.slots)
    };
    let mut fan_out = FanOut::default();
    for (_, subscriber) in slots {
      fan_out.push(&subscriber, outcome.event());
    }
    fan_out.finish();
  }

  pub(crate) fn is_finished(&self) -> bool { self.state.lock().outcome.is_some() }

  pub(crate) fn tap_count(&self) -> usize { self.state.lock().slots.len() }
}

/// Delivers one event per tap, isolating taps from each other: a panicking
/// callback or an unhandled quit is re-raised only after every tap was
/// served.
#[derive(Default)]
struct FanOut {
  unhandled: Option<SupplyError>,
  panic: Option<Box<dyn Any + Send>>,
}

impl FanOut {
  fn push<T: Send + 'static>(&mut self, subscriber: &Subscriber<T>, event: Event<T>) {
    match panic::catch_unwind(AssertUnwindSafe(|| subscriber.push(event))) {
      Ok(err) => {
        if self.unhandled.is_none() {
          self.unhandled = err;
        }
      }
      Err(payload) => {
        self.panic.get_or_insert(payload);
      }
    }
  }

  fn finish(self) {
    if let Some(payload) = self.panic {
      panic::resume_unwind(payload);
    }
    raise_unhandled(self.unhandled);
  }
}

/// The producer side of a live [`Supply`].
///
/// `emit`, `done` and `quit` may be called from any thread. Once `done` or
/// `quit` ran, further calls are ignored.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use supply::prelude::*;
///
/// let supplier = Supplier::new();
/// let seen = Arc::new(Mutex::new(vec![]));
/// let c_seen = seen.clone();
/// supplier.emit(0); // nobody listens yet: lost
/// supplier.supply().tap(move |v| c_seen.lock().unwrap().push(v));
/// supplier.emit(1);
/// supplier.emit(2);
/// supplier.done();
/// assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
/// ```
pub struct Supplier<T> {
  registry: Arc<Registry<T>>,
}

impl<T> Clone for Supplier<T> {
  fn clone(&self) -> Self { Supplier { registry: self.registry.clone() } }
}

impl<T: Clone + Send + 'static> Supplier<T> {
  pub fn new() -> Self { Supplier { registry: Registry::new() } }

  /// A live read handle on this supplier.
  pub fn supply(&self) -> Supply<T> { Supply::live(self.registry.clone()) }

  /// Deliver `value` to every tap registered right now.
  pub fn emit(&self, value: T) { self.registry.emit(value) }

  /// Complete successfully.
  pub fn done(&self) { self.registry.finish(Outcome::Done) }

  /// Complete with a failure. Taps without a quit callback re-raise it on
  /// this thread after every tap has been notified.
  pub fn quit(&self, err: impl Into<SupplyError>) {
    self.registry.finish(Outcome::Quit(err.into()))
  }

  pub fn is_finished(&self) -> bool { self.registry.is_finished() }

  /// Number of currently active taps.
  pub fn tap_count(&self) -> usize { self.registry.tap_count() }
}

impl<T: Clone + Send + 'static> Default for Supplier<T> {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[test]
  fn values_before_tap_are_lost() {
    let supplier = Supplier::new();
    supplier.emit(1);
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    supplier.supply().tap(move |v| c_seen.lock().push(v));
    supplier.emit(2);
    assert_eq!(*seen.lock(), vec![2]);
  }

  #[test]
  fn late_tap_sees_done_immediately() {
    let supplier = Supplier::<i32>::new();
    supplier.done();
    let done = Arc::new(AtomicUsize::new(0));
    let c_done = done.clone();
    let tap = supplier.supply().tap_done(
      |_| unreachable!(),
      move || {
        c_done.fetch_add(1, Ordering::SeqCst);
      },
    );
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(tap.is_closed());
  }

  #[test]
  fn late_tap_sees_quit() {
    let supplier = Supplier::<i32>::new();
    supplier.quit("gone");
    let err = Arc::new(Mutex::new(None));
    let c_err = err.clone();
    supplier.supply().tap_all(|_| {}, || {}, move |e| *c_err.lock() = Some(e.to_string()));
    assert_eq!(err.lock().as_deref(), Some("gone"));
  }

  #[test]
  fn calls_after_done_are_ignored() {
    let supplier = Supplier::new();
    let log = Arc::new(Mutex::new(vec![]));
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    supplier.supply().tap_all(
      move |v: i32| l1.lock().push(v.to_string()),
      move || l2.lock().push("done".to_string()),
      move |_| l3.lock().push("quit".to_string()),
    );
    supplier.emit(1);
    supplier.done();
    supplier.emit(2);
    supplier.quit("late");
    supplier.done();
    assert_eq!(*log.lock(), vec!["1", "done"]);
    assert!(supplier.is_finished());
  }

  #[test]
  fn closed_taps_are_deregistered() {
    let supplier = Supplier::<i32>::new();
    let a = supplier.supply().tap(|_| {});
    let _b = supplier.supply().tap(|_| {});
    assert_eq!(supplier.tap_count(), 2);
    a.close();
    a.close();
    assert_eq!(supplier.tap_count(), 1);
  }

  #[test]
  fn close_inside_callback_during_fan_out() {
    let supplier = Supplier::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<crate::tap::Tap>>> = Arc::new(Mutex::new(None));
    let (c_hits, c_slot) = (hits.clone(), slot.clone());
    let tap = supplier.supply().tap(move |_: i32| {
      c_hits.fetch_add(1, Ordering::SeqCst);
      if let Some(tap) = c_slot.lock().as_ref() {
        tap.close();
      }
    });
    *slot.lock() = Some(tap);
    supplier.emit(1);
    supplier.emit(2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(supplier.tap_count(), 0);
  }

  #[test]
  fn unhandled_quit_panics_after_fan_out() {
    let supplier = Supplier::<i32>::new();
    supplier.supply().tap(|_| {});
    let handled = Arc::new(AtomicUsize::new(0));
    let c_handled = handled.clone();
    supplier.supply().tap_all(
      |_| {},
      || {},
      move |_| {
        c_handled.fetch_add(1, Ordering::SeqCst);
      },
    );
    let c_supplier = supplier.clone();
    let result = std::thread::spawn(move || c_supplier.quit("unheard")).join();
    assert!(result.is_err());
    assert_eq!(handled.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn concurrent_producers() {
    let supplier = Supplier::new();
    let total = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
      let total = total.clone();
      supplier.supply().tap(move |v: usize| {
        total.fetch_add(v, Ordering::SeqCst);
      });
    }
    let handles: Vec<_> = (0..4)
      .map(|_| {
        let supplier = supplier.clone();
        std::thread::spawn(move || (1..=100).for_each(|v| supplier.emit(v)))
      })
      .collect();
    handles.into_iter().for_each(|h| h.join().unwrap());
    assert_eq!(total.load(Ordering::SeqCst), 3 * 4 * 5050);
  }
}
