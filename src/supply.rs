//! The multicast stream.
//!
//! A [`Supply`] is either *live* or *on-demand*:
//!
//! - **live** supplies come from a [`Supplier`](crate::supplier::Supplier).
//!   A tap only sees values emitted after it was registered, and a tap on a
//!   finished live supply immediately gets its done (or quit) callback.
//! - **on-demand** supplies wrap a production function. Every tap runs that
//!   function against its own [`Emitter`], so two taps are two independent
//!   productions. Closing a tap stops only its own production.
//!
//! Every operator in [`ops`](crate::ops) returns an on-demand supply whose
//! production taps the upstream supply through [`Emitter::tap_upstream`].

use parking_lot::Mutex;
use std::{
  panic::{self, AssertUnwindSafe},
  sync::Arc,
};

use crate::{
  error::SupplyError,
  observer::{FnObserver, Observer},
  subscriber::{raise_unhandled, Event, Subscriber},
  supplier::Registry,
  tap::Tap,
};

type Production<T> = Arc<dyn Fn(Emitter<T>) + Send + Sync>;

enum Kind<T> {
  Live(Arc<Registry<T>>),
  OnDemand(Production<T>),
}

/// A multicast, push-based stream of `T` ending in done or quit.
///
/// Cloning a `Supply` clones the handle, not the stream.
pub struct Supply<T> {
  kind: Kind<T>,
  act_lock: Arc<Mutex<()>>,
}

impl<T> Clone for Supply<T> {
  fn clone(&self) -> Self {
    let kind = match &self.kind {
      Kind::Live(registry) => Kind::Live(registry.clone()),
      Kind::OnDemand(production) => Kind::OnDemand(production.clone()),
    };
    Supply { kind, act_lock: self.act_lock.clone() }
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  pub(crate) fn live(registry: Arc<Registry<T>>) -> Self {
    let act_lock = registry.act_lock.clone();
    Supply { kind: Kind::Live(registry), act_lock }
  }

  /// An on-demand supply running `production` once per tap.
  ///
  /// ```rust
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let countdown = Supply::on_demand(|emitter: Emitter<u32>| {
  ///   for v in (1..=3).rev() {
  ///     emitter.emit(v);
  ///   }
  ///   emitter.done();
  /// });
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// countdown.tap(move |v| c_seen.lock().unwrap().push(v));
  /// assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1]);
  /// ```
  pub fn on_demand<F>(production: F) -> Self
  where
    F: Fn(Emitter<T>) + Send + Sync + 'static,
  {
    Supply { kind: Kind::OnDemand(Arc::new(production)), act_lock: Arc::new(Mutex::new(())) }
  }

  pub fn is_live(&self) -> bool { matches!(self.kind, Kind::Live(_)) }

  pub(crate) fn attach(&self, subscriber: Arc<Subscriber<T>>) {
    match &self.kind {
      Kind::Live(registry) => registry.attach(subscriber),
      Kind::OnDemand(production) => {
        tracing::trace!("starting on-demand production");
        let emitter = Emitter { subscriber };
        let produced = panic::catch_unwind(AssertUnwindSafe(|| (**production)(emitter.clone())));
        if let Err(payload) = produced {
          // nothing left to quit once the tap finished
          if emitter.is_closed() {
            panic::resume_unwind(payload);
          }
          emitter.quit(SupplyError::from_panic(payload));
        }
      }
    }
  }

  /// Tap with a full [`Observer`].
  pub fn tap_with<O: Observer<T>>(&self, observer: O) -> Tap {
    let subscriber = Subscriber::new(observer);
    let tap = subscriber.tap();
    self.attach(subscriber);
    tap
  }

  /// Tap values only. A quit reaching this tap is re-raised on the
  /// delivering thread.
  pub fn tap<N>(&self, on_emit: N) -> Tap
  where
    N: FnMut(T) + Send + 'static,
  {
    self.tap_with(FnObserver::new(on_emit))
  }

  /// Tap values and completion.
  pub fn tap_done<N, D>(&self, on_emit: N, on_done: D) -> Tap
  where
    N: FnMut(T) + Send + 'static,
    D: FnOnce() + Send + 'static,
  {
    self.tap_with(FnObserver::new(on_emit).with_done(on_done))
  }

  /// Tap values, completion and failure.
  pub fn tap_all<N, D, Q>(&self, on_emit: N, on_done: D, on_quit: Q) -> Tap
  where
    N: FnMut(T) + Send + 'static,
    D: FnOnce() + Send + 'static,
    Q: FnOnce(SupplyError) + Send + 'static,
  {
    self.tap_with(FnObserver::new(on_emit).with_done(on_done).with_quit(on_quit))
  }

  /// Like [`tap`](Supply::tap), but every `act` tap of this supply (and its
  /// clones) runs its block under one shared lock, so blocks touching the
  /// same external state never run concurrently.
  pub fn act<N>(&self, mut block: N) -> Tap
  where
    N: FnMut(T) + Send + 'static,
  {
    let lock = self.act_lock.clone();
    self.tap(move |v| {
      let _guard = lock.lock();
      block(v)
    })
  }
}

/// The private delivery context of one on-demand tap.
///
/// Values pushed through an emitter reach only the tap it was created for.
/// Once `done`/`quit` was called, or the tap was closed, everything else is
/// ignored and [`is_closed`](Emitter::is_closed) reports `true`; long-running
/// productions should poll it.
pub struct Emitter<T> {
  subscriber: Arc<Subscriber<T>>,
}

impl<T> Clone for Emitter<T> {
  fn clone(&self) -> Self { Emitter { subscriber: self.subscriber.clone() } }
}

impl<T: Send + 'static> Emitter<T> {
  /// Emit a value. When this thread drains the tap and meets a quit queued
  /// meanwhile by another thread for a tap without a quit handler, this
  /// panics like [`Emitter::quit`] would.
  pub fn emit(&self, value: T) { raise_unhandled(self.subscriber.push(Event::Emit(value))) }

  pub fn done(&self) { raise_unhandled(self.subscriber.push(Event::Done)) }

  pub fn quit(&self, err: impl Into<SupplyError>) {
    raise_unhandled(self.subscriber.push(Event::Quit(err.into())))
  }

  /// Forward a result: `Ok` is emitted, `Err` quits.
  pub fn emit_result(&self, result: Result<T, SupplyError>) {
    match result {
      Ok(value) => self.emit(value),
      Err(err) => self.quit(err),
    }
  }

  pub fn is_closed(&self) -> bool { self.subscriber.is_finished() }

  /// Run `hook` when this tap closes: on consumer close, or right after the
  /// done/quit callback was delivered.
  pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
    self.subscriber.state().on_close(hook)
  }

  /// Tap `source` for the lifetime of this emitter. The upstream tap is
  /// linked before `source` starts producing, so closing this emitter's tap
  /// stops even a synchronous upstream production.
  pub fn tap_upstream<U, O>(&self, source: &Supply<U>, observer: O) -> Tap
  where
    U: Clone + Send + 'static,
    O: Observer<U>,
  {
    let upstream = Subscriber::new(observer);
    let tap = upstream.tap();
    let c_tap = tap.clone();
    self.on_close(move || c_tap.close());
    source.attach(upstream);
    tap
  }

  /// Tap `source` handling its values with `on_emit` and forwarding its done
  /// and quit to this emitter.
  pub fn pipe<U, N>(&self, source: &Supply<U>, on_emit: N) -> Tap
  where
    U: Clone + Send + 'static,
    N: FnMut(U) + Send + 'static,
  {
    let (done, quit) = (self.clone(), self.clone());
    self.tap_upstream(
      source,
      FnObserver::new(on_emit).with_done(move || done.done()).with_quit(move |err| quit.quit(err)),
    )
  }
}
