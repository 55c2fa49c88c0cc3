//! A settle-once result cell bridging supplies and futures.
//!
//! A [`Promise`] is either pending, kept with a value, or broken with a
//! [`SupplyError`]. The write side is a [`Resolver`]; dropping a resolver
//! without settling breaks the promise so waiters never hang.

use parking_lot::{Condvar, Mutex};
use std::{
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
  time::Duration,
};

use crate::{
  error::{guarded_try, SupplyError},
  scheduler::Scheduler,
};

/// Outcome of a settled promise.
pub type Settled<T> = Result<T, SupplyError>;
type Callback<T> = Box<dyn FnOnce(Settled<T>) + Send>;

struct PromiseState<T> {
  result: Option<Settled<T>>,
  callbacks: Vec<Callback<T>>,
  wakers: Vec<Waker>,
}

struct PromiseInner<T> {
  state: Mutex<PromiseState<T>>,
  settled: Condvar,
}

/// Read side of a settle-once result.
pub struct Promise<T> {
  inner: Arc<PromiseInner<T>>,
}

impl<T> Clone for Promise<T> {
  fn clone(&self) -> Self { Promise { inner: self.inner.clone() } }
}

/// Write side of a [`Promise`].
pub struct Resolver<T: Clone + Send + 'static> {
  promise: Option<Promise<T>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
  /// A pending promise and the resolver settling it.
  pub fn pending() -> (Promise<T>, Resolver<T>) {
    let promise = Promise {
      inner: Arc::new(PromiseInner {
        state: Mutex::new(PromiseState { result: None, callbacks: vec![], wakers: vec![] }),
        settled: Condvar::new(),
      }),
    };
    (promise.clone(), Resolver { promise: Some(promise) })
  }

  pub fn kept(value: T) -> Self {
    let (promise, resolver) = Self::pending();
    resolver.keep(value);
    promise
  }

  pub fn broken(err: impl Into<SupplyError>) -> Self {
    let (promise, resolver) = Self::pending();
    resolver.reject(err);
    promise
  }

  /// Run `f` on `scheduler`, keeping the promise with its `Ok` or breaking it
  /// with its `Err` (or with the panic it raised).
  pub fn start<F>(scheduler: &dyn Scheduler, f: F) -> Self
  where
    F: FnOnce() -> Result<T, SupplyError> + Send + 'static,
  {
    let (promise, resolver) = Self::pending();
    let mut job = Some((f, resolver));
    scheduler.schedule(
      Box::new(move || {
        if let Some((f, resolver)) = job.take() {
          resolver.settle(guarded_try(f));
        }
        crate::scheduler::TaskState::Finished
      }),
      None,
    );
    promise
  }

  pub fn is_settled(&self) -> bool { self.inner.state.lock().result.is_some() }

  /// The settled result, if any, without blocking.
  pub fn try_result(&self) -> Option<Settled<T>> { self.inner.state.lock().result.clone() }

  /// Block until settled.
  pub fn result(&self) -> Settled<T> {
    let mut state = self.inner.state.lock();
    loop {
      if let Some(result) = &state.result {
        return result.clone();
      }
      self.inner.settled.wait(&mut state);
    }
  }

  /// Block until settled or until `timeout` elapsed.
  pub fn result_timeout(&self, timeout: Duration) -> Option<Settled<T>> {
    let mut state = self.inner.state.lock();
    if state.result.is_none() {
      self.inner.settled.wait_for(&mut state, timeout);
    }
    state.result.clone()
  }

  /// Run `callback` once settled, right away if already settled.
  pub fn then<F>(&self, callback: F)
  where
    F: FnOnce(Settled<T>) + Send + 'static,
  {
    let settled = {
      let mut state = self.inner.state.lock();
      match &state.result {
        Some(result) => result.clone(),
        None => {
          state.callbacks.push(Box::new(callback));
          return;
        }
      }
    };
    callback(settled);
  }

  fn settle(&self, result: Settled<T>) -> bool {
    let (callbacks, wakers) = {
      let mut state = self.inner.state.lock();
      if state.result.is_some() {
        return false;
      }
      state.result = Some(result.clone());
      (std::mem::take(&mut state.callbacks), std::mem::take(&mut state.wakers))
    };
    self.inner.settled.notify_all();
    wakers.into_iter().for_each(Waker::wake);
    for callback in callbacks {
      callback(result.clone());
    }
    true
  }
}

impl<T: Clone + Send + 'static> Future for Promise<T> {
  type Output = Settled<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.inner.state.lock();
    match &state.result {
      Some(result) => Poll::Ready(result.clone()),
      None => {
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
          state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
      }
    }
  }
}

impl<T: Clone + Send + 'static> Resolver<T> {
  pub fn keep(self, value: T) -> bool { self.settle(Ok(value)) }

  pub fn reject(self, err: impl Into<SupplyError>) -> bool { self.settle(Err(err.into())) }

  /// Settle with `result`. Returns `false` if the promise was already settled.
  pub fn settle(mut self, result: Settled<T>) -> bool {
    self.promise.take().map_or(false, |promise| promise.settle(result))
  }
}

impl<T: Clone + Send + 'static> Drop for Resolver<T> {
  fn drop(&mut self) {
    if let Some(promise) = self.promise.take() {
      if promise.settle(Err(SupplyError::msg("promise abandoned before it was settled"))) {
        tracing::debug!("resolver dropped without settling");
      }
    }
  }
}
