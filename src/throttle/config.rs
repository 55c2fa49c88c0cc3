//! Options of [`Supply::throttle`](crate::supply::Supply::throttle).

use std::sync::Arc;

use crate::{
  error::{guarded_try, SupplyError},
  promise::Promise,
  scheduler::{default_scheduler, Duration, SharedScheduler},
  supplier::Supplier,
  supply::Supply,
  throttle::ThrottleStatus,
};

/// One processing run, settled into the value the throttle emits.
pub(crate) type Process<T, U> = Arc<dyn Fn(T) -> U + Send + Sync>;

pub(crate) enum Mode<T, U> {
  /// At most `limit` values per `period`, passed through `pass`.
  Rate { period: Duration, pass: fn(T) -> U },
  /// At most `limit` concurrent runs of `process`.
  Concurrent(Process<T, U>),
}

impl<T, U> Clone for Mode<T, U> {
  fn clone(&self) -> Self {
    match self {
      Mode::Rate { period, pass } => Mode::Rate { period: *period, pass: *pass },
      Mode::Concurrent(process) => Mode::Concurrent(process.clone()),
    }
  }
}

/// Throttle configuration.
///
/// Built with [`rate`](ThrottleConfig::rate) or
/// [`concurrent`](ThrottleConfig::concurrent), then refined with the
/// chained setters:
///
/// ```
/// use supply::prelude::*;
///
/// let status = Supplier::new();
/// let config = ThrottleConfig::rate(10, Duration::from_secs(1))
///   .delay(Duration::from_millis(500))
///   .vent_at(100)
///   .status(status.clone());
/// # let _: ThrottleConfig<i32> = config;
/// ```
pub struct ThrottleConfig<T, U = T> {
  pub(crate) limit: usize,
  pub(crate) mode: Mode<T, U>,
  pub(crate) delay: Option<Duration>,
  pub(crate) vent_at: usize,
  pub(crate) control: Option<Supply<String>>,
  pub(crate) status: Option<Supplier<ThrottleStatus>>,
  pub(crate) bleed: Option<Supplier<T>>,
  pub(crate) scheduler: SharedScheduler,
}

impl<T, U> Clone for ThrottleConfig<T, U> {
  fn clone(&self) -> Self {
    ThrottleConfig {
      limit: self.limit,
      mode: self.mode.clone(),
      delay: self.delay,
      vent_at: self.vent_at,
      control: self.control.clone(),
      status: self.status.clone(),
      bleed: self.bleed.clone(),
      scheduler: self.scheduler.clone(),
    }
  }
}

impl<T> ThrottleConfig<T, T> {
  /// Let at most `limit` values through per `period`. Values pass
  /// unchanged; the rest wait in a FIFO buffer.
  pub fn rate(limit: usize, period: Duration) -> Self {
    Self::with_mode(limit, Mode::Rate { period, pass: |v| v })
  }
}

impl<T, U: Clone + Send + 'static> ThrottleConfig<T, Promise<U>> {
  /// Run `process` on every value, at most `limit` runs at a time, and
  /// emit a [`Promise`] for each run when it completes: kept with its `Ok`,
  /// broken with its `Err` or panic. A failed run does not end the
  /// throttled supply.
  ///
  /// ```
  /// use std::sync::Arc;
  /// use supply::prelude::*;
  ///
  /// let scheduler = TestScheduler::new();
  /// let config = ThrottleConfig::concurrent(2, |v: i32| {
  ///   if v == 2 { Err(SupplyError::from("two")) } else { Ok(v * 10) }
  /// })
  /// .scheduler(scheduler.shared());
  /// let outcomes = Arc::new(parking_lot::Mutex::new(vec![]));
  /// let c_outcomes = outcomes.clone();
  /// Supply::from_iter(1..=3)
  ///   .throttle(config)
  ///   .tap(move |run: Promise<i32>| c_outcomes.lock().push(run.result().ok()));
  ///
  /// scheduler.advance_by(Duration::ZERO);
  /// assert_eq!(*outcomes.lock(), vec![Some(10), None, Some(30)]);
  /// ```
  pub fn concurrent<F>(limit: usize, process: F) -> Self
  where
    F: Fn(T) -> Result<U, SupplyError> + Send + Sync + 'static,
  {
    let process = Arc::new(process);
    Self::with_mode(
      limit,
      Mode::Concurrent(Arc::new(move |value| match guarded_try(|| process(value)) {
        Ok(result) => Promise::kept(result),
        Err(err) => Promise::broken(err),
      })),
    )
  }
}

impl<T, U> ThrottleConfig<T, U> {
  fn with_mode(limit: usize, mode: Mode<T, U>) -> Self {
    ThrottleConfig {
      limit,
      mode,
      delay: None,
      vent_at: 0,
      control: None,
      status: None,
      bleed: None,
      scheduler: default_scheduler(),
    }
  }

  pub fn limit(&self) -> usize { self.limit }

  /// Hold every permit until `delay` elapsed.
  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// Once more than `vent_at` values are buffered, route the oldest excess
  /// ones to the bleed supplier. Zero disables venting.
  pub fn vent_at(mut self, vent_at: usize) -> Self {
    self.vent_at = vent_at;
    self
  }

  /// Listen to `"key:value"` control messages on `control`.
  pub fn control(mut self, control: Supply<String>) -> Self {
    self.control = Some(control);
    self
  }

  /// Report [`ThrottleStatus`] records on `status`.
  pub fn status(mut self, status: Supplier<ThrottleStatus>) -> Self {
    self.status = Some(status);
    self
  }

  /// Receive vented and explicitly bled values on `bleed`. Without a bleed
  /// supplier they are dropped.
  pub fn bleed(mut self, bleed: Supplier<T>) -> Self {
    self.bleed = Some(bleed);
    self
  }

  /// Scheduler running refills, the startup delay and processing.
  pub fn scheduler(mut self, scheduler: SharedScheduler) -> Self {
    self.scheduler = scheduler;
    self
  }
}
