//! Throttle engine.
//!
//! A throttle hands out permits. In rate mode `limit` permits are refilled
//! every period and each permit lets one value through unchanged. In
//! concurrency mode a permit is one running invocation of the processing
//! function and comes back when that run completes; the run's outcome is
//! emitted as a settled [`Promise`](crate::promise::Promise), so a failed
//! run breaks its own promise only. Values without a permit
//! wait in a FIFO buffer, which can be vented into a bleed supplier.
//!
//! Buffer, permits and counters live under one lock. Everything a state
//! change wants to deliver is queued as an [`Effect`] and delivered after
//! the lock is released, by one thread at a time, so control messages sent
//! from a downstream callback neither deadlock nor reorder the output.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{collections::VecDeque, sync::Arc};

use crate::{
  error::SupplyError,
  observer::FnObserver,
  scheduler::{SharedScheduler, TaskHandle},
  supplier::Supplier,
  supply::{Emitter, Supply},
};

mod config;
mod control;
mod status;

use config::{Mode, Process};
pub use config::ThrottleConfig;
pub use control::ControlMessage;
pub use status::ThrottleStatus;

enum Effect<T, U> {
  Emit(U),
  Run(T),
  Bleed(T),
  Status(ThrottleStatus),
  Done,
  Quit(SupplyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Running,
  /// Upstream is done, waiting for the buffer and running work to drain.
  Draining,
  Finished,
}

struct ThrottleState<T, U> {
  limit: usize,
  allowed: i64,
  vent_at: usize,
  started: bool,
  buffer: VecDeque<T>,
  in_flight: usize,
  bled: usize,
  emitted: usize,
  status_id: u64,
  phase: Phase,
  timers: SmallVec<[TaskHandle; 2]>,
  effects: VecDeque<Effect<T, U>>,
  delivering: bool,
}

impl<T, U> ThrottleState<T, U> {
  fn snapshot(&mut self) -> ThrottleStatus {
    self.status_id += 1;
    ThrottleStatus {
      allowed: self.allowed,
      bled: self.bled,
      buffered: self.buffer.len(),
      emitted: self.emitted,
      id: self.status_id,
      limit: self.limit,
      vent_at: self.vent_at,
    }
  }

  /// Give permits to buffered values, oldest first.
  fn admit(&mut self, mode: &Mode<T, U>) {
    if !self.started {
      return;
    }
    while self.allowed > 0 {
      let Some(value) = self.buffer.pop_front() else { break };
      self.allowed -= 1;
      match mode {
        Mode::Rate { pass, .. } => {
          self.emitted += 1;
          self.effects.push_back(Effect::Emit(pass(value)));
        }
        Mode::Concurrent(_) => {
          self.in_flight += 1;
          self.effects.push_back(Effect::Run(value));
        }
      }
    }
  }

  fn bleed(&mut self, count: usize) {
    for _ in 0..count {
      let Some(value) = self.buffer.pop_front() else { break };
      self.bled += 1;
      self.effects.push_back(Effect::Bleed(value));
    }
  }

  fn vent(&mut self) {
    if self.vent_at > 0 && self.buffer.len() > self.vent_at {
      let excess = self.buffer.len() - self.vent_at;
      tracing::trace!(excess, vent_at = self.vent_at, "venting throttle buffer");
      self.bleed(excess);
    }
  }

  fn finish_if_drained(&mut self) {
    if self.phase == Phase::Draining && self.buffer.is_empty() && self.in_flight == 0 {
      self.stop();
      let status = self.snapshot();
      self.effects.push_back(Effect::Status(status));
      self.effects.push_back(Effect::Done);
    }
  }

  fn fault(&mut self, err: SupplyError) {
    self.stop();
    let status = self.snapshot();
    self.buffer.clear();
    self.effects.push_back(Effect::Status(status));
    self.effects.push_back(Effect::Quit(err));
  }

  fn stop(&mut self) {
    self.phase = Phase::Finished;
    self.timers.drain(..).for_each(|timer| timer.cancel());
  }
}

struct Engine<T, U> {
  state: Mutex<ThrottleState<T, U>>,
  mode: Mode<T, U>,
  out: Emitter<U>,
  bleed: Option<Supplier<T>>,
  status: Option<Supplier<ThrottleStatus>>,
  scheduler: SharedScheduler,
}

impl<T, U> Engine<T, U>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
{
  fn new(config: &ThrottleConfig<T, U>, out: Emitter<U>) -> Arc<Self> {
    let engine = Arc::new(Engine {
      state: Mutex::new(ThrottleState {
        limit: config.limit,
        allowed: 0,
        vent_at: config.vent_at,
        started: false,
        buffer: VecDeque::new(),
        in_flight: 0,
        bled: 0,
        emitted: 0,
        status_id: 0,
        phase: Phase::Running,
        timers: SmallVec::new(),
        effects: VecDeque::new(),
        delivering: false,
      }),
      mode: config.mode.clone(),
      out,
      bleed: config.bleed.clone(),
      status: config.status.clone(),
      scheduler: config.scheduler.clone(),
    });
    let weak = Arc::downgrade(&engine);
    engine.out.on_close(move || {
      if let Some(engine) = weak.upgrade() {
        let mut state = engine.state.lock();
        state.stop();
        state.buffer.clear();
        state.effects.clear();
      }
    });
    engine
  }

  /// Hand out the first permits and, in rate mode, start the refill timer.
  fn start(self: &Arc<Self>) {
    {
      let mut state = self.state.lock();
      if state.phase == Phase::Finished {
        return;
      }
      state.started = true;
      state.allowed = state.limit as i64;
      if let Mode::Rate { period, .. } = &self.mode {
        let engine = self.clone();
        let timer =
          self.scheduler.schedule_repeating(Some(*period), *period, move || engine.refill());
        state.timers.push(timer);
      }
      state.admit(&self.mode);
      state.finish_if_drained();
    }
    self.deliver();
  }

  fn on_value(self: &Arc<Self>, value: T) {
    {
      let mut state = self.state.lock();
      if state.phase != Phase::Running {
        return;
      }
      state.buffer.push_back(value);
      state.admit(&self.mode);
      state.vent();
    }
    self.deliver();
  }

  fn on_done(self: &Arc<Self>) {
    {
      let mut state = self.state.lock();
      if state.phase != Phase::Running {
        return;
      }
      state.phase = Phase::Draining;
      state.finish_if_drained();
    }
    self.deliver();
  }

  fn on_quit(self: &Arc<Self>, err: SupplyError) {
    {
      let mut state = self.state.lock();
      if state.phase == Phase::Finished {
        return;
      }
      state.fault(err);
    }
    self.deliver();
  }

  fn on_control(self: &Arc<Self>, message: &str) {
    let command = match message.parse::<ControlMessage>() {
      Ok(command) => command,
      Err(err) => {
        tracing::warn!(%err, "ignoring throttle control message");
        return;
      }
    };
    {
      let mut state = self.state.lock();
      if state.phase == Phase::Finished {
        return;
      }
      match command {
        ControlMessage::Limit(limit) => {
          let delta = limit as i64 - state.limit as i64;
          tracing::debug!(from = state.limit, to = limit, "throttle limit changed");
          state.limit = limit;
          if state.started {
            state.allowed += delta;
          }
          state.admit(&self.mode);
        }
        ControlMessage::Bleed(count) => state.bleed(count),
        ControlMessage::VentAt(vent_at) => {
          state.vent_at = vent_at;
          state.vent();
        }
        ControlMessage::Status => {
          let status = state.snapshot();
          state.effects.push_back(Effect::Status(status));
        }
      }
      state.finish_if_drained();
    }
    self.deliver();
  }

  fn refill(self: &Arc<Self>) -> bool {
    {
      let mut state = self.state.lock();
      if state.phase == Phase::Finished {
        return false;
      }
      state.allowed = state.limit as i64;
      state.admit(&self.mode);
      state.finish_if_drained();
    }
    self.deliver();
    true
  }

  /// A processing run finished and its permit comes back.
  fn complete(self: &Arc<Self>, output: U) {
    {
      let mut state = self.state.lock();
      state.in_flight -= 1;
      state.allowed += 1;
      if state.phase == Phase::Finished {
        return;
      }
      state.emitted += 1;
      state.effects.push_back(Effect::Emit(output));
      state.admit(&self.mode);
      state.finish_if_drained();
    }
    self.deliver();
  }

  fn run(self: &Arc<Self>, process: &Process<T, U>, value: T) {
    let (engine, process) = (self.clone(), process.clone());
    self.scheduler.schedule_once(None, move || engine.complete(process(value)));
  }

  fn deliver(self: &Arc<Self>) {
    {
      let mut state = self.state.lock();
      if state.delivering {
        return;
      }
      state.delivering = true;
    }
    let _reset = DeliverReset(&self.state);
    loop {
      let effect = {
        let mut state = self.state.lock();
        match state.effects.pop_front() {
          Some(effect) => effect,
          None => {
            state.delivering = false;
            return;
          }
        }
      };
      match effect {
        Effect::Emit(value) => self.out.emit(value),
        Effect::Run(value) => {
          if let Mode::Concurrent(process) = &self.mode {
            self.run(process, value);
          }
        }
        Effect::Bleed(value) => match &self.bleed {
          Some(bleed) => bleed.emit(value),
          None => tracing::trace!("no bleed supplier, dropping value"),
        },
        Effect::Status(status) => {
          if let Some(reports) = &self.status {
            reports.emit(status);
          }
        }
        Effect::Done => self.out.done(),
        Effect::Quit(err) => self.out.quit(err),
      }
    }
  }
}

struct DeliverReset<'a, T, U>(&'a Mutex<ThrottleState<T, U>>);

impl<T, U> Drop for DeliverReset<'_, T, U> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.lock().delivering = false;
    }
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Pace this supply with a permit based throttle.
  ///
  /// Each tap runs its own engine. Upstream done is forwarded once the
  /// buffer and all running work drained; a quit drops the buffer and is
  /// forwarded right away. Both first report a final [`ThrottleStatus`] on
  /// the status supplier, if one was configured. The status and bleed
  /// suppliers are never completed by the throttle.
  ///
  /// ```
  /// use std::sync::Arc;
  /// use supply::prelude::*;
  ///
  /// let scheduler = TestScheduler::new();
  /// let seen = Arc::new(parking_lot::Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// let config = ThrottleConfig::rate(2, Duration::from_secs(1)).scheduler(scheduler.shared());
  /// Supply::from_iter(0..5).throttle(config).tap(move |v| c_seen.lock().push(v));
  ///
  /// assert_eq!(*seen.lock(), vec![0, 1]);
  /// scheduler.advance_by(Duration::from_secs(1));
  /// assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
  /// ```
  pub fn throttle<U>(&self, config: ThrottleConfig<T, U>) -> Supply<U>
  where
    U: Clone + Send + 'static,
  {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<U>| {
      let engine = Engine::new(&config, emitter.clone());
      match config.delay {
        Some(delay) => {
          let starter = engine.clone();
          let timer = config.scheduler.schedule_once(Some(delay), move || starter.start());
          engine.state.lock().timers.push(timer);
        }
        None => engine.start(),
      }
      if let Some(control) = &config.control {
        let commands = engine.clone();
        emitter.tap_upstream(
          control,
          FnObserver::new(move |message: String| commands.on_control(&message))
            .with_done(|| {})
            .with_quit(|err: SupplyError| tracing::warn!(%err, "throttle control supply quit")),
        );
      }
      let (values, done, quit) = (engine.clone(), engine.clone(), engine);
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| values.on_value(v))
          .with_done(move || done.on_done())
          .with_quit(move |err| quit.on_quit(err)),
      );
    })
  }
}
