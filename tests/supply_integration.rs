//! Integration tests for supply
//!
//! Exercises operator chains across threads, schedulers and bridges through
//! the public API only.

use parking_lot::Mutex;
use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  thread,
};

use supply::prelude::*;

fn log_all<T>(supply: &Supply<T>) -> Arc<Mutex<Vec<String>>>
where
  T: Clone + Send + std::fmt::Debug + 'static,
{
  let log = Arc::new(Mutex::new(vec![]));
  let (c_log, d_log, q_log) = (log.clone(), log.clone(), log.clone());
  supply.tap_all(
    move |v| c_log.lock().push(format!("{v:?}")),
    move || d_log.lock().push("done".to_string()),
    move |err| q_log.lock().push(format!("quit:{err}")),
  );
  log
}

#[test]
fn live_taps_never_see_earlier_values() {
  let supplier = Supplier::<i32>::new();
  supplier.emit(1);
  let log = log_all(&supplier.supply());
  supplier.emit(2);
  supplier.done();
  supplier.emit(3);
  assert_eq!(*log.lock(), vec!["2", "done"]);

  // a tap on a finished live supply only gets the terminal
  let late = log_all(&supplier.supply());
  assert_eq!(*late.lock(), vec!["done"]);
}

#[test]
fn on_demand_taps_count_independently() {
  let scheduler = TestScheduler::new();
  let period = Duration::from_millis(100);
  let ticks = Supply::interval(period, Some(period), scheduler.shared());
  let a = log_all(&ticks);
  scheduler.advance_by(Duration::from_millis(250));
  let b = log_all(&ticks);
  scheduler.advance_by(Duration::from_millis(240));
  assert_eq!(*a.lock(), vec!["0", "1", "2", "3"]);
  assert_eq!(*b.lock(), vec!["0", "1"]);
}

#[test]
fn merge_is_done_only_when_every_input_is() {
  let (left, right) = (Supplier::<i32>::new(), Supplier::<i32>::new());
  let log = log_all(&left.supply().merge(&right.supply()));
  left.emit(1);
  right.emit(2);
  left.done();
  right.emit(3);
  assert_eq!(*log.lock(), vec!["1", "2", "3"]);
  right.done();
  assert_eq!(*log.lock(), vec!["1", "2", "3", "done"]);
}

#[test]
fn merge_quits_on_the_first_quit() {
  let (left, right) = (Supplier::<i32>::new(), Supplier::<i32>::new());
  let log = log_all(&ops::merge(vec![left.supply(), right.supply()]));
  left.emit(1);
  right.quit("right failed");
  left.emit(2);
  assert_eq!(*log.lock(), vec!["1", "quit:right failed"]);
  assert_eq!(left.tap_count(), 0);
}

#[test]
fn zip_pairs_in_order_then_done() {
  let numbers = Supply::from_list(vec![1, 2, 3]);
  let letters = Supply::from_list(vec!['a', 'b', 'c']);
  let pairs: Result<Vec<_>, _> = numbers.zip_pair(&letters).list().collect();
  assert_eq!(pairs.unwrap(), vec![(1, 'a'), (2, 'b'), (3, 'c')]);
}

#[test]
fn stable_emits_the_last_value_after_quiet() {
  let scheduler = TestScheduler::new();
  let supplier = Supplier::<i32>::new();
  let log = log_all(&supplier.supply().stable(Duration::from_millis(100), scheduler.shared()));
  supplier.emit(42);
  scheduler.advance_by(Duration::from_millis(30));
  supplier.emit(43);
  scheduler.advance_by(Duration::from_millis(30));
  supplier.emit(44);
  scheduler.advance_by(Duration::from_millis(99));
  assert!(log.lock().is_empty());
  scheduler.advance_by(Duration::from_millis(1));
  assert_eq!(*log.lock(), vec!["44"]);
}

#[test]
fn throttled_processing_respects_the_limit() {
  let running = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let (c_running, c_peak) = (running.clone(), peak.clone());
  let (bleed, status) = (Supplier::<i32>::new(), Supplier::<ThrottleStatus>::new());
  let last = Arc::new(Mutex::new(None));
  let c_last = last.clone();
  status.supply().tap(move |s| *c_last.lock() = Some(s));

  let config = ThrottleConfig::concurrent(3, move |v: i32| {
    let now = c_running.fetch_add(1, Ordering::SeqCst) + 1;
    c_peak.fetch_max(now, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(10));
    c_running.fetch_sub(1, Ordering::SeqCst);
    Ok(v + 100)
  })
  .vent_at(2)
  .bleed(bleed)
  .status(status)
  .scheduler(default_scheduler());

  let throttled = Supply::from_iter(0..6).throttle(config);
  let runs: Vec<Promise<i32>> = throttled.list().map(Result::unwrap).collect();
  let results: Vec<i32> = runs.iter().map(|run| run.result().unwrap()).collect();
  assert!(peak.load(Ordering::SeqCst) <= 3);
  let last = last.lock().expect("a final status record");
  assert_eq!(last.emitted, results.len());
  assert_eq!(last.emitted, 6 - last.bled);
  assert!(results.iter().all(|v| (100..106).contains(v)));
}

#[test]
fn list_materializes_a_list() {
  let values = vec!["x".to_string(), "y".to_string(), "z".to_string()];
  let listed: Result<Vec<_>, _> = Supply::from_list(values.clone()).list().collect();
  assert_eq!(listed.unwrap(), values);
}

#[test]
fn closing_twice_runs_hooks_once() {
  let supplier = Supplier::<i32>::new();
  let tap = supplier.supply().tap(|_| {});
  let closes = Arc::new(AtomicUsize::new(0));
  let c_closes = closes.clone();
  tap.on_close(move || {
    c_closes.fetch_add(1, Ordering::SeqCst);
  });
  tap.close();
  tap.close();
  assert!(tap.is_closed());
  assert_eq!(closes.load(Ordering::SeqCst), 1);
  assert_eq!(supplier.tap_count(), 0);
}

#[test]
fn unhandled_quit_panics() {
  let result = std::panic::catch_unwind(|| {
    Supply::<i32>::failed("boom").tap(|_| {});
  });
  let payload = result.unwrap_err();
  let message = payload.downcast_ref::<String>().cloned().unwrap_or_default();
  assert_eq!(message, "unhandled quit: boom");
}

#[test]
fn producers_on_many_threads() {
  let supplier = Supplier::<u64>::new();
  let total = supplier.supply().grep(|v| v % 2 == 1).reduce(|a, b| a + b).promise();
  let handles: Vec<_> = (0..4)
    .map(|_| {
      let producer = supplier.clone();
      thread::spawn(move || (0..100).for_each(|v| producer.emit(v)))
    })
    .collect();
  handles.into_iter().for_each(|h| h.join().unwrap());
  supplier.done();
  assert_eq!(total.result().unwrap(), Some(4 * 2500));
}

#[test]
fn batches_then_hops_to_another_scheduler() {
  let scheduler = TestScheduler::new();
  let config = BatchConfig::new().elems(2).scheduler(scheduler.shared());
  let log = log_all(&Supply::from_iter(1..=5).batch(config).schedule_on(scheduler.shared()));
  assert!(log.lock().is_empty());
  scheduler.advance_by(Duration::ZERO);
  assert_eq!(*log.lock(), vec!["[1, 2]", "[3, 4]", "[5]", "done"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn await_a_pipeline() {
  let sum = Supply::from_iter(1..=4).map(|v| v * v).reduce(|a, b| a + b).await;
  assert_eq!(sum.unwrap(), Some(30));

  let failed = Supply::<i32>::failed("nope").await;
  assert_eq!(failed.unwrap_err().to_string(), "nope");
}
