//! Duplicate suppression: `unique` remembers every key seen so far (or
//! within an expiry window), `squish` only compares with the previous value.

use std::{
  collections::{HashMap, HashSet},
  hash::Hash,
  sync::Arc,
};

use crate::{
  error::guarded,
  scheduler::{Duration, SharedScheduler},
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Drop values that were already emitted.
  pub fn unique(&self) -> Supply<T>
  where
    T: Eq + Hash,
  {
    self.unique_by(T::clone)
  }

  /// Drop values whose key, as computed by `key`, was already seen.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_list(vec!["a", "B", "A", "b", "c"])
  ///   .unique_by(|s| s.to_lowercase())
  ///   .tap(move |v| c_seen.lock().unwrap().push(v));
  /// assert_eq!(*seen.lock().unwrap(), vec!["a", "B", "c"]);
  /// ```
  pub fn unique_by<K, F>(&self, key: F) -> Supply<T>
  where
    K: Eq + Hash + Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
  {
    let key = Arc::new(key);
    self.derive(move |out: &Emitter<T>| {
      let (key, out) = (key.clone(), out.clone());
      let mut seen = HashSet::new();
      move |v: T| match guarded(|| key(&v)) {
        Ok(k) => {
          if seen.insert(k) {
            out.emit(v);
          }
        }
        Err(err) => out.quit(err),
      }
    })
  }

  /// Like [`unique_by`](Supply::unique_by) with a custom equality on keys.
  /// Keys are compared one by one, so prefer `unique_by` when the key is
  /// hashable.
  pub fn unique_with<K, F, W>(&self, key: F, with: W) -> Supply<T>
  where
    K: Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
    W: Fn(&K, &K) -> bool + Send + Sync + 'static,
  {
    let (key, with) = (Arc::new(key), Arc::new(with));
    self.derive(move |out: &Emitter<T>| {
      let (key, with, out) = (key.clone(), with.clone(), out.clone());
      let mut seen: Vec<K> = vec![];
      move |v: T| {
        let fresh = guarded(|| {
          let k = key(&v);
          if seen.iter().any(|s| with(s, &k)) {
            false
          } else {
            seen.push(k);
            true
          }
        });
        match fresh {
          Ok(true) => out.emit(v),
          Ok(false) => {}
          Err(err) => out.quit(err),
        }
      }
    })
  }

  /// Like [`unique_by`](Supply::unique_by), but a key is forgotten once it
  /// was not seen for `expires`. A suppressed duplicate restarts its key's
  /// window.
  pub fn unique_expiring<K, F>(
    &self,
    key: F,
    expires: Duration,
    scheduler: SharedScheduler,
  ) -> Supply<T>
  where
    K: Eq + Hash + Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
  {
    let key = Arc::new(key);
    self.derive(move |out: &Emitter<T>| {
      let (key, scheduler, out) = (key.clone(), scheduler.clone(), out.clone());
      let mut last_seen: HashMap<K, Duration> = HashMap::new();
      move |v: T| {
        let k = match guarded(|| key(&v)) {
          Ok(k) => k,
          Err(err) => return out.quit(err),
        };
        let now = scheduler.now();
        last_seen.retain(|_, at| now.saturating_sub(*at) < expires);
        if last_seen.insert(k, now).is_none() {
          out.emit(v);
        }
      }
    })
  }

  /// [`unique_expiring`](Supply::unique_expiring) with a custom equality on
  /// keys, compared one by one like [`unique_with`](Supply::unique_with).
  pub fn unique_with_expiring<K, F, W>(
    &self,
    key: F,
    with: W,
    expires: Duration,
    scheduler: SharedScheduler,
  ) -> Supply<T>
  where
    K: Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
    W: Fn(&K, &K) -> bool + Send + Sync + 'static,
  {
    let (key, with) = (Arc::new(key), Arc::new(with));
    self.derive(move |out: &Emitter<T>| {
      let (key, with, scheduler, out) = (key.clone(), with.clone(), scheduler.clone(), out.clone());
      let mut last_seen: Vec<(K, Duration)> = vec![];
      move |v: T| {
        let now = scheduler.now();
        last_seen.retain(|(_, at)| now.saturating_sub(*at) < expires);
        let fresh = guarded(|| {
          let k = key(&v);
          match last_seen.iter_mut().find(|(seen, _)| with(seen, &k)) {
            Some((_, at)) => {
              *at = now;
              false
            }
            None => {
              last_seen.push((k, now));
              true
            }
          }
        });
        match fresh {
          Ok(true) => out.emit(v),
          Ok(false) => {}
          Err(err) => out.quit(err),
        }
      }
    })
  }

  /// Drop values equal to the one right before them.
  pub fn squish(&self) -> Supply<T>
  where
    T: PartialEq,
  {
    self.squish_by(T::clone)
  }

  /// Drop values whose key equals the previous value's key.
  pub fn squish_by<K, F>(&self, key: F) -> Supply<T>
  where
    K: PartialEq + Send + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
  {
    let key = Arc::new(key);
    self.derive(move |out: &Emitter<T>| {
      let (key, out) = (key.clone(), out.clone());
      let mut previous: Option<K> = None;
      move |v: T| match guarded(|| key(&v)) {
        Ok(k) => {
          if previous.as_ref() != Some(&k) {
            previous = Some(k);
            out.emit(v);
          }
        }
        Err(err) => out.quit(err),
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use parking_lot::Mutex;
  use std::sync::Arc;

  fn values<T: Clone + Send + 'static>(supply: Supply<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    supply.tap(move |v| c_seen.lock().push(v));
    seen
  }

  #[test]
  fn unique_values() {
    let seen = values(Supply::from_list(vec![1, 2, 1, 3, 2, 4]).unique());
    assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
  }

  #[test]
  fn unique_with_custom_equality() {
    let supply = Supply::from_list(vec![1.0, 1.05, 2.0, 2.5, 1.01])
      .unique_with(|v: &f64| *v, |a, b| (a - b).abs() < 0.1);
    assert_eq!(*values(supply).lock(), vec![1.0, 2.0, 2.5]);
  }

  #[test]
  fn unique_keys_expire() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = values(supplier.supply().unique_expiring(
      |v: &&str| v.to_string(),
      Duration::from_secs(1),
      scheduler.shared(),
    ));
    supplier.emit("a");
    scheduler.advance_by(Duration::from_millis(600));
    supplier.emit("a");
    scheduler.advance_by(Duration::from_millis(600));
    // the suppressed repeat restarted the window
    supplier.emit("a");
    assert_eq!(*seen.lock(), vec!["a"]);
    scheduler.advance_by(Duration::from_millis(1000));
    supplier.emit("a");
    assert_eq!(*seen.lock(), vec!["a", "a"]);
  }

  #[test]
  fn custom_equality_keys_expire() {
    let scheduler = TestScheduler::new();
    let supplier = Supplier::new();
    let seen = values(supplier.supply().unique_with_expiring(
      |v: &&str| v.to_string(),
      |a, b| a.eq_ignore_ascii_case(b),
      Duration::from_secs(1),
      scheduler.shared(),
    ));
    supplier.emit("a");
    supplier.emit("B");
    scheduler.advance_by(Duration::from_millis(600));
    supplier.emit("A");
    scheduler.advance_by(Duration::from_millis(600));
    // "b" was last seen 1.2s ago, "a" only 0.6s ago
    supplier.emit("b");
    supplier.emit("a");
    assert_eq!(*seen.lock(), vec!["a", "B", "b"]);
  }

  #[test]
  fn squish_consecutive_only() {
    let seen = values(Supply::from_list(vec![1, 1, 2, 2, 2, 1, 3, 3]).squish());
    assert_eq!(*seen.lock(), vec![1, 2, 1, 3]);
  }

  #[test]
  fn squish_by_key() {
    let supply = Supply::from_list(vec!["apple", "avocado", "banana", "blueberry", "apricot"])
      .squish_by(|s| s.chars().next());
    assert_eq!(*values(supply).lock(), vec!["apple", "banana", "apricot"]);
  }

  #[test]
  fn panicking_key_quits() {
    let err = Arc::new(Mutex::new(None));
    let c_err = err.clone();
    Supply::from_list(vec![1, 0])
      .unique_by(|v| 10 / v)
      .tap_all(|_| {}, || {}, move |e| *c_err.lock() = Some(e.as_label()));
    assert_eq!(*err.lock(), Some("supply_panicked"));
  }
}
