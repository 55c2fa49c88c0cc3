//! Operators that buffer the whole supply and emit once it is done.
//!
//! Their buffers are unbounded: on a supply that never completes they grow
//! forever. On quit the buffered values are dropped.

use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

use crate::{
  error::guarded,
  observer::FnObserver,
  supply::{Emitter, Supply},
};

impl<T: Clone + Send + 'static> Supply<T> {
  /// When the upstream is done, call `f` with every value it emitted and
  /// emit whatever `f` returns, then done.
  ///
  /// ```
  /// use std::sync::{Arc, Mutex};
  /// use supply::prelude::*;
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// Supply::from_iter(1..=4)
  ///   .grab(|all| vec![all.iter().sum::<i32>(), all.len() as i32])
  ///   .tap(move |v| c_seen.lock().unwrap().push(v));
  /// assert_eq!(*seen.lock().unwrap(), vec![10, 4]);
  /// ```
  pub fn grab<U, I, F>(&self, f: F) -> Supply<U>
  where
    U: Clone + Send + 'static,
    I: IntoIterator<Item = U>,
    F: Fn(Vec<T>) -> I + Send + Sync + 'static,
  {
    let f = Arc::new(f);
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<U>| {
      let buffer = Arc::new(Mutex::new(Vec::new()));
      let (next_buffer, done_buffer) = (buffer.clone(), buffer);
      let (f, done, quit) = (f.clone(), emitter.clone(), emitter.clone());
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| next_buffer.lock().push(v))
          .with_done(move || {
            let all = std::mem::take(&mut *done_buffer.lock());
            match guarded(|| f(all).into_iter().collect::<Vec<U>>()) {
              Ok(values) => {
                for v in values {
                  if done.is_closed() {
                    return;
                  }
                  done.emit(v);
                }
                done.done();
              }
              Err(err) => done.quit(err),
            }
          })
          .with_quit(move |err| quit.quit(err)),
      );
    })
  }

  /// The last `n` values, emitted when the upstream is done.
  pub fn tail(&self, n: usize) -> Supply<T> {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<T>| {
      let window = Arc::new(Mutex::new(VecDeque::with_capacity(n)));
      let (next_window, done_window) = (window.clone(), window);
      let (done, quit) = (emitter.clone(), emitter.clone());
      emitter.tap_upstream(
        &source,
        FnObserver::new(move |v| {
          if n == 0 {
            return;
          }
          let mut window = next_window.lock();
          if window.len() == n {
            window.pop_front();
          }
          window.push_back(v);
        })
        .with_done(move || {
          let window = std::mem::take(&mut *done_window.lock());
          for v in window {
            done.emit(v);
          }
          done.done();
        })
        .with_quit(move |err| quit.quit(err)),
      );
    })
  }

  /// All values in reverse order, once the upstream is done.
  pub fn reverse(&self) -> Supply<T> {
    self.grab(|mut all| {
      all.reverse();
      all
    })
  }

  /// All values sorted, once the upstream is done.
  pub fn sort(&self) -> Supply<T>
  where
    T: Ord,
  {
    self.grab(|mut all| {
      all.sort();
      all
    })
  }
}
