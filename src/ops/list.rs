//! Blocking iterator over a supply's values.

use futures::{executor::block_on, StreamExt};

use crate::{error::SupplyError, ops::into_stream::SupplyStream, supply::Supply};

/// Lazy, forward-only iterator over a supply, created by
/// [`Supply::list`].
///
/// The supply is tapped on the first call to `next`, which then blocks
/// until a value arrives. A quit shows up as one `Err` item at its position,
/// after which the iteration ends. Dropping the iterator closes its tap.
pub struct SupplyList<T> {
  supply: Option<Supply<T>>,
  stream: Option<SupplyStream<T>>,
  finished: bool,
}

impl<T: Clone + Send + 'static> Iterator for SupplyList<T> {
  type Item = Result<T, SupplyError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    if let Some(supply) = self.supply.take() {
      self.stream = Some(supply.into_stream());
    }
    let item = match self.stream.as_mut() {
      Some(stream) => block_on(stream.next()),
      None => None,
    };
    if !matches!(item, Some(Ok(_))) {
      self.finished = true;
      self.stream = None;
    }
    item
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Iterate over the values of this supply, blocking for each one.
  ///
  /// Every call taps the supply anew: on an on-demand supply each list
  /// sees the full sequence, on a live supply only what is emitted after
  /// its first `next`.
  ///
  /// ```
  /// use supply::prelude::*;
  ///
  /// let values: Result<Vec<_>, _> = Supply::from_list(vec![1, 2, 3]).list().collect();
  /// assert_eq!(values.unwrap(), vec![1, 2, 3]);
  /// ```
  pub fn list(&self) -> SupplyList<T> {
    SupplyList { supply: Some(self.clone()), stream: None, finished: false }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  #[test]
  fn materializes_on_demand() {
    let supply = Supply::from_list(vec!["a", "b"]);
    let first: Vec<_> = supply.list().map(Result::unwrap).collect();
    let second: Vec<_> = supply.list().map(Result::unwrap).collect();
    assert_eq!(first, vec!["a", "b"]);
    assert_eq!(second, first);
  }

  #[test]
  fn lazy_until_first_next() {
    let starts = Arc::new(AtomicUsize::new(0));
    let c_starts = starts.clone();
    let supply = Supply::on_demand(move |emitter: Emitter<i32>| {
      c_starts.fetch_add(1, Ordering::SeqCst);
      emitter.emit(7);
      emitter.done();
    });
    let mut list = supply.list();
    assert_eq!(starts.load(Ordering::SeqCst), 0);
    assert_eq!(list.next().unwrap().unwrap(), 7);
    assert!(list.next().is_none());
    assert!(list.next().is_none());
    assert_eq!(starts.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn quit_surfaces_in_place() {
    let supply = Supply::from_iter(0..3).try_map(|v| if v < 2 { Ok(v) } else { Err("two".into()) });
    let items: Vec<_> = supply.list().map(|r| r.map_err(|e| e.to_string())).collect();
    assert_eq!(items, vec![Ok(0), Ok(1), Err("two".to_string())]);
  }

  #[test]
  fn blocks_for_a_live_producer() {
    let supplier = Supplier::new();
    let mut list = supplier.supply().list();
    let producer = supplier.clone();
    let handle = std::thread::spawn(move || {
      while producer.tap_count() == 0 {
        std::thread::yield_now();
      }
      producer.emit(10);
      producer.done();
    });
    assert_eq!(list.next().unwrap().unwrap(), 10);
    assert!(list.next().is_none());
    handle.join().unwrap();
  }

  #[test]
  fn dropping_closes_the_tap() {
    let supplier = Supplier::<i32>::new();
    let producer = supplier.clone();
    let handle = std::thread::spawn(move || {
      while producer.tap_count() == 0 {
        std::thread::yield_now();
      }
      producer.emit(1);
    });
    let mut list = supplier.supply().list();
    assert_eq!(list.next().unwrap().unwrap(), 1);
    drop(list);
    handle.join().unwrap();
    assert_eq!(supplier.tap_count(), 0);
  }
}
