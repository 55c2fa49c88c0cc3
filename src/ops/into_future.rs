//! Bridge from a supply to its final value as a [`Promise`].

use parking_lot::Mutex;
use std::{future::IntoFuture, sync::Arc};

use crate::{error::SupplyError, promise::Promise, supply::Supply};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Tap this supply and settle a promise when it ends: kept with the last
  /// value on done (`None` if nothing was emitted), broken on quit.
  ///
  /// ```
  /// use supply::prelude::*;
  ///
  /// let promise = Supply::from_list(vec![1, 2, 3]).promise();
  /// assert_eq!(promise.result().unwrap(), Some(3));
  /// ```
  pub fn promise(&self) -> Promise<Option<T>> {
    let (promise, resolver) = Promise::pending();
    let resolver = Arc::new(Mutex::new(Some(resolver)));
    let last = Arc::new(Mutex::new(None));
    let (c_last, done_last) = (last.clone(), last);
    let (on_done, on_quit) = (resolver.clone(), resolver);
    self.tap_all(
      move |v| *c_last.lock() = Some(v),
      move || {
        if let Some(resolver) = on_done.lock().take() {
          resolver.keep(done_last.lock().take());
        }
      },
      move |err| {
        if let Some(resolver) = on_quit.lock().take() {
          resolver.reject(err);
        }
      },
    );
    promise
  }
}

/// `supply.await` resolves to the supply's last value.
///
/// ```
/// use supply::prelude::*;
///
/// # futures::executor::block_on(async {
/// let last = Supply::from_iter(0..4).await;
/// assert_eq!(last.unwrap(), Some(3));
/// # });
/// ```
impl<T: Clone + Send + 'static> IntoFuture for Supply<T> {
  type Output = Result<Option<T>, SupplyError>;
  type IntoFuture = Promise<Option<T>>;

  fn into_future(self) -> Self::IntoFuture { self.promise() }
}
