//! Blocking bridge: wait for a supply to end.

use crate::{error::SupplyError, supply::Supply};

impl<T: Clone + Send + 'static> Supply<T> {
  /// Tap this supply and block the current thread until it ends.
  ///
  /// Returns the last emitted value on done (`None` if there was none), or
  /// the error on quit. Blocks forever on a supply that never ends.
  ///
  /// ```
  /// use supply::prelude::*;
  ///
  /// assert_eq!(Supply::from_iter(1..=3).map(|v| v * 2).wait().unwrap(), Some(6));
  /// ```
  pub fn wait(&self) -> Result<Option<T>, SupplyError> { self.promise().result() }
}
