//! Bridge from a supply to a bounded `futures` channel.

use futures::{
  channel::mpsc::{channel, Receiver, Sender},
  executor::block_on,
  SinkExt,
};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::{error::SupplyError, observer::Observer, supply::Supply, tap::Tap};

struct ChannelObserver<T> {
  sender: Sender<Result<T, SupplyError>>,
  tap: Arc<OnceCell<Tap>>,
}

impl<T> ChannelObserver<T> {
  fn receiver_gone(&self) {
    tracing::debug!("channel receiver dropped, closing tap");
    if let Some(tap) = self.tap.get() {
      tap.close();
    }
  }
}

impl<T: Send + 'static> Observer<T> for ChannelObserver<T> {
  fn emit(&mut self, value: T) {
    if block_on(self.sender.send(Ok(value))).is_err() {
      self.receiver_gone();
    }
  }

  fn done(&mut self) { self.sender.close_channel() }

  fn quit(&mut self, err: SupplyError) {
    if block_on(self.sender.send(Err(err))).is_err() {
      tracing::debug!("channel receiver dropped before quit");
    }
    self.sender.close_channel();
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Tap this supply into a bounded channel holding up to `capacity`
  /// undelivered values.
  ///
  /// While the channel is full the delivering thread blocks. Done closes
  /// the channel; quit sends the error and then closes it. Dropping the
  /// receiver closes the tap at the next value.
  ///
  /// ```
  /// use futures::StreamExt;
  /// use supply::prelude::*;
  ///
  /// let receiver = Supply::from_iter(0..3).to_channel(8);
  /// let values: Vec<_> = futures::executor::block_on(receiver.map(Result::unwrap).collect());
  /// assert_eq!(values, vec![0, 1, 2]);
  /// ```
  pub fn to_channel(&self, capacity: usize) -> Receiver<Result<T, SupplyError>> {
    let (sender, receiver) = channel(capacity);
    let tap = Arc::new(OnceCell::new());
    let handle = self.tap_with(ChannelObserver { sender, tap: tap.clone() });
    let _ = tap.set(handle);
    receiver
  }
}
