//! IntoStream bridge
//!
//! Converts a [`Supply`] into a [`futures::Stream`] so its values can be
//! consumed with `while let Some(..) = stream.next().await`.
//!
//! ```rust
//! use futures::StreamExt;
//! use supply::prelude::*;
//!
//! # futures::executor::block_on(async {
//! let mut stream = Supply::from_list(vec![1, 2]).into_stream();
//! assert_eq!(stream.next().await.map(Result::unwrap), Some(1));
//! assert_eq!(stream.next().await.map(Result::unwrap), Some(2));
//! assert!(stream.next().await.is_none());
//! # });
//! ```

use futures::{
  channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
  Stream,
};
use std::{
  pin::Pin,
  task::{Context, Poll},
};

use crate::{error::SupplyError, observer::Observer, supply::Supply, tap::Tap};

/// A `Stream` yielding the signals of a supply's tap.
///
/// - `Ok(T)` for every emitted value,
/// - `Err(SupplyError)` once, when the supply quits,
/// - end of stream after done or after the error.
///
/// Dropping the stream closes its tap.
pub struct SupplyStream<T> {
  receiver: UnboundedReceiver<Result<T, SupplyError>>,
  tap: Tap,
}

impl<T> SupplyStream<T> {
  /// The tap feeding this stream.
  pub fn tap(&self) -> &Tap { &self.tap }
}

impl<T> Stream for SupplyStream<T> {
  type Item = Result<T, SupplyError>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    Pin::new(&mut self.receiver).poll_next(cx)
  }
}

impl<T> Drop for SupplyStream<T> {
  fn drop(&mut self) { self.tap.close() }
}

/// Forwards a tap's signals into an unbounded channel.
struct StreamObserver<T> {
  sender: UnboundedSender<Result<T, SupplyError>>,
}

impl<T: Send + 'static> Observer<T> for StreamObserver<T> {
  fn emit(&mut self, value: T) {
    if self.sender.unbounded_send(Ok(value)).is_err() {
      tracing::trace!("stream receiver gone, value dropped");
    }
  }

  fn done(&mut self) { self.sender.close_channel() }

  fn quit(&mut self, err: SupplyError) {
    let _ = self.sender.unbounded_send(Err(err));
    self.sender.close_channel();
  }
}

impl<T: Clone + Send + 'static> Supply<T> {
  /// Tap this supply into an unbounded [`SupplyStream`].
  pub fn into_stream(&self) -> SupplyStream<T> {
    let (sender, receiver) = unbounded();
    let tap = self.tap_with(StreamObserver { sender });
    SupplyStream { receiver, tap }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;
  use futures::StreamExt;

  #[tokio::test]
  async fn values_then_end() {
    let stream = Supply::from_iter(0..5).into_stream();
    let values: Vec<_> = stream.map(|v| v.unwrap()).collect().await;
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
  }

  #[tokio::test]
  async fn quit_is_the_last_item() {
    let supplier = Supplier::<i32>::new();
    let mut stream = supplier.supply().into_stream();
    supplier.emit(1);
    supplier.quit("bad");
    assert_eq!(stream.next().await.unwrap().unwrap(), 1);
    assert_eq!(stream.next().await.unwrap().unwrap_err().to_string(), "bad");
    assert!(stream.next().await.is_none());
  }

  #[tokio::test]
  async fn values_from_another_thread() {
    let supplier = Supplier::new();
    let stream = supplier.supply().into_stream();
    let producer = std::thread::spawn(move || {
      (0..100).for_each(|v| supplier.emit(v));
      supplier.done();
    });
    let total: i32 = stream.map(|v| v.unwrap()).fold(0, |acc, v| async move { acc + v }).await;
    producer.join().unwrap();
    assert_eq!(total, 4950);
  }

  #[test]
  fn drop_closes_tap() {
    let supplier = Supplier::<i32>::new();
    let stream = supplier.supply().into_stream();
    assert_eq!(supplier.tap_count(), 1);
    assert!(!stream.tap().is_closed());
    drop(stream);
    assert_eq!(supplier.tap_count(), 0);
  }
}
