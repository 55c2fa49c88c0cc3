//! Combinators and terminal bridges.
//!
//! Every combinator returns a new on-demand [`Supply`]: each tap of the
//! result taps the upstream supply (or supplies) through
//! [`Emitter::tap_upstream`], so closing the downstream tap closes the
//! upstream taps too. Done and quit pass through unless an operator says
//! otherwise, and a failing user closure quits the operator's supply.

use crate::supply::{Emitter, Supply};

pub mod batch;
pub mod channel;
pub mod collect;
pub mod delay;
mod gate;
pub mod into_future;
pub mod into_stream;
pub mod list;
pub mod merge;
pub mod migrate;
pub mod reduce;
pub mod stable;
pub mod start;
pub mod transform;
pub mod unique;
pub mod wait;
pub mod zip;
pub mod zip_latest;

pub use batch::BatchConfig;
pub use list::SupplyList;
pub use merge::merge;
pub use zip::{zip, zip_with};
pub use zip_latest::zip_latest;

impl<T: Clone + Send + 'static> Supply<T> {
  /// Derive a supply whose taps pipe this one through a per-tap value
  /// handler. `build` runs once per tap and gets that tap's emitter; done
  /// and quit of this supply are forwarded unchanged.
  pub(crate) fn derive<U, H, B>(&self, build: B) -> Supply<U>
  where
    U: Clone + Send + 'static,
    B: Fn(&Emitter<U>) -> H + Send + Sync + 'static,
    H: FnMut(T) + Send + 'static,
  {
    let source = self.clone();
    Supply::on_demand(move |emitter: Emitter<U>| {
      let handler = build(&emitter);
      emitter.pipe(&source, handler);
    })
  }
}
