//! # supply: multicast asynchronous streams
//!
//! A thread-safe, push-based stream engine. A [`Supply`] delivers values to
//! any number of taps and ends with exactly one terminal: done, or quit
//! with an error.
//!
//! ## Quick Start
//!
//! ```rust
//! use supply::prelude::*;
//!
//! let supplier = Supplier::<i32>::new();
//! let evens = supplier.supply().grep(|v| v % 2 == 0).map(|v| v * 10);
//! let tap = evens.tap(|v| println!("Value: {}", v));
//!
//! (0..10).for_each(|v| supplier.emit(v));
//! supplier.done();
//! assert!(tap.is_closed());
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Supplier`] | Producer side of a live supply |
//! | [`Supply`] | The stream handle, live or on-demand |
//! | [`Emitter`] | Producer side of one on-demand tap |
//! | [`Tap`] | Handle to close one subscription |
//! | [`Promise`] | Settle-once result, awaitable or blocking |
//! | [`Scheduler`] | Runs timers for every timing operator |
//!
//! Delivery to one tap is serialized: its callbacks never run concurrently,
//! and nothing follows its terminal. A quit that reaches a tap without a
//! quit handler panics with `unhandled quit: <error>` on the thread that
//! raised it.
//!
//! Operators live in [`ops`], the rate and concurrency limiter in
//! [`throttle`]. Blocking and async bridges (`wait`, `list`, `promise`,
//! `to_channel`, `into_stream`, `.await`) end a pipeline.
//!
//! [`Supply`]: supply::Supply
//! [`Supplier`]: supplier::Supplier
//! [`Emitter`]: supply::Emitter
//! [`Tap`]: tap::Tap
//! [`Promise`]: promise::Promise
//! [`Scheduler`]: scheduler::Scheduler

pub mod error;
pub mod factory;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod promise;
pub mod scheduler;
mod subscriber;
pub mod supplier;
pub mod supply;
pub mod tap;
pub mod throttle;

pub use prelude::*;
