//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Errors
pub use crate::error::SupplyError;
// Observer trait
pub use crate::observer::{FnObserver, Observer};
// Operators
pub use crate::ops::{self, into_stream::SupplyStream, BatchConfig, SupplyList};
// Promise bridge
pub use crate::promise::{Promise, Resolver, Settled};
// Scheduler Core types
pub use crate::scheduler::{
  default_scheduler, Duration, Instant, Scheduler, SharedScheduler, Task, TaskHandle, TaskState,
};
// Schedulers
pub use crate::scheduler::{TestScheduler, ThreadScheduler, TokioScheduler};
// Throttle
pub use crate::throttle::{ControlMessage, ThrottleConfig, ThrottleStatus};
pub use crate::{
  supplier::Supplier,
  supply::{Emitter, Supply},
  tap::{Tap, TapGuard},
};
