#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! A revocable lazy-value cache.
//!
//! `relazy` provides a single-slot container that computes a value on first
//! access, memoizes it, and transparently recomputes it when a caller supplied
//! predicate reports the cached value stale. It generalizes ordinary lazy
//! initialization: instead of running the initializer at most once for the
//! lifetime of the container, the initializer runs at most once per *valid*
//! period, where validity is decided by the revocation predicate.
//!
//! The cache is built around double-checked locking. Once a value is fresh,
//! concurrent readers take a lock-free fast path and never contend. When the
//! slot is empty or stale, readers serialize on an internal lock so that the
//! (possibly expensive) initializer runs exactly once per staleness window,
//! no matter how many threads race for the value.
//!
//! # Features
//!
//! - `sync` (enabled by default): `sync::LazyCache`, the synchronous cache.
//! - `future`: `future::LazyCache`, the asynchronous (futures aware) cache
//!   with an async initializer.
//! - `logging`: emits a log line when the initializer panics. No other event
//!   is logged.
//!
//! # Example
//!
//! The typical consumer keeps a [`DirtyFlag`] next to some mutable input of
//! an expensive computation. Setters mark the flag, the initializer clears it
//! on success, and the cache's predicate is bound to the flag:
//!
//! ```rust
//! use relazy::{sync::LazyCache, Tracked};
//!
//! let exponent = Tracked::new(2u32);
//!
//! let cache = LazyCache::new(
//!     {
//!         let exponent = exponent.clone();
//!         move || {
//!             // Stands in for something resource-intensive.
//!             let result = 10u64.pow(exponent.get());
//!             exponent.flag().clear();
//!             result
//!         }
//!     },
//!     exponent.flag().predicate(),
//! );
//!
//! assert_eq!(cache.value(), 100);
//! // The value is now cached; the initializer will not run again.
//! assert_eq!(cache.value(), 100);
//!
//! // Changing the input marks the flag, so the next access recomputes.
//! exponent.set(3);
//! assert_eq!(cache.value(), 1_000);
//! ```

#[cfg(feature = "future")]
pub mod future;

#[cfg(feature = "sync")]
pub mod sync;

pub(crate) mod common;

pub use common::dirty::{DirtyFlag, Tracked};
