//! Provides a thread-safe, synchronous revocable lazy-value cache.

mod builder;
mod cache;

pub use {builder::LazyCacheBuilder, cache::LazyCache};

pub(crate) type InitFn<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync + 'static>;
