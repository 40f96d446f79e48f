//! Provides a thread-safe, asynchronous (futures aware) revocable lazy-value
//! cache.
//!
//! To use this module, enable a crate feature called "future".

use futures_util::future::BoxFuture;
use std::future::Future;

mod builder;
mod cache;

pub use {builder::LazyCacheBuilder, cache::LazyCache};

pub(crate) type AsyncInitFn<T, E> =
    Box<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static>;

impl<T: ?Sized> FutureExt for T where T: Future {}

pub trait FutureExt: Future {
    fn boxed<'a, T>(self) -> BoxFuture<'a, T>
    where
        Self: Future<Output = T> + Sized + Send + 'a,
    {
        Box::pin(self)
    }
}
