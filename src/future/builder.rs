use super::{FutureExt as _, LazyCache};

use async_lock::Mutex;
use std::{future::Future, marker::PhantomData, sync::Arc};

/// Builds a [`LazyCache`] with construction options.
///
/// The options mirror the synchronous builder: a cache name (used by the
/// `logging` feature) and an externally supplied lock, which here is an
/// [`async_lock::Mutex`] so that waiters yield to their executor.
pub struct LazyCacheBuilder<C> {
    shared_lock: Option<Arc<Mutex<()>>>,
    name: Option<String>,
    cache_type: PhantomData<C>,
}

impl<C> Default for LazyCacheBuilder<C> {
    fn default() -> Self {
        Self {
            shared_lock: None,
            name: None,
            cache_type: PhantomData,
        }
    }
}

impl<C> LazyCacheBuilder<C> {
    /// Sets the name of the cache. The name appears in the log line emitted
    /// when the initializer panics (`logging` feature).
    pub fn name(self, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Uses an externally supplied lock for the slow path instead of a
    /// private one, composing the cache with other synchronized state.
    pub fn shared_lock(self, lock: Arc<Mutex<()>>) -> Self {
        Self {
            shared_lock: Some(lock),
            ..self
        }
    }
}

impl<T> LazyCacheBuilder<LazyCache<T>>
where
    T: Clone + Send + Sync + 'static,
{
    /// Builds a `LazyCache` from an infallible async initializer and a
    /// revocation predicate. Neither closure is invoked here.
    pub fn build<F, Fut>(
        self,
        initializer: F,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> LazyCache<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        LazyCache::with_everything(
            Box::new(move || {
                let init_future = initializer();
                async move { Ok(init_future.await) }.boxed()
            }),
            Box::new(should_revoke),
            self.shared_lock,
            self.name,
        )
    }
}

impl<T, E> LazyCacheBuilder<LazyCache<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Builds a `LazyCache` from a fallible async initializer and a
    /// revocation predicate. Neither closure is invoked here.
    pub fn build_fallible<F, Fut>(
        self,
        initializer: F,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> LazyCache<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        LazyCache::with_everything(
            Box::new(move || initializer().boxed()),
            Box::new(should_revoke),
            self.shared_lock,
            self.name,
        )
    }
}
