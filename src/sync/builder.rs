use super::LazyCache;

use parking_lot::Mutex;
use std::{marker::PhantomData, sync::Arc};

/// Builds a [`LazyCache`] with construction options.
///
/// # Example
///
/// ```rust
/// use relazy::sync::LazyCache;
///
/// let cache = LazyCache::builder()
///     .name("settings")
///     .build(|| String::from("computed"), || false);
///
/// assert_eq!(cache.name(), Some("settings"));
/// assert_eq!(cache.value(), "computed");
/// ```
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
    /// private one.
    ///
    /// By default every cache owns its own lock. Supplying a shared lock
    /// composes the cache with other synchronized state: the initializer then
    /// runs while that lock is held, mutually excluded from whatever else is
    /// guarded by it. Several caches may also share one lock to serialize
    /// their recomputations.
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
    /// Builds a `LazyCache` from an infallible initializer and a revocation
    /// predicate. Neither closure is invoked here.
    pub fn build(
        self,
        initializer: impl Fn() -> T + Send + Sync + 'static,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> LazyCache<T> {
        LazyCache::with_everything(
            Box::new(move || Ok(initializer())),
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
    /// Builds a `LazyCache` from a fallible initializer and a revocation
    /// predicate. Neither closure is invoked here.
    pub fn build_fallible(
        self,
        initializer: impl Fn() -> Result<T, E> + Send + Sync + 'static,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> LazyCache<T, E> {
        LazyCache::with_everything(
            Box::new(initializer),
            Box::new(should_revoke),
            self.shared_lock,
            self.name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::LazyCacheBuilder;
    use crate::sync::LazyCache;

    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn build_cache() {
        let cache: LazyCache<u32> = LazyCacheBuilder::default().build(|| 1, || false);
        assert_eq!(cache.name(), None);
        assert_eq!(cache.value(), 1);
    }

    #[test]
    fn build_with_name_and_lock() {
        let lock = Arc::new(Mutex::new(()));
        let cache = LazyCache::<u32>::builder()
            .name("answers")
            .shared_lock(lock)
            .build(|| 42, || false);

        assert_eq!(cache.name(), Some("answers"));
        assert_eq!(cache.value(), 42);
    }

    #[test]
    fn build_fallible_cache() {
        let cache: LazyCache<u32, &str> =
            LazyCacheBuilder::default().build_fallible(|| Ok(9), || false);
        assert_eq!(cache.try_value(), Ok(9));
    }
}
