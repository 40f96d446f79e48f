use super::{builder::LazyCacheBuilder, AsyncInitFn};
use crate::common::RevokeFn;

use arc_swap::ArcSwapOption;
use async_lock::Mutex;
use crossbeam_utils::CachePadded;
use futures_util::FutureExt as _;
use std::{convert::Infallible, fmt, future::Future, sync::Arc};

/// A thread-safe, revocable lazy-value cache with an asynchronous
/// initializer.
///
/// This is the futures aware counterpart of
/// [`sync::LazyCache`](crate::sync::LazyCache): the initializer returns a
/// future, and the slow path waits on an async-aware lock so that a blocked
/// caller yields to its executor instead of parking the thread. The fast path
/// is unchanged: a fresh value is read with a single atomic load and no lock,
/// so cache hits never await.
///
/// The revocation predicate stays a plain synchronous closure; it must be
/// cheap, and it runs zero, one, or two times per access depending on
/// contention.
///
/// Accessors are cancel safe: the slot is only ever replaced after the
/// initializer future completes successfully, so dropping a `value` or
/// `try_value` future mid-flight releases the lock and leaves the cache
/// state untouched.
///
/// To share a `LazyCache` across tasks, clone it. This is a cheap operation
/// and every clone observes the same slot.
///
/// # Example
///
/// ```rust
/// // Cargo.toml
/// //
/// // [dependencies]
/// // relazy = { version = "0.1", features = ["future"] }
/// // tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
///
/// use relazy::{future::LazyCache, DirtyFlag};
///
/// #[tokio::main]
/// async fn main() {
///     let dirty = DirtyFlag::new();
///
///     let cache = LazyCache::new(
///         {
///             let dirty = dirty.clone();
///             move || {
///                 let dirty = dirty.clone();
///                 async move {
///                     // Stands in for an expensive asynchronous query.
///                     let rows = vec![String::from("alice"), String::from("bob")];
///                     dirty.clear();
///                     rows
///                 }
///             }
///         },
///         dirty.predicate(),
///     );
///
///     assert_eq!(cache.value().await.len(), 2);
///     // Cached now; the initializer does not run again.
///     assert_eq!(cache.value().await.len(), 2);
///
///     // A mutation of the underlying data marks the flag, so the next
///     // access re-runs the query.
///     dirty.mark();
///     assert_eq!(cache.value().await.len(), 2);
/// }
/// ```
pub struct LazyCache<T, E = Infallible> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for LazyCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for LazyCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCache")
            .field("name", &self.inner.name)
            .field("populated", &self.inner.slot.load().is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) struct Inner<T, E> {
    slot: CachePadded<ArcSwapOption<T>>,
    initializer: AsyncInitFn<T, E>,
    should_revoke: RevokeFn,
    lock: Arc<Mutex<()>>,
    name: Option<String>,
}

impl<T> LazyCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Constructs a new `LazyCache` from an async initializer and a
    /// revocation predicate. The initializer is not invoked until the first
    /// call to [`value`](LazyCache::value).
    pub fn new<F, Fut>(
        initializer: F,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::builder().build(initializer, should_revoke)
    }

    /// Returns the cached value, running the initializer if the slot is
    /// empty or the revocation predicate reports the cached value stale.
    ///
    /// If the initializer panics, the panic propagates to the caller, the
    /// slot keeps whatever it held before the call, and the next access
    /// retries.
    pub async fn value(&self) -> T {
        match self.try_value().await {
            Ok(v) => v,
            Err(e) => match e {},
        }
    }
}

impl<T, E> LazyCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Constructs a new `LazyCache` whose async initializer can fail. Use
    /// [`try_value`](LazyCache::try_value) to access the value.
    pub fn fallible<F, Fut>(
        initializer: F,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::builder().build_fallible(initializer, should_revoke)
    }

    /// Returns a [`LazyCacheBuilder`], which can construct a `LazyCache` with
    /// a name or an externally supplied lock.
    pub fn builder() -> LazyCacheBuilder<LazyCache<T, E>> {
        LazyCacheBuilder::default()
    }

    pub(crate) fn with_everything(
        initializer: AsyncInitFn<T, E>,
        should_revoke: RevokeFn,
        lock: Option<Arc<Mutex<()>>>,
        name: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: CachePadded::new(ArcSwapOption::empty()),
                initializer,
                should_revoke,
                lock: lock.unwrap_or_default(),
                name,
            }),
        }
    }

    /// Returns the name of this cache, set by
    /// [`LazyCacheBuilder::name`](crate::future::LazyCacheBuilder::name).
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the cached value, running the initializer if the slot is
    /// empty or the revocation predicate reports the cached value stale.
    ///
    /// An initializer error propagates unchanged. Nothing about the failure
    /// is cached: the slot keeps whatever it held before the call, and the
    /// next access runs the initializer again.
    pub async fn try_value(&self) -> Result<T, E> {
        if let Some(value) = self.inner.read_fresh() {
            return Ok(value);
        }

        let _guard = self.inner.lock.lock().await;

        // Re-check: another task may have refreshed the slot between the
        // unsynchronized read and the lock acquisition.
        if let Some(value) = self.inner.read_fresh() {
            return Ok(value);
        }

        let value = self.inner.run_initializer().await?;
        self.inner.slot.store(Some(Arc::new(value.clone())));
        Ok(value)
    }

    /// Returns `true` if the slot currently holds a fresh value.
    ///
    /// This is a query with a side effect: it evaluates the revocation
    /// predicate under the lock and, if the predicate reports staleness,
    /// evicts the cached value before answering. It never runs the
    /// initializer.
    pub async fn is_present(&self) -> bool {
        let _guard = self.inner.lock.lock().await;
        if (self.inner.should_revoke)() {
            self.inner.slot.store(None);
        }
        self.inner.slot.load().is_some()
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone,
{
    /// Returns a clone of the held value if the slot is populated and the
    /// predicate does not revoke it. The predicate is not consulted while
    /// the slot is empty.
    fn read_fresh(&self) -> Option<T> {
        match &*self.slot.load() {
            Some(value) if !(self.should_revoke)() => Some(T::clone(value)),
            _ => None,
        }
    }

    async fn run_initializer(&self) -> Result<T, E> {
        use std::panic::{resume_unwind, AssertUnwindSafe};

        let init_future = (self.initializer)();

        // Safety: It is safe to assert unwind safety here because we will not
        // poll the future again after it has panicked.
        match AssertUnwindSafe(init_future).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                #[cfg(feature = "logging")]
                crate::common::log_initializer_panic(&*payload, self.name.as_deref());
                resume_unwind(payload);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LazyCache;
    use crate::DirtyFlag;

    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[tokio::test]
    async fn computes_once_while_fresh() {
        let init_count = Arc::new(AtomicUsize::new(0));
        let cache = LazyCache::new(
            {
                let init_count = Arc::clone(&init_count);
                move || {
                    let init_count = Arc::clone(&init_count);
                    async move {
                        init_count.fetch_add(1, Ordering::SeqCst);
                        Arc::new(String::from("expensive"))
                    }
                }
            },
            || false,
        );

        let first = cache.value().await;
        for _ in 0..10 {
            assert!(Arc::ptr_eq(&first, &cache.value().await));
        }
        assert_eq!(init_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recomputes_when_marked_dirty() {
        let dirty = DirtyFlag::new();
        let init_count = Arc::new(AtomicUsize::new(0));
        let cache = LazyCache::new(
            {
                let dirty = dirty.clone();
                let init_count = Arc::clone(&init_count);
                move || {
                    let dirty = dirty.clone();
                    let init_count = Arc::clone(&init_count);
                    async move {
                        dirty.clear();
                        init_count.fetch_add(1, Ordering::SeqCst) + 1
                    }
                }
            },
            dirty.predicate(),
        );

        assert_eq!(cache.value().await, 1);
        assert_eq!(cache.value().await, 1);

        dirty.mark();
        assert_eq!(cache.value().await, 2);
        assert_eq!(cache.value().await, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn contended_initialization_runs_once() {
        let num_tasks = 8;
        let init_count = Arc::new(AtomicUsize::new(0));
        let cache = LazyCache::new(
            {
                let init_count = Arc::clone(&init_count);
                move || {
                    let init_count = Arc::clone(&init_count);
                    async move {
                        init_count.fetch_add(1, Ordering::SeqCst);
                        // Keep the losers waiting on the lock for a while.
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Arc::new(42u32)
                    }
                }
            },
            || false,
        );

        let tasks = (0..num_tasks)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.value().await })
            })
            .collect::<Vec<_>>();

        let mut values = Vec::with_capacity(num_tasks);
        for task in tasks {
            values.push(task.await.expect("Failed"));
        }

        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[tokio::test]
    async fn error_is_propagated_and_not_cached() {
        let should_fail = Arc::new(AtomicBool::new(true));
        let cache = LazyCache::fallible(
            {
                let should_fail = Arc::clone(&should_fail);
                move || {
                    let should_fail = Arc::clone(&should_fail);
                    async move {
                        if should_fail.load(Ordering::SeqCst) {
                            Err("init failed")
                        } else {
                            Ok(5u32)
                        }
                    }
                }
            },
            || false,
        );

        assert_eq!(cache.try_value().await, Err("init failed"));
        assert_eq!(cache.try_value().await, Err("init failed"));

        should_fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.try_value().await, Ok(5));
    }

    #[tokio::test]
    async fn is_present_evicts_stale_value() {
        let dirty = DirtyFlag::new();
        let cache = LazyCache::new(
            {
                let dirty = dirty.clone();
                move || {
                    let dirty = dirty.clone();
                    async move {
                        dirty.clear();
                        String::from("fresh")
                    }
                }
            },
            dirty.predicate(),
        );

        assert!(!cache.is_present().await);
        assert_eq!(cache.value().await, "fresh");
        assert!(cache.is_present().await);

        dirty.mark();
        assert!(!cache.is_present().await);
    }
}
