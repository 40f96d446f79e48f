use super::{builder::LazyCacheBuilder, InitFn};
use crate::common::RevokeFn;

use arc_swap::ArcSwapOption;
use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::{convert::Infallible, fmt, sync::Arc};

/// A thread-safe, revocable lazy-value cache.
///
/// `LazyCache` holds a single slot. The first access runs the initializer and
/// memoizes its result; every later access returns the memoized value until
/// the revocation predicate reports it stale, at which point the next access
/// runs the initializer again.
///
/// Reads of a fresh value are lock-free: the slot is an atomic reference, so
/// cache hits from any number of threads never contend. Only when the slot is
/// empty or stale do callers serialize on an internal lock, and the thread
/// that wins the lock runs the initializer exactly once; the losers observe
/// the refreshed slot after blocking and never duplicate the work.
///
/// To share a `LazyCache` across threads, clone it. This is a cheap operation
/// and every clone observes the same slot.
///
/// # Examples
///
/// ```rust
/// use relazy::{sync::LazyCache, DirtyFlag};
///
/// use std::{
///     sync::atomic::{AtomicU64, Ordering},
///     sync::Arc,
///     thread,
/// };
///
/// let dirty = DirtyFlag::new();
/// let input = Arc::new(AtomicU64::new(40));
///
/// let cache = LazyCache::new(
///     {
///         let dirty = dirty.clone();
///         let input = Arc::clone(&input);
///         move || {
///             // Stands in for something resource-intensive.
///             let result = input.load(Ordering::Acquire) + 2;
///             dirty.clear();
///             result
///         }
///     },
///     dirty.predicate(),
/// );
///
/// // Read the cache from four threads. The initializer runs once.
/// let threads: Vec<_> = (0..4)
///     .map(|_| {
///         let my_cache = cache.clone();
///         thread::spawn(move || assert_eq!(my_cache.value(), 42))
///     })
///     .collect();
///
/// threads.into_iter().for_each(|t| t.join().expect("Failed"));
///
/// // Mutating the input marks the flag, which revokes the cached value.
/// input.store(7, Ordering::Release);
/// dirty.mark();
/// assert_eq!(cache.value(), 9);
/// ```
///
/// # The revocation predicate
///
/// The predicate must be cheap and free of call-count dependent side effects:
/// depending on contention it runs zero, one, or two times per access (once
/// on the lock-free fast path, and possibly again under the lock). It is
/// never consulted while the slot is empty; emptiness alone triggers
/// computation.
///
/// # Avoiding to clone the value at `value`
///
/// The return type of [`value`](LazyCache::value) is `T` instead of `&T`.
/// Every call for a fresh slot creates a clone of the stored value and
/// returns it. This is because the cache allows concurrent revocation and
/// recomputation, so a stored value can be replaced at any time by another
/// thread; `value` cannot return a reference as it is impossible to guarantee
/// the value outlives the reference.
///
/// If you want to store a value that will be expensive to clone, wrap it in
/// `std::sync::Arc` before storing it. [`Arc`][rustdoc-std-arc] is a
/// thread-safe reference-counted pointer and its `clone()` method is cheap.
///
/// [rustdoc-std-arc]: https://doc.rust-lang.org/stable/std/sync/struct.Arc.html
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
    // The hot slot is padded so that fast-path loads do not false-share a
    // cache line with the lock.
    slot: CachePadded<ArcSwapOption<T>>,
    initializer: InitFn<T, E>,
    should_revoke: RevokeFn,
    lock: Arc<Mutex<()>>,
    name: Option<String>,
}

impl<T> LazyCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Constructs a new `LazyCache` from an initializer and a revocation
    /// predicate. The initializer is not invoked until the first call to
    /// [`value`](LazyCache::value).
    pub fn new(
        initializer: impl Fn() -> T + Send + Sync + 'static,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::builder().build(initializer, should_revoke)
    }

    /// Returns the cached value, running the initializer if the slot is empty
    /// or the revocation predicate reports the cached value stale.
    ///
    /// If the initializer panics, the panic propagates to the caller, the
    /// slot keeps whatever it held before the call, and the next access
    /// retries.
    pub fn value(&self) -> T {
        match self.try_value() {
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
    /// Constructs a new `LazyCache` whose initializer can fail. Use
    /// [`try_value`](LazyCache::try_value) to access the value.
    pub fn fallible(
        initializer: impl Fn() -> Result<T, E> + Send + Sync + 'static,
        should_revoke: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::builder().build_fallible(initializer, should_revoke)
    }

    /// Returns a [`LazyCacheBuilder`], which can construct a `LazyCache` with
    /// a name or an externally supplied lock.
    pub fn builder() -> LazyCacheBuilder<LazyCache<T, E>> {
        LazyCacheBuilder::default()
    }

    pub(crate) fn with_everything(
        initializer: InitFn<T, E>,
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
    /// [`LazyCacheBuilder::name`](crate::sync::LazyCacheBuilder::name).
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the cached value, running the initializer if the slot is empty
    /// or the revocation predicate reports the cached value stale.
    ///
    /// An initializer error propagates unchanged. Nothing about the failure
    /// is cached: the slot keeps whatever it held before the call (still
    /// empty, or still holding the previous stale value), and the next access
    /// runs the initializer again. The slot is only ever replaced by a value
    /// the initializer actually produced.
    pub fn try_value(&self) -> Result<T, E> {
        if let Some(value) = self.inner.read_fresh() {
            return Ok(value);
        }

        let _guard = self.inner.lock.lock();

        // Re-check: another thread may have refreshed the slot between the
        // unsynchronized read and the lock acquisition.
        if let Some(value) = self.inner.read_fresh() {
            return Ok(value);
        }

        let value = self.inner.run_initializer()?;
        self.inner.slot.store(Some(Arc::new(value.clone())));
        Ok(value)
    }

    /// Returns `true` if the slot currently holds a fresh value.
    ///
    /// This is a query with a side effect: it evaluates the revocation
    /// predicate under the lock and, if the predicate reports staleness,
    /// evicts the cached value before answering. A `false` answer therefore
    /// means the slot is empty *now*, either because nothing was computed yet
    /// or because this very call just forgot a stale value. It never runs the
    /// initializer.
    pub fn is_present(&self) -> bool {
        let _guard = self.inner.lock.lock();
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
    /// predicate does not revoke it. The predicate is not consulted while the
    /// slot is empty.
    fn read_fresh(&self) -> Option<T> {
        match &*self.slot.load() {
            Some(value) if !(self.should_revoke)() => Some(T::clone(value)),
            _ => None,
        }
    }

    fn run_initializer(&self) -> Result<T, E> {
        use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

        // Safety: It is safe to assert unwind safety here because we will not
        // call the closure again after it has panicked.
        match catch_unwind(AssertUnwindSafe(|| (self.initializer)())) {
            Ok(result) => result,
            Err(payload) => {
                #[cfg(feature = "logging")]
                crate::common::log_initializer_panic(&*payload, self.name.as_deref());
                resume_unwind(payload);
            }
        }
    }
}
