use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A cloneable, shared dirty bit, the usual backing signal for a cache's
/// revocation predicate.
///
/// All clones observe the same flag. A freshly created flag starts out dirty,
/// which is harmless for a cache because an empty slot always computes
/// regardless of the predicate.
///
/// The intended wiring: every mutation of a dependent input calls
/// [`mark`](DirtyFlag::mark), the initializer calls
/// [`clear`](DirtyFlag::clear) once it has produced a value, and the cache's
/// predicate is obtained from [`predicate`](DirtyFlag::predicate).
#[derive(Clone, Debug)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    /// Creates a new flag in the dirty state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Marks the flag dirty, so the next cache access recomputes.
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the flag. Call this from the initializer after it has produced
    /// a value.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Returns `true` if the flag is currently dirty.
    pub fn is_dirty(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns a ready-made revocation predicate observing this flag, for
    /// handing to a cache constructor.
    pub fn predicate(&self) -> impl Fn() -> bool + Send + Sync + 'static {
        let flag = self.clone();
        move || flag.is_dirty()
    }
}

impl Default for DirtyFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// A settable field paired with a [`DirtyFlag`].
///
/// `set` marks the flag only when the new value actually differs from the
/// stored one, so redundant writes do not revoke a perfectly good cached
/// value.
///
/// `Tracked` is cheaply cloneable and all clones share the same storage, so
/// the same field can be captured by an initializer closure and mutated from
/// unrelated code.
#[derive(Clone, Debug)]
pub struct Tracked<T> {
    value: Arc<RwLock<T>>,
    flag: DirtyFlag,
}

impl<T> Tracked<T>
where
    T: Clone + PartialEq,
{
    /// Creates a tracked field with its own freshly created flag.
    pub fn new(value: T) -> Self {
        Self::with_flag(value, DirtyFlag::new())
    }

    /// Creates a tracked field observing an existing flag. Use this when
    /// several inputs should revoke the same cached value.
    pub fn with_flag(value: T, flag: DirtyFlag) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            flag,
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Stores `new`, marking the flag dirty if it differs from the current
    /// value.
    pub fn set(&self, new: T) {
        let mut value = self.value.write();
        if *value != new {
            *value = new;
            self.flag.mark();
        }
    }

    /// The flag shared by all clones of this field.
    pub fn flag(&self) -> &DirtyFlag {
        &self.flag
    }
}
