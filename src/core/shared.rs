use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted handle to a value shared between the surface tracker
/// and an outside collaborator.
///
/// `Shared` is how a leaf holds on to its [`HeightmapSource`](crate::heightmap::HeightmapSource):
/// the block-data owner keeps one clone to mutate blocks, the leaf keeps another to answer
/// height queries. It uses an `Arc<RwLock<T>>` internally so a tree holding shared sources
/// can be moved to (and driven from) a worker thread.
///
/// # Type Parameters
/// - `T`: The type of the contained value
///
/// # Examples
///
/// ```
/// use surface_tracker::core::Shared;
///
/// let counter = Shared::new(0);
/// let clone = counter.clone();
///
/// *clone.get_mut() += 1;
/// assert_eq!(*counter.get(), 1);
/// assert!(counter.ptr_eq(&clone));
/// ```
///
/// # Locking
/// - Read guards (`get()`) may be held concurrently
/// - Write guards (`get_mut()`) are exclusive and block other access
/// - A poisoned lock is recovered rather than propagated: the protected data is plain
///   block data with no invariants a panicking writer could break halfway
#[derive(Debug, Default)]
pub struct Shared<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Shared<T> {
    /// Creates a new `Shared` containing the given value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    /// Returns a guard that allows reading the contained value.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a guard that allows modifying the contained value.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if both handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
