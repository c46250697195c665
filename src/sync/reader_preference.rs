//! Reader-Preference Lock
//!
//! An async reader/writer lock that admits readers whenever no writer holds
//! it, even if writers are queued. A steady stream of readers can therefore
//! starve a writer indefinitely. Tokio's own `RwLock` is fair and would hand
//! the lock to a queued writer first, so it only stores the value here.
//!
//! Writers and the reader group share a one-permit gate. The first reader in
//! takes the permit on behalf of every reader and the last reader out hands
//! it back, so readers arriving while others are active never touch the gate.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore,
};

// == Reader Group ==
#[derive(Debug, Default)]
struct ReaderGroup {
    /// Number of live read guards
    count: usize,
    /// Gate permit held on behalf of all readers while `count > 0`
    permit: Option<OwnedSemaphorePermit>,
}

// == Reader-Preference Lock ==
/// Async reader/writer lock with reader priority.
///
/// Release happens when a guard is dropped, including while a task is
/// unwinding from a panic, so a failing worker never leaves the lock held.
pub struct ReaderPreferenceLock<T> {
    /// One permit, held by a writer or by the reader group
    gate: Arc<Semaphore>,
    /// Serializes reader entry so only one reader ever waits on the gate
    entry: tokio::sync::Mutex<()>,
    /// Reader bookkeeping; only held for short, non-blocking sections
    readers: Mutex<ReaderGroup>,
    /// Never contended: the gate already separates readers from writers
    value: RwLock<T>,
}

impl<T> ReaderPreferenceLock<T> {
    // == Constructor ==
    /// Wraps `value` in a new unlocked lock.
    pub fn new(value: T) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(1)),
            entry: tokio::sync::Mutex::new(()),
            readers: Mutex::new(ReaderGroup::default()),
            value: RwLock::new(value),
        }
    }

    fn readers(&self) -> MutexGuard<'_, ReaderGroup> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Read Role ==
    /// Joins an already active reader group without touching the gate.
    fn join_readers(&self) -> Option<ReadGuard<'_, T>> {
        let mut group = self.readers();
        if group.count == 0 {
            return None;
        }
        let value = self.value.try_read().ok()?;
        group.count += 1;
        Some(ReadGuard { value, lock: self })
    }

    /// Records the first reader of a new group, which now owns the gate.
    fn start_readers<'a>(
        &'a self,
        permit: Option<OwnedSemaphorePermit>,
        value: RwLockReadGuard<'a, T>,
    ) -> ReadGuard<'a, T> {
        let mut group = self.readers();
        group.count = 1;
        group.permit = permit;
        ReadGuard { value, lock: self }
    }

    /// Takes the read role if no writer holds the lock.
    pub fn try_acquire_read(&self) -> Option<ReadGuard<'_, T>> {
        let _entry = self.entry.try_lock().ok()?;
        if let Some(guard) = self.join_readers() {
            return Some(guard);
        }

        let permit = self.gate.clone().try_acquire_owned().ok()?;
        let value = self.value.try_read().ok()?;
        Some(self.start_readers(Some(permit), value))
    }

    /// Waits for the read role.
    ///
    /// Only an active writer blocks a reader; queued writers do not.
    pub async fn acquire_read(&self) -> ReadGuard<'_, T> {
        let _entry = self.entry.lock().await;
        if let Some(guard) = self.join_readers() {
            return guard;
        }

        // Nothing is recorded until both awaits finish, so cancelling here
        // just drops the permit again. The gate is never closed.
        let permit = self.gate.clone().acquire_owned().await.ok();
        let value = self.value.read().await;
        self.start_readers(permit, value)
    }

    // == Write Role ==
    /// Takes the write role if nobody holds the lock.
    pub fn try_acquire_write(&self) -> Option<WriteGuard<'_, T>> {
        let permit = self.gate.clone().try_acquire_owned().ok()?;
        let value = self.value.try_write().ok()?;
        Some(WriteGuard {
            value,
            _permit: Some(permit),
        })
    }

    /// Waits for exclusive access.
    pub async fn acquire_write(&self) -> WriteGuard<'_, T> {
        let permit = self.gate.clone().acquire_owned().await.ok();
        WriteGuard {
            value: self.value.write().await,
            _permit: permit,
        }
    }

    // == Introspection ==
    /// Number of read guards currently alive.
    pub fn reader_count(&self) -> usize {
        self.readers().count
    }

    /// Whether a writer currently holds the gate.
    pub fn is_write_locked(&self) -> bool {
        self.readers().permit.is_none() && self.gate.available_permits() == 0
    }

    fn release_read(&self) {
        let mut group = self.readers();
        group.count -= 1;
        if group.count == 0 {
            group.permit = None;
        }
    }
}

impl<T: Default> Default for ReaderPreferenceLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ReaderPreferenceLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderPreferenceLock")
            .field("readers", &self.reader_count())
            .field("writer", &self.is_write_locked())
            .finish_non_exhaustive()
    }
}

// == Guards ==
/// Shared access; releases the read role on drop.
pub struct ReadGuard<'a, T> {
    value: RwLockReadGuard<'a, T>,
    lock: &'a ReaderPreferenceLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

/// Exclusive access; the gate permit is returned on drop.
pub struct WriteGuard<'a, T> {
    value: RwLockWriteGuard<'a, T>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
