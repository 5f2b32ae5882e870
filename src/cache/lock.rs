use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Shared state behind one read/write lock.
///
/// Every patch belonging to a single mutation is applied while holding one
/// write guard, so readers never see half of a mutation.
pub(crate) struct StateCell<T> {
    inner: RwLock<T>,
    target: &'static str,
}

impl<T> StateCell<T> {
    pub(crate) fn new(value: T, target: &'static str) -> Self {
        Self {
            inner: RwLock::new(value),
            target,
        }
    }

    pub(crate) fn read(&self, op: &'static str) -> RwLockReadGuard<'_, T> {
        rw_read(&self.inner, self.target, op)
    }

    pub(crate) fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, T> {
        rw_write(&self.inner, self.target, op)
    }
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                hint = "view state may be stale after panic in another thread",
                "Recovered from poisoned feed cache lock"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                hint = "view state may be stale after panic in another thread",
                "Recovered from poisoned feed cache lock"
            );
            poisoned.into_inner()
        }
    }
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "subscriber or history state may be stale after panic in another thread",
                "Recovered from poisoned feed cache lock"
            );
            poisoned.into_inner()
        }
    }
}
