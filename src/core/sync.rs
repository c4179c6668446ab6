//! Lock poisoning helpers
//!
//! A lock is poisoned when a thread panics while holding it. The helpers
//! below turn that into the caller's own error type so poisoning surfaces
//! as a regular `Result` instead of a panic further down the line.

use std::sync::{LockResult, RwLockReadGuard, RwLockWriteGuard};

/// Map a poisoned `Mutex::lock` result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use smartqueue::core::sync::handle_mutex_poison;
/// use smartqueue::queue::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| QueueError::Synchronisation { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "mutex poisoned by a panicking holder: {}",
            poison_err
        ))
    })
}

/// Map a poisoned `RwLock::read` result into an application error
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "read lock poisoned by a panicking writer: {}",
            poison_err
        ))
    })
}

/// Map a poisoned `RwLock::write` result into an application error
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "write lock poisoned by a panicking holder: {}",
            poison_err
        ))
    })
}
