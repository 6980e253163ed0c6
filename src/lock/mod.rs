//! Locks and lock guards.
//!
//! The core only needs locks that busy-wait: sleeping locks belong to the
//! file system, which lives outside this crate.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

mod spinlock;

pub use spinlock::{RawSpinlock, Spinlock, SpinlockGuard};

/// Raw mutual exclusion primitive a [`Lock`] is built on.
pub trait RawLock {
    /// Acquires the lock, spinning until it is held.
    fn acquire(&self);

    /// Releases the lock.
    fn release(&self);

    /// Whether this CPU is holding the lock.
    fn holding(&self) -> bool;
}

/// A lock that owns its raw primitive and the data it guards.
pub struct Lock<R: RawLock, T> {
    lock: R,
    data: UnsafeCell<T>,
}

// SAFETY: the raw lock serializes all access to `data`.
unsafe impl<R: RawLock + Sync, T: Send> Sync for Lock<R, T> {}

impl<R: RawLock, T> Lock<R, T> {
    pub const fn from_raw(lock: R, data: T) -> Self {
        Self {
            lock,
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock and returns its guard.
    pub fn lock(&self) -> Guard<'_, R, T> {
        self.lock.acquire();
        Guard {
            lock: self,
            _marker: PhantomData,
        }
    }

    /// Returns a raw pointer to the inner data without locking.
    /// The caller must ensure that accessing the pointer does not race.
    pub fn get_mut_raw(&self) -> *mut T {
        self.data.get()
    }

    /// Returns a mutable reference to the inner data.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// Use only for a lock that was acquired but whose guard was forgotten
    /// with `mem::forget`.
    pub unsafe fn unlock(&self) {
        self.lock.release();
    }

    /// Whether this CPU is holding the lock.
    pub fn holding(&self) -> bool {
        self.lock.holding()
    }
}

/// RAII guard of a [`Lock`]. Dereferences to the guarded data; releases the
/// lock on drop.
pub struct Guard<'s, R: RawLock, T> {
    lock: &'s Lock<R, T>,
    _marker: PhantomData<*const ()>, // !Send: the lock must be released on the acquiring CPU
}

impl<R: RawLock, T> Guard<'_, R, T> {
    /// Temporarily releases the lock, runs `f`, and reacquires the lock.
    ///
    /// The guard cannot be used inside `f`, so the data is inaccessible
    /// while the lock is released.
    pub fn reacquire_after<F, U>(&mut self, f: F) -> U
    where
        F: FnOnce() -> U,
    {
        self.lock.lock.release();
        let result = f();
        self.lock.lock.acquire();
        result
    }
}

impl<R: RawLock, T> Deref for Guard<'_, R, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the lock is held.
        unsafe { &*self.lock.data.get() }
    }
}

impl<R: RawLock, T> DerefMut for Guard<'_, R, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the lock is held and `&mut self` is exclusive.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<R: RawLock, T> Drop for Guard<'_, R, T> {
    fn drop(&mut self) {
        self.lock.lock.release();
    }
}
