//! Spin locks.

use core::hint::spin_loop;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use super::{Guard, Lock, RawLock};
use crate::cpu::Cpu;
use crate::kernel::kernel;

/// Mutual exclusion lock that busy waits (spins).
///
/// Interrupts are disabled for as long as the lock is held, through the
/// per-CPU `push_off`/`pop_off` nesting.
pub struct RawSpinlock {
    /// Name of lock, for diagnostics.
    name: &'static str,

    /// The `Cpu` holding the lock, or null.
    locked: AtomicPtr<Cpu>,
}

/// Locks that busy wait (spin).
pub type Spinlock<T> = Lock<RawSpinlock, T>;
/// Guards of `Spinlock<T>`.
pub type SpinlockGuard<'s, T> = Guard<'s, RawSpinlock, T>;

impl RawSpinlock {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            locked: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl RawLock for RawSpinlock {
    fn acquire(&self) {
        // Disable interrupts to avoid deadlock with interrupt handlers that
        // take the same lock.
        kernel().cpus().push_off_raw();
        assert!(!self.holding(), "acquire {}", self.name);

        // The `Acquire` exchange pairs with the `Release` store in
        // `release()`: stores of one critical section are visible to the
        // loads of the next.
        while self
            .locked
            .compare_exchange(
                ptr::null_mut(),
                kernel().cpus().current_raw(),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            spin_loop();
        }
    }

    fn release(&self) {
        assert!(self.holding(), "release {}", self.name);
        self.locked.store(ptr::null_mut(), Ordering::Release);
        // SAFETY: paired with the `push_off_raw` in `acquire`.
        unsafe { kernel().cpus().pop_off_raw() };
    }

    /// Whether this CPU is holding the lock. Meaningful only with
    /// interrupts off.
    fn holding(&self) -> bool {
        self.locked.load(Ordering::Relaxed) == kernel().cpus().current_raw()
    }
}

impl<T> Spinlock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Lock::from_raw(RawSpinlock::new(name), data)
    }
}
