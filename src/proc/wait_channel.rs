use core::ptr;

use super::{CurrentProc, Procstate};
use crate::kernel::kernel;
use crate::lock::{Guard, RawLock};

/// A rendezvous key for sleep/wakeup.
pub struct WaitChannel {
    /// Required to make this type non-zero-sized. If it were zero-sized,
    /// multiple wait channels could share an address and spuriously wake
    /// each other's sleepers.
    _padding: u8,
}

impl WaitChannel {
    pub const fn new() -> Self {
        Self { _padding: 0 }
    }

    /// Atomically releases `lock_guard` and sleeps on this channel.
    /// Reacquires the lock when awakened. The caller's loop, not this
    /// primitive, re-checks the awaited predicate afterwards.
    pub fn sleep<R: RawLock, T>(&self, lock_guard: &mut Guard<'_, R, T>, ctx: &CurrentProc<'_>) {
        // Must acquire the process lock in order to change its state and
        // then call sched. Once it is held, a wakeup cannot be missed
        // (wakeup takes the same lock), so it is safe to release the
        // caller's lock.
        let mut guard = ctx.lock();
        lock_guard.reacquire_after(move || {
            // Go to sleep.
            guard.deref_mut_info().waitchannel = self;
            guard.deref_mut_info().state = Procstate::SLEEPING;
            // SAFETY: we hold the process lock, the state was changed, and
            // interrupts went off when the lock was acquired.
            unsafe { guard.sched() };

            // Tidy up.
            guard.deref_mut_info().waitchannel = ptr::null();

            // Drop the process lock before reacquiring the caller's lock.
            drop(guard);
        });
    }

    /// Wakes up every process sleeping on this channel.
    /// Must be called without any process lock held.
    pub fn wakeup(&self) {
        kernel().procs().wakeup_pool(self);
    }
}
