//! The kernel singleton: everything process-wide lives here.

use core::sync::atomic::{AtomicBool, Ordering};

use array_macro::array;

use crate::cpu::Cpus;
use crate::lock::Spinlock;
use crate::param::MAXNUM;
use crate::proc::{Proc, Procs, ReadyQueue};

/// The kernel.
static KERNEL: Kernel = Kernel::new();

#[inline]
pub fn kernel() -> &'static Kernel {
    &KERNEL
}

pub struct Kernel {
    panicked: AtomicBool,

    /// Ticks since boot.
    ticks: Spinlock<u32>,

    /// The process system.
    procs: Procs,

    /// Per-CPU states.
    cpus: Cpus,

    /// MLFQ ready queues, one per priority level.
    mlfq: [Spinlock<ReadyQueue>; MAXNUM],
}

impl Kernel {
    const fn new() -> Self {
        Self {
            panicked: AtomicBool::new(false),
            ticks: Spinlock::new("time", 0),
            procs: Procs::new(),
            cpus: Cpus::new(),
            mlfq: array![_ => Spinlock::new("mlfq", ReadyQueue::new()); MAXNUM],
        }
    }

    /// One-time boot initialization, before the first process exists.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, with no other CPUs up yet.
    pub unsafe fn init(&self) {
        // SAFETY: boot-time exclusive access.
        unsafe { self.procs.init_kstacks() };
        log::info!("process table ready");
    }

    pub fn procs(&self) -> &Procs {
        &self.procs
    }

    pub fn cpus(&self) -> &Cpus {
        &self.cpus
    }

    pub(crate) fn mlfq(&self, level: usize) -> &Spinlock<ReadyQueue> {
        &self.mlfq[level]
    }

    /// Ticks since boot.
    pub fn ticks(&self) -> u32 {
        *self.ticks.lock()
    }

    /// Tick reading for the lockless debug surface.
    pub(crate) fn ticks_raw(&self) -> u32 {
        // SAFETY: a racy read of a u32 counter is fine for diagnostics.
        unsafe { *self.ticks.get_mut_raw() }
    }

    /// The timer interrupt: advance time, then charge the tick to every
    /// process under the active policy.
    pub fn clock_intr(&self) {
        {
            let mut ticks = self.ticks.lock();
            *ticks = ticks.wrapping_add(1);
        }
        self.procs.update_time();
    }

    /// Records the current process pointer of this CPU, or null.
    pub fn current_proc_ref(&self) -> *const Proc {
        let intr = self.cpus.push_off();
        let proc = self.cpus.current(&intr).get_proc();
        // SAFETY: paired with the push_off above.
        unsafe { self.cpus.pop_off(intr) };
        proc
    }

    /// Marks the kernel panicked; printing stops taking locks.
    pub fn mark_panicked(&self) {
        self.panicked.store(true, Ordering::Release);
    }

    pub fn is_panicked(&self) -> bool {
        self.panicked.load(Ordering::Acquire)
    }

    /// Prints one line per non-UNUSED process to the console. Runs when the
    /// user types ^P; the console driver calls in here.
    pub fn procdump(&self) {
        let _ = self.procs.dump(&mut crate::printf::Writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::test_support::serial;

    #[test]
    fn clock_intr_advances_ticks() {
        let _s = serial();
        let before = kernel().ticks();
        kernel().clock_intr();
        kernel().clock_intr();
        assert_eq!(kernel().ticks(), before + 2);
        assert_eq!(kernel().ticks_raw(), before + 2);
    }
}
