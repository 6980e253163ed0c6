//! Per-process state and the transitions between scheduler and process.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::Deref;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use array_macro::array;
use arrayvec::ArrayString;

use crate::arch::interface::{InterruptManager, ProcManager};
use crate::arch::{Context, File, Inode, TargetPlatform, TrapFrame, UserMemory};
use crate::error::Result;
use crate::kernel::kernel;
use crate::lock::Spinlock;
use crate::param::{DEFAULTPRIO, DEFAULTTICKETS, MAXNUM, MAXPROCNAME, NOFILE};
use crate::vm::{UserMemoryManager, UVAddr};

mod procs;
mod queue;
mod scheduler;
mod wait_channel;

pub use procs::{Procs, WaitGuard};
pub use queue::ReadyQueue;
pub use scheduler::{
    timer_yield, Fcfs, Lottery, Mlfq, Pbs, RoundRobin, SchedPolicy, TargetPolicy,
};
pub use wait_channel::WaitChannel;

pub type Pid = i32;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Procstate {
    UNUSED,
    USED,
    SLEEPING,
    RUNNABLE,
    RUNNING,
    ZOMBIE,
}

impl Procstate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Procstate::UNUSED => "unused",
            Procstate::USED => "used",
            Procstate::SLEEPING => "sleep ",
            Procstate::RUNNABLE => "runble",
            Procstate::RUNNING => "run   ",
            Procstate::ZOMBIE => "zombie",
        }
    }
}

/// Scheduling statistics and per-policy state. Lives inside `ProcInfo`
/// because the scheduler and the timer mutate it from other CPUs.
pub struct SchedEntry {
    /// Tick the process was allocated on.
    pub creation_time: u32,

    /// Tick the process exited on.
    pub exit_time: u32,

    /// Ticks spent RUNNING over the whole lifetime.
    pub total_run_time: u32,

    /// PBS: static priority, 0..=100, smaller is better.
    pub priority: u32,

    /// PBS: ticks RUNNING since the last dispatch.
    pub run_time: u32,

    /// PBS: ticks SLEEPING since the last dispatch.
    pub wait_time: u32,

    /// Times the process has been dispatched.
    pub runs: u32,

    /// LBS: lottery tickets. Fixed after allocation.
    pub tickets: u32,

    /// MLFQ: priority level, 0 (highest) .. MAXNUM-1.
    pub level: usize,

    /// MLFQ: ticks left in the current quantum.
    pub time_quantum: i32,

    /// MLFQ: tick the process last entered a queue (or came off the CPU).
    pub queue_entry_time: u32,

    /// MLFQ: ticks spent RUNNING at each level.
    pub queue_run_time: [u32; MAXNUM],

    /// MLFQ: whether the process currently sits in a ready queue.
    pub in_queue: bool,
}

impl SchedEntry {
    const fn new() -> Self {
        Self {
            creation_time: 0,
            exit_time: 0,
            total_run_time: 0,
            priority: DEFAULTPRIO,
            run_time: 0,
            wait_time: 0,
            runs: 0,
            tickets: DEFAULTTICKETS,
            level: 0,
            time_quantum: 1,
            queue_entry_time: 0,
            queue_run_time: [0; MAXNUM],
            in_queue: false,
        }
    }
}

/// `Proc::info`'s spinlock must be held when using these.
pub struct ProcInfo {
    /// Process state.
    pub state: Procstate,

    /// If non-null, sleeping on this channel.
    pub(crate) waitchannel: *const WaitChannel,

    /// Exit status to be returned to parent's wait.
    pub(crate) xstate: i32,

    /// Process ID.
    pub(crate) pid: Pid,

    /// Scheduling state.
    pub sched: SchedEntry,
}

/// `Proc::data` is private to the process, so its lock need not be held.
pub struct ProcData {
    /// Virtual address of kernel stack.
    pub kstack: usize,

    /// Data page for the trap machinery.
    pub(crate) trap_frame: *mut TrapFrame,

    /// User address space. Initialized while state ≠ UNUSED.
    pub(crate) memory: MaybeUninit<UserMemory>,

    /// swtch() here to run the process.
    pub(crate) context: Context,

    /// Open files.
    pub open_files: [Option<File>; NOFILE],

    /// Current directory. Initialized while state ∉ { UNUSED, USED }.
    pub(crate) cwd: MaybeUninit<Inode>,

    /// Process name (debugging).
    pub name: ArrayString<MAXPROCNAME>,

    /// Bit n set: syscall n is reported on the console.
    pub trace_mask: u32,

    /// Alarm period in ticks; 0 when no alarm is armed.
    pub(crate) alarm_interval: u32,

    /// Ticks since the handler last fired.
    pub(crate) alarm_passed: u32,

    /// User-space handler address.
    pub(crate) alarm_handler: usize,
}

impl ProcData {
    const fn new() -> Self {
        Self {
            kstack: 0,
            trap_frame: ptr::null_mut(),
            memory: MaybeUninit::uninit(),
            context: Context::new(),
            open_files: array![_ => None; NOFILE],
            cwd: MaybeUninit::uninit(),
            name: ArrayString::new_const(),
            trace_mask: 0,
            alarm_interval: 0,
            alarm_passed: 0,
            alarm_handler: 0,
        }
    }
}

/// Per-process state.
///
/// # Safety
///
/// * If `info.state` ≠ `UNUSED`, then `data.trap_frame` points to an owned
///   page and `data.memory` has been initialized.
/// * If `info.state` ∉ { `UNUSED`, `USED` }, then `data.cwd` has been
///   initialized, and `parent` is null only for the initial process.
pub struct Proc {
    /// Parent process. `Procs::wait_lock` must be held to use this.
    pub(crate) parent: UnsafeCell<*const Proc>,

    pub info: Spinlock<ProcInfo>,

    pub(crate) data: UnsafeCell<ProcData>,

    /// Wait channel saying a child proc is dead.
    pub(crate) child_waitchannel: WaitChannel,

    /// If true, the process has been killed.
    killed: AtomicBool,
}

// SAFETY: `info` is lock-protected, `killed` is atomic, `parent` is guarded
// by the wait lock, and `data` is only touched by the running process itself
// or by code holding the info lock on a non-running process.
unsafe impl Sync for Proc {}

impl Proc {
    pub(crate) const fn new() -> Self {
        Self {
            parent: UnsafeCell::new(ptr::null()),
            info: Spinlock::new(
                "proc",
                ProcInfo {
                    state: Procstate::UNUSED,
                    waitchannel: ptr::null(),
                    xstate: 0,
                    pid: 0,
                    sched: SchedEntry::new(),
                },
            ),
            data: UnsafeCell::new(ProcData::new()),
            child_waitchannel: WaitChannel::new(),
            killed: AtomicBool::new(false),
        }
    }

    /// Marks the process killed. The victim exits when it next crosses the
    /// user-kernel boundary.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub(crate) fn clear_killed(&self) {
        self.killed.store(false, Ordering::Release);
    }

    /// Acquires the info lock and returns the guard that stands for it.
    pub fn lock(&self) -> ProcGuard<'_> {
        core::mem::forget(self.info.lock());
        ProcGuard { proc: self }
    }
}

/// # Safety
///
/// `proc.info` is locked.
pub struct ProcGuard<'s> {
    proc: &'s Proc,
}

impl<'s> ProcGuard<'s> {
    pub fn deref_info(&self) -> &ProcInfo {
        // SAFETY: `self.info` is locked.
        unsafe { &*self.info.get_mut_raw() }
    }

    pub fn deref_mut_info(&mut self) -> &mut ProcInfo {
        // SAFETY: `self.info` is locked and `&mut self` is exclusive.
        unsafe { &mut *self.info.get_mut_raw() }
    }

    /// # Safety
    ///
    /// There must be no `CurrentProc` referring to the same `Proc`.
    pub(crate) unsafe fn deref_mut_data(&mut self) -> &mut ProcData {
        unsafe { &mut *self.data.get() }
    }

    pub fn state(&self) -> Procstate {
        self.deref_info().state
    }

    /// Wake process from sleep().
    pub(crate) fn wakeup(&mut self) {
        if self.state() == Procstate::SLEEPING {
            self.deref_mut_info().state = Procstate::RUNNABLE;
        }
    }

    /// Switch to the scheduler. Must hold only this process's info lock and
    /// have changed `state`. Saves and restores `interrupt_enabled` because
    /// it is a property of this kernel thread, not this CPU.
    ///
    /// # Safety
    ///
    /// This guard must belong to the process running on this CPU.
    pub(crate) unsafe fn sched(&mut self) {
        assert!(!TargetPlatform::intr_get(), "sched interruptible");
        assert_ne!(self.state(), Procstate::RUNNING, "sched running");

        // SAFETY: interrupts are disabled.
        let cpu = unsafe { kernel().cpus().current_unchecked() };
        assert_eq!(cpu.get_noff(), 1, "sched locks");

        let interrupt_enabled = cpu.get_interrupt();
        unsafe {
            TargetPlatform::context_switch(
                &mut self.deref_mut_data().context,
                cpu.context_raw_mut(),
            )
        };

        // `swtch` may have moved this thread to another cpu.
        // SAFETY: interrupts are still disabled.
        let cpu = unsafe { kernel().cpus().current_unchecked() };
        cpu.set_interrupt(interrupt_enabled);
    }

    /// Temporarily releases the info lock, runs `f` over the bare `Proc`,
    /// and reacquires the lock.
    pub(crate) fn reacquire_after<F, U>(&mut self, f: F) -> U
    where
        F: FnOnce(&Proc) -> U,
    {
        // SAFETY: the release is temporary and `self` cannot be used in `f`.
        unsafe { self.info.unlock() };
        let result = f(self.proc);
        core::mem::forget(self.info.lock());
        result
    }
}

impl Deref for ProcGuard<'_> {
    type Target = Proc;

    fn deref(&self) -> &Self::Target {
        self.proc
    }
}

impl Drop for ProcGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the guard stands for the forgotten lock guard.
        unsafe { self.info.unlock() };
    }
}

/// The process running on this CPU.
///
/// # Safety
///
/// At most one `CurrentProc` per thread; its `Proc` is the CPU's current
/// process, so `data` is exclusively this thread's to touch.
pub struct CurrentProc<'p> {
    inner: &'p Proc,
}

impl<'p> CurrentProc<'p> {
    /// # Safety
    ///
    /// `proc` must be this CPU's running process, and no other `CurrentProc`
    /// for it may exist.
    pub(crate) unsafe fn new(proc: &'p Proc) -> Self {
        Self { inner: proc }
    }

    pub fn pid(&self) -> Pid {
        // SAFETY: pid is not modified while the process runs.
        unsafe { (*self.info.get_mut_raw()).pid }
    }

    pub(crate) fn deref_data(&self) -> &ProcData {
        // SAFETY: invariant of `CurrentProc`.
        unsafe { &*self.data.get() }
    }

    pub(crate) fn deref_mut_data(&mut self) -> &mut ProcData {
        // SAFETY: invariant of `CurrentProc`.
        unsafe { &mut *self.data.get() }
    }

    pub fn trap_frame(&self) -> &TrapFrame {
        // SAFETY: trap_frame is a valid owned page while state ≠ UNUSED.
        unsafe { &*self.deref_data().trap_frame }
    }

    pub fn trap_frame_mut(&mut self) -> &mut TrapFrame {
        // SAFETY: trap_frame is a valid owned page while state ≠ UNUSED.
        unsafe { &mut *self.deref_mut_data().trap_frame }
    }

    pub fn memory(&self) -> &UserMemory {
        // SAFETY: memory is initialized while state ≠ UNUSED.
        unsafe { self.deref_data().memory.assume_init_ref() }
    }

    pub fn memory_mut(&mut self) -> &mut UserMemory {
        // SAFETY: memory is initialized while state ≠ UNUSED.
        unsafe { self.deref_mut_data().memory.assume_init_mut() }
    }

    pub fn name(&self) -> &str {
        self.deref_data().name.as_str()
    }

    pub fn trace_mask(&self) -> u32 {
        self.deref_data().trace_mask
    }

    pub fn set_trace_mask(&mut self, mask: u32) {
        self.deref_mut_data().trace_mask = mask;
    }

    /// Grow or shrink user memory by `n` bytes. Returns the new size.
    pub fn resize(&mut self, n: i32) -> Result<usize> {
        self.memory_mut().resize(n)
    }

    /// Give up the CPU for one scheduling round.
    pub fn yield_cpu(&self) {
        let mut guard = self.inner.lock();
        guard.deref_mut_info().state = Procstate::RUNNABLE;
        // SAFETY: this is the running process and we hold only its lock.
        unsafe { guard.sched() };
    }

    /// Arms (or with `interval` 0 disarms) the tick alarm.
    pub fn sigalarm(&mut self, interval: u32, handler: usize) {
        let data = self.deref_mut_data();
        data.alarm_interval = interval;
        data.alarm_passed = 0;
        data.alarm_handler = handler;
    }

    /// Advances the alarm by one tick; returns the handler address when it
    /// is due. Re-entering user space at that address is the trap code's
    /// job.
    pub fn alarm_tick(&mut self) -> Option<UVAddr> {
        let data = self.deref_mut_data();
        if data.alarm_interval == 0 {
            return None;
        }
        data.alarm_passed += 1;
        if data.alarm_passed < data.alarm_interval {
            return None;
        }
        data.alarm_passed = 0;
        Some(UVAddr::new(data.alarm_handler))
    }

    /// Copy to either a user address (`user_dst`) or a kernel address.
    pub fn either_copy_out(&mut self, user_dst: bool, dst: usize, src: &[u8]) -> Result<()> {
        if user_dst {
            self.memory_mut().copy_out_bytes(UVAddr::new(dst), src)
        } else {
            // SAFETY: the caller passed a valid kernel destination.
            unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len()) };
            Ok(())
        }
    }

    /// Copy from either a user address (`user_src`) or a kernel address.
    pub fn either_copy_in(&mut self, dst: &mut [u8], user_src: bool, src: usize) -> Result<()> {
        if user_src {
            self.memory_mut().copy_in_bytes(dst, UVAddr::new(src))
        } else {
            // SAFETY: the caller passed a valid kernel source.
            unsafe { ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len()) };
            Ok(())
        }
    }
}

impl<'p> Deref for CurrentProc<'p> {
    type Target = Proc;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

/// Returns the current `CurrentProc`, or `None` from the scheduler.
///
/// # Safety
///
/// Must not be called while another `CurrentProc` for this thread is alive.
pub unsafe fn myproc() -> Option<CurrentProc<'static>> {
    let proc = kernel().current_proc_ref();
    // SAFETY: the pointer refers into the static process pool.
    let proc = unsafe { proc.as_ref() }?;
    // SAFETY: safety condition of this function.
    Some(unsafe { CurrentProc::new(proc) })
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scaffolding for the host-run tests: a fresh process table per test,
    //! and serialization of everything that touches per-CPU state.

    use std::boxed::Box;
    use std::sync::{Mutex, MutexGuard};

    use super::*;
    use crate::arch::interface::PageManager;
    use crate::param::MAXNUM;

    static SERIAL: Mutex<()> = Mutex::new(());

    /// Tests that touch CPU 0's state, the tick counter, or the MLFQ queues
    /// hold this for their whole body.
    pub(crate) fn serial() -> MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A process table of its own, so suites cannot see each other's
    /// processes. Leaked: guards borrow it for 'static.
    pub(crate) fn fresh_procs() -> &'static Procs {
        Box::leak(Box::new(Procs::new()))
    }

    /// Allocates a process with a one-page address space, releases its
    /// lock, and hands it back with its pid.
    pub(crate) fn alloc_proc(procs: &'static Procs) -> (&'static Proc, Pid) {
        let trap_frame = TargetPlatform::alloc_page().unwrap();
        let memory = UserMemory::new(trap_frame.addr(), Some(&[0x73])).unwrap();
        let guard = procs.alloc(trap_frame, memory).unwrap();
        let pid = guard.deref_info().pid;
        let proc = &*guard as *const Proc;
        drop(guard);
        // SAFETY: the pool is 'static via the leaked table.
        (unsafe { &*proc }, pid)
    }

    /// Installs `p` as CPU 0's running process and returns its context.
    pub(crate) fn make_current(p: &'static Proc) -> CurrentProc<'static> {
        let cpus = kernel().cpus();
        let intr = cpus.push_off();
        cpus.current(&intr).set_proc(p as *const Proc);
        // SAFETY: setting a proc pointer does not race under the test lock.
        unsafe { cpus.pop_off(intr) };
        // SAFETY: just installed; no other CurrentProc exists.
        unsafe { myproc() }.unwrap()
    }

    pub(crate) fn clear_current() {
        let cpus = kernel().cpus();
        let intr = cpus.push_off();
        cpus.current(&intr).set_proc(core::ptr::null());
        // SAFETY: see make_current.
        unsafe { cpus.pop_off(intr) };
    }

    /// Index of `p` in its pool.
    pub(crate) fn slot_of(procs: &Procs, p: &Proc) -> usize {
        let base = procs.pool().as_ptr() as usize;
        (p as *const Proc as usize - base) / core::mem::size_of::<Proc>()
    }

    /// Empties every MLFQ ready queue (they are kernel-global).
    pub(crate) fn drain_mlfq() {
        for level in 0..MAXNUM {
            let mut queue = kernel().mlfq(level).lock();
            while !queue.is_empty() {
                queue.pop();
            }
        }
    }

    pub(crate) fn reset_rotor() {
        let cpus = kernel().cpus();
        let intr = cpus.push_off();
        cpus.current(&intr).set_rotor(0);
        // SAFETY: see make_current.
        unsafe { cpus.pop_off(intr) };
    }

    /// A blank `ProcInfo` for accounting tests.
    pub(crate) fn fresh_info() -> ProcInfo {
        ProcInfo {
            state: Procstate::UNUSED,
            waitchannel: ptr::null(),
            xstate: 0,
            pid: 1,
            sched: SchedEntry::new(),
        }
    }
}
