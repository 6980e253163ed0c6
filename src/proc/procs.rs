//! The process table and the lifecycle operations over it.

use core::fmt;
use core::mem::{self, MaybeUninit};
use core::ptr;
use core::sync::atomic::{AtomicI32, AtomicPtr, Ordering};

use array_macro::array;
use itertools::izip;
use spin::Once;

use super::{
    CurrentProc, Pid, Proc, ProcGuard, Procstate, SchedEntry, TargetPolicy, WaitChannel,
};
use crate::arch::interface::{
    ContextManager, FsManager, PageManager, Platform, ProcManager, TrapFrameManager,
};
use crate::arch::{Context, TargetPlatform, TrapFrame, UserMemory};
use crate::error::{KernelError, Result};
use crate::file::{KernelFile, KernelInode};
use crate::kernel::kernel;
use crate::lock::{Spinlock, SpinlockGuard};
use crate::page::Page;
use crate::param::{NPROC, PGSIZE, ROOTDEV};
use crate::proc::SchedPolicy;
use crate::vm::{UserMemoryManager, UVAddr};

/// The process system: the whole pool and everything global to it.
pub struct Procs {
    nextpid: AtomicI32,

    pool: [Proc; NPROC],

    /// The init process; set once while booting.
    initial_proc: AtomicPtr<Proc>,

    /// Helps ensure that wakeups of wait()ing parents are not lost, and
    /// guards every `Proc::parent` link.
    /// Must be acquired before any process's info lock.
    wait_lock: Spinlock<()>,
}

/// Holds `Procs::wait_lock`; every access to a `Proc::parent` field takes a
/// `&mut WaitGuard` as witness.
pub struct WaitGuard<'s>(SpinlockGuard<'s, ()>);

impl Proc {
    /// The parent link. Readable and writable only under the wait lock.
    pub(crate) fn parent_mut<'a: 'b, 'b>(
        &'a self,
        _guard: &'b mut WaitGuard<'_>,
    ) -> &'b mut *const Proc {
        // SAFETY: the wait guard serializes all access to `parent`.
        unsafe { &mut *self.parent.get() }
    }
}

impl Procs {
    pub(crate) const fn new() -> Self {
        Self {
            nextpid: AtomicI32::new(1),
            pool: array![_ => Proc::new(); NPROC],
            initial_proc: AtomicPtr::new(ptr::null_mut()),
            wait_lock: Spinlock::new("wait_lock", ()),
        }
    }

    /// Assigns each slot its kernel stack. Runs once at boot, before any
    /// process exists.
    ///
    /// # Safety
    ///
    /// No concurrent access to the pool.
    pub(crate) unsafe fn init_kstacks(&self) {
        for (i, p) in self.pool.iter().enumerate() {
            // SAFETY: boot-time exclusive access.
            unsafe { (*p.data.get()).kstack = TargetPlatform::kstack(i) };
        }
    }

    pub(crate) fn pool(&self) -> &[Proc; NPROC] {
        &self.pool
    }

    /// The init process, as a raw pointer into the pool.
    pub fn initial_proc(&self) -> *const Proc {
        let p = self.initial_proc.load(Ordering::Acquire);
        assert!(!p.is_null(), "initial_proc");
        p
    }

    fn allocpid(&self) -> Pid {
        self.nextpid.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn wait_guard(&self) -> WaitGuard<'_> {
        WaitGuard(self.wait_lock.lock())
    }

    /// Looks for an UNUSED slot and initializes the state required to run
    /// in the kernel. On success the slot's lock is still held by the
    /// returned guard. Takes ownership of the already-allocated trap frame
    /// page and address space, and hands both back to the platform when no
    /// slot is free.
    pub(super) fn alloc(&self, trap_frame: Page, memory: UserMemory) -> Result<ProcGuard<'_>> {
        let now = kernel().ticks();
        for p in self.pool.iter() {
            let mut guard = p.lock();
            if guard.state() == Procstate::UNUSED {
                // SAFETY: this process cannot be the current process yet.
                let data = unsafe { guard.deref_mut_data() };
                data.trap_frame = trap_frame.into_usize() as *mut TrapFrame;
                let _ = data.memory.write(memory);

                // Start executing at forkret, on top of the kernel stack.
                data.context = Context::default();
                data.context.set_ret_addr(forkret as usize);
                data.context.set_sp(data.kstack + PGSIZE);

                data.trace_mask = 0;
                data.alarm_interval = 0;
                data.alarm_passed = 0;
                data.alarm_handler = 0;

                let info = guard.deref_mut_info();
                info.pid = self.allocpid();
                info.sched = SchedEntry::new();
                info.sched.creation_time = now;
                info.sched.queue_entry_time = now;
                // Safe now: trap_frame and memory have been initialized.
                info.state = Procstate::USED;
                return Ok(guard);
            }
        }

        TargetPlatform::free_page(trap_frame);
        memory.free();
        Err(KernelError::OutOfProcs)
    }

    /// Sets up the first user process.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, after `Kernel::init`.
    pub unsafe fn user_proc_init(&self) {
        // Allocate a trap frame page.
        let trap_frame = scopeguard::guard(
            TargetPlatform::alloc_page().expect("user_proc_init: alloc_page"),
            |page| TargetPlatform::free_page(page),
        );

        // An address space of one user page holding initcode's instructions.
        let memory = UserMemory::new(trap_frame.addr(), Some(TargetPlatform::init_code()))
            .expect("user_proc_init: UserMemory::new");

        let mut guard = self
            .alloc(scopeguard::ScopeGuard::into_inner(trap_frame), memory)
            .expect("user_proc_init: Procs::alloc");

        // SAFETY: this process cannot be the current process yet.
        let data = unsafe { guard.deref_mut_data() };

        // Prepare for the very first "return" from kernel to user.
        // SAFETY: trap_frame has been initialized by alloc.
        let trap_frame = unsafe { &mut *data.trap_frame };
        trap_frame.set_pc(0); // user program counter
        trap_frame.set_sp(PGSIZE); // user stack pointer

        data.name.push_str("initcode");
        let _ = data.cwd.write(TargetPlatform::root_inode());

        // Safe now: cwd has been initialized.
        guard.deref_mut_info().state = Procstate::RUNNABLE;

        let first = &*guard as *const Proc;
        self.initial_proc.store(first as *mut Proc, Ordering::Release);
        log::info!("init process ready");
    }

    /// Creates a new process, copying the parent. Sets up the child's
    /// kernel stack to return as if from the fork() system call.
    pub fn fork(&self, ctx: &mut CurrentProc<'_>) -> Result<Pid> {
        // Allocate a trap frame page; it flows back to the platform if any
        // later step fails.
        let trap_frame = scopeguard::guard(
            TargetPlatform::alloc_page().ok_or(KernelError::OutOfMemory)?,
            |page| TargetPlatform::free_page(page),
        );

        // Copy user memory from parent to child.
        let memory = ctx
            .memory_mut()
            .try_clone(trap_frame.addr())
            .ok_or(KernelError::OutOfMemory)?;

        // Tickets are fixed after allocation, so the parent's can be read
        // without its lock.
        let tickets = unsafe { (*ctx.info.get_mut_raw()).sched.tickets };

        // Allocate the process slot.
        let mut np = self.alloc(scopeguard::ScopeGuard::into_inner(trap_frame), memory)?;
        // SAFETY: this process cannot be the current process yet.
        let npdata = unsafe { np.deref_mut_data() };

        // Copy saved user registers, and make fork return 0 in the child.
        // SAFETY: trap_frame has been initialized by alloc.
        unsafe { *npdata.trap_frame = *ctx.trap_frame() };
        unsafe { (*npdata.trap_frame).set_ret_val(0) };

        // Increment reference counts on open file descriptors.
        for (nf, f) in izip!(npdata.open_files.iter_mut(), ctx.deref_data().open_files.iter()) {
            if let Some(file) = f {
                *nf = Some(file.dup());
            }
        }
        let _ = npdata.cwd.write(ctx.cwd().dup());

        npdata.name = ctx.deref_data().name;
        npdata.trace_mask = ctx.trace_mask();
        np.deref_mut_info().sched.tickets = tickets;

        let pid = np.deref_mut_info().pid;
        let parent = &**ctx as *const Proc;

        // Drop the child's lock before taking the wait lock; the lock order
        // is wait_lock -> info.
        np.reacquire_after(|np| {
            let mut parent_guard = self.wait_guard();
            *np.parent_mut(&mut parent_guard) = parent;
        });

        // Safe now: cwd has been initialized.
        np.deref_mut_info().state = Procstate::RUNNABLE;

        Ok(pid)
    }

    /// Passes `proc`'s abandoned children to init.
    fn reparent(&self, proc: *const Proc, parent_guard: &mut WaitGuard<'_>) {
        for pp in self.pool.iter() {
            if *pp.parent_mut(parent_guard) == proc {
                *pp.parent_mut(parent_guard) = self.initial_proc();
                // SAFETY: initial_proc points into the pool.
                unsafe { (*self.initial_proc()).child_waitchannel.wakeup() };
            }
        }
    }

    /// Exits the current process with `status`; it stays ZOMBIE until the
    /// parent reaps it. Does not return.
    pub fn exit_current(&self, status: i32, ctx: &mut CurrentProc<'_>) -> ! {
        let me = &**ctx as *const Proc;
        assert_ne!(me, self.initial_proc(), "init exiting");

        // Close all open files.
        for file in ctx.deref_mut_data().open_files.iter_mut() {
            if let Some(file) = file.take() {
                file.close();
            }
        }

        TargetPlatform::begin_op();
        // SAFETY: cwd was initialized and the process is never used again.
        unsafe { mem::replace(&mut ctx.deref_mut_data().cwd, MaybeUninit::uninit()).assume_init() }
            .put();
        TargetPlatform::end_op();

        let now = kernel().ticks();
        let mut parent_guard = self.wait_guard();

        // Give any children to init.
        self.reparent(me, &mut parent_guard);

        // The parent might be sleeping in wait().
        let parent = *ctx.parent_mut(&mut parent_guard);
        // SAFETY: every process but init has a parent in the pool.
        unsafe { (*parent).child_waitchannel.wakeup() };

        let mut guard = ctx.lock();
        let info = guard.deref_mut_info();
        info.xstate = status;
        info.sched.exit_time = now;
        info.state = Procstate::ZOMBIE;

        drop(parent_guard);

        // Jump into the scheduler, never to return.
        // SAFETY: only the process's own lock is held.
        unsafe { guard.sched() };
        unreachable!("zombie exit");
    }

    /// Waits for a child to exit; returns its pid, ticks it spent running,
    /// and ticks it spent neither running nor being created.
    fn wait_inner(
        &self,
        addr: UVAddr,
        ctx: &mut CurrentProc<'_>,
    ) -> Result<(Pid, u32, u32)> {
        let me = &**ctx as *const Proc;
        let mut parent_guard = self.wait_guard();

        loop {
            // Scan through the pool looking for exited children.
            let mut havekids = false;
            for np in self.pool.iter() {
                if *np.parent_mut(&mut parent_guard) != me {
                    continue;
                }
                havekids = true;

                // Make sure the child isn't still in exit() or swtch().
                let mut np = np.lock();
                if np.state() != Procstate::ZOMBIE {
                    continue;
                }

                let info = np.deref_info();
                let pid = info.pid;
                let xstate = info.xstate;
                let run_time = info.sched.total_run_time;
                let wait_time = info
                    .sched
                    .exit_time
                    .wrapping_sub(info.sched.creation_time)
                    .wrapping_sub(run_time);

                if !addr.is_null() && ctx.memory_mut().copy_out(addr, &xstate).is_err() {
                    return Err(KernelError::BadAddress);
                }

                // Reap the zombie.
                // SAFETY: the child is ZOMBIE, so nothing runs it.
                unsafe { np.clear(parent_guard) };
                return Ok((pid, run_time, wait_time));
            }

            // No point waiting if we don't have any children.
            if !havekids {
                return Err(KernelError::NoChild);
            }
            if ctx.killed() {
                return Err(KernelError::Killed);
            }

            // Wait for a child to exit.
            ctx.child_waitchannel.sleep(&mut parent_guard.0, ctx);
        }
    }

    /// Waits for a child process to exit and returns its pid, writing the
    /// exit status to `addr` when it is non-null.
    pub fn wait(&self, addr: UVAddr, ctx: &mut CurrentProc<'_>) -> Result<Pid> {
        self.wait_inner(addr, ctx).map(|(pid, _, _)| pid)
    }

    /// `wait`, plus the child's run/wait tick totals.
    pub fn waitx(&self, addr: UVAddr, ctx: &mut CurrentProc<'_>) -> Result<(Pid, u32, u32)> {
        self.wait_inner(addr, ctx)
    }

    /// Kills the process with the given pid. The victim won't exit until it
    /// next returns toward user space.
    pub fn kill(&self, pid: Pid) -> Result<()> {
        for p in self.pool.iter() {
            let mut guard = p.lock();
            if guard.deref_info().pid == pid {
                p.kill();
                guard.wakeup();
                log::debug!("kill pid {}", pid);
                return Ok(());
            }
        }
        Err(KernelError::NoSuchProcess)
    }

    /// Wakes up every process in the pool sleeping on `target`.
    /// Must be called without any process lock held.
    pub fn wakeup_pool(&self, target: &WaitChannel) {
        let current = kernel().current_proc_ref();
        for p in self.pool.iter() {
            if p as *const Proc != current {
                let mut guard = p.lock();
                if guard.deref_info().waitchannel == target as *const WaitChannel {
                    guard.wakeup();
                }
            }
        }
    }

    /// Per-tick accounting over the whole pool; the active policy decides
    /// which counters move.
    pub fn update_time(&self) {
        for p in self.pool.iter() {
            let mut guard = p.lock();
            TargetPolicy::on_tick(guard.deref_mut_info());
        }
    }

    /// Sets the static PBS priority of `pid` and resets its per-dispatch
    /// run time. Returns the old priority. The caller decides whether the
    /// change warrants a yield.
    pub fn set_priority(&self, pid: Pid, priority: u32) -> Option<u32> {
        for p in self.pool.iter() {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            if info.state != Procstate::UNUSED && info.pid == pid {
                let old = info.sched.priority;
                info.sched.priority = priority;
                info.sched.run_time = 0;
                return Some(old);
            }
        }
        None
    }

    /// Prints one line per non-UNUSED process. Takes no locks, to avoid
    /// wedging a stuck machine further.
    pub fn dump(&self, w: &mut dyn fmt::Write) -> fmt::Result {
        let now = kernel().ticks_raw();
        writeln!(w)?;
        for p in self.pool.iter() {
            // SAFETY: debugging surface; racy reads are acceptable here.
            let info = unsafe { &*p.info.get_mut_raw() };
            if info.state == Procstate::UNUSED {
                continue;
            }
            let data = unsafe { &*p.data.get() };
            TargetPolicy::dump_line(info, data.name.as_str(), now, w)?;
            writeln!(w)?;
        }
        Ok(())
    }
}

impl CurrentProc<'_> {
    pub(crate) fn cwd(&self) -> &crate::arch::Inode {
        // SAFETY: cwd is initialized while the process runs.
        unsafe { self.deref_data().cwd.assume_init_ref() }
    }
}

impl ProcGuard<'_> {
    /// Frees a proc structure and the data hanging from it, including user
    /// pages, and clears the parent link. The slot becomes UNUSED.
    ///
    /// # Safety
    ///
    /// The process must not be running: its state is ZOMBIE (reaping) or it
    /// never left USED.
    pub(crate) unsafe fn clear(&mut self, mut parent_guard: WaitGuard<'_>) {
        // SAFETY: nothing runs this process any longer.
        let data = unsafe { self.deref_mut_data() };
        let trap_frame = mem::replace(&mut data.trap_frame, ptr::null_mut());
        // SAFETY: trap_frame uniquely refers to an owned page.
        TargetPlatform::free_page(unsafe { Page::from_usize(trap_frame as usize) });
        // SAFETY: memory was initialized and is replaced with uninit while
        // the state becomes UNUSED.
        unsafe { mem::replace(&mut data.memory, MaybeUninit::uninit()).assume_init() }.free();

        data.name.clear();
        data.trace_mask = 0;
        data.alarm_interval = 0;
        data.alarm_passed = 0;
        data.alarm_handler = 0;

        *self.parent_mut(&mut parent_guard) = ptr::null();
        drop(parent_guard);

        let info = self.deref_mut_info();
        info.waitchannel = ptr::null();
        info.pid = 0;
        info.xstate = 0;
        info.state = Procstate::UNUSED;

        self.clear_killed();
    }
}

/// A fork child's very first scheduling by scheduler() will swtch here.
unsafe fn forkret() -> ! {
    static FSINIT: Once<()> = Once::new();

    // Still holding the process lock from scheduler.
    // SAFETY: no other `CurrentProc` exists on this new thread.
    let ctx = unsafe { myproc_unchecked() };
    // SAFETY: the scheduler acquired the lock and forgot its guard.
    unsafe { ctx.info.unlock() };

    // File-system initialization must run in the context of a regular
    // process (it may sleep), so it cannot run from main().
    FSINIT.call_once(|| TargetPlatform::fsinit(ROOTDEV));

    // SAFETY: the process's trap frame and page table are set up.
    unsafe { TargetPlatform::user_trap_ret() }
}

/// # Safety
///
/// Only for forkret: there is a current process and no `CurrentProc` yet.
unsafe fn myproc_unchecked() -> CurrentProc<'static> {
    unsafe { super::myproc() }.expect("forkret: no current process")
}

#[cfg(test)]
mod tests {
    use std::string::String;

    use super::super::test_support::*;
    use super::*;
    use crate::arch::interface::RegNum;
    use crate::param::{DEFAULTPRIO, DEFAULTTICKETS};
    use crate::proc::Procstate::{RUNNABLE, RUNNING, SLEEPING, UNUSED, USED, ZOMBIE};

    fn find_by_pid(procs: &'static Procs, pid: Pid) -> &'static Proc {
        procs
            .pool()
            .iter()
            .find(|p| p.lock().deref_info().pid == pid)
            .expect("pid not in table")
    }

    #[test]
    fn alloc_assigns_increasing_pids_and_defaults() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, pid_a) = alloc_proc(procs);
        let (_b, pid_b) = alloc_proc(procs);
        assert!(pid_a > 0);
        assert!(pid_b > pid_a);

        let guard = a.lock();
        let info = guard.deref_info();
        assert_eq!(info.state, USED);
        assert_eq!(info.sched.priority, DEFAULTPRIO);
        assert_eq!(info.sched.tickets, DEFAULTTICKETS);
        assert_eq!(info.sched.level, 0);
        assert_eq!(info.sched.runs, 0);
        assert!(!info.sched.in_queue);
    }

    #[test]
    fn full_table_fails_and_rolls_back_allocations() {
        let _s = serial();
        let procs = fresh_procs();
        for _ in 0..NPROC {
            let trap_frame = TargetPlatform::alloc_page().unwrap();
            let memory = UserMemory::new(trap_frame.addr(), None).unwrap();
            procs.alloc(trap_frame, memory).unwrap();
        }

        let free_before = TargetPlatform::free_page_count();
        let trap_frame = TargetPlatform::alloc_page().unwrap();
        let memory = UserMemory::new(trap_frame.addr(), None).unwrap();
        let err = procs.alloc(trap_frame, memory).map(|_| ()).unwrap_err();
        assert_eq!(err, KernelError::OutOfProcs);
        // The trap frame page went back to the pool.
        assert_eq!(TargetPlatform::free_page_count(), free_before);
    }

    #[test]
    fn fork_copies_parent_and_child_sees_zero() {
        let _s = serial();
        let procs = fresh_procs();
        let (parent, parent_pid) = alloc_proc(procs);
        let mut ctx = make_current(parent);
        ctx.deref_mut_data().name.push_str("spin");
        ctx.set_trace_mask(1 << 2);
        unsafe { (*ctx.info.get_mut_raw()).sched.tickets = 7 };
        // Make fork() look like it returns the child pid in the parent.
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R0) = 0xdead;

        let child_pid = procs.fork(&mut ctx).expect("fork");
        assert!(child_pid > parent_pid);
        let child = find_by_pid(procs, child_pid);

        {
            let guard = child.lock();
            assert_eq!(guard.deref_info().state, RUNNABLE);
            assert_eq!(guard.deref_info().sched.tickets, 7);
        }
        // The child observes fork() = 0 through its trap frame.
        let child_tf = unsafe { &*(*child.data.get()).trap_frame };
        assert_eq!(child_tf.param_reg(RegNum::R0), 0);
        let child_data = unsafe { &*child.data.get() };
        assert_eq!(child_data.name.as_str(), "spin");
        assert_eq!(child_data.trace_mask, 1 << 2);

        let mut wg = procs.wait_guard();
        assert_eq!(*child.parent_mut(&mut wg), parent as *const Proc);
        drop(wg);
        clear_current();
    }

    #[test]
    fn fork_exit_wait_roundtrip() {
        let _s = serial();
        let procs = fresh_procs();
        let (parent, _) = alloc_proc(procs);
        let mut ctx = make_current(parent);
        let child_pid = procs.fork(&mut ctx).expect("fork");
        let child = find_by_pid(procs, child_pid);

        // Stage the child's exit: ZOMBIE with status 7 after 4 ticks of CPU
        // time in a 10-tick life.
        {
            let mut guard = child.lock();
            let info = guard.deref_mut_info();
            info.xstate = 7;
            info.sched.exit_time = info.sched.creation_time + 10;
            info.sched.total_run_time = 4;
            info.state = ZOMBIE;
        }

        // The exit status lands in the parent's memory.
        let status_addr = UVAddr::new(64);
        let (pid, run_time, wait_time) = procs.waitx(status_addr, &mut ctx).expect("waitx");
        assert_eq!(pid, child_pid);
        assert_eq!(run_time, 4);
        assert_eq!(wait_time, 6);
        let mut status = 0i32;
        ctx.memory_mut().copy_in(&mut status, status_addr).unwrap();
        assert_eq!(status, 7);

        // The slot was reaped all the way back to UNUSED.
        let guard = child.lock();
        assert_eq!(guard.deref_info().state, UNUSED);
        assert_eq!(guard.deref_info().pid, 0);
        assert!(!child.killed());
        drop(guard);
        clear_current();
    }

    #[test]
    fn wait_without_children_fails() {
        let _s = serial();
        let procs = fresh_procs();
        let (parent, _) = alloc_proc(procs);
        let mut ctx = make_current(parent);
        assert_eq!(
            procs.wait(UVAddr::new(0), &mut ctx).unwrap_err(),
            KernelError::NoChild
        );
        clear_current();
    }

    #[test]
    fn killed_parent_does_not_block_in_wait() {
        let _s = serial();
        let procs = fresh_procs();
        let (parent, _) = alloc_proc(procs);
        let mut ctx = make_current(parent);
        let child_pid = procs.fork(&mut ctx).expect("fork");
        let _child = find_by_pid(procs, child_pid);

        parent.kill();
        assert_eq!(
            procs.wait(UVAddr::new(0), &mut ctx).unwrap_err(),
            KernelError::Killed
        );
        clear_current();
    }

    #[test]
    fn kill_promotes_a_sleeper() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, pid) = alloc_proc(procs);
        let chan = WaitChannel::new();
        {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            info.state = SLEEPING;
            info.waitchannel = &chan as *const WaitChannel;
        }

        procs.kill(pid).expect("kill");
        let guard = p.lock();
        assert_eq!(guard.deref_info().state, RUNNABLE);
        assert!(p.killed());
        drop(guard);

        assert_eq!(procs.kill(9999).unwrap_err(), KernelError::NoSuchProcess);
    }

    #[test]
    fn wakeup_hits_only_its_channel() {
        let _s = serial();
        clear_current();
        let procs = fresh_procs();
        let (a, _) = alloc_proc(procs);
        let (b, _) = alloc_proc(procs);
        let (c, _) = alloc_proc(procs);
        let chan = WaitChannel::new();
        let other = WaitChannel::new();
        for (p, ch) in [(a, &chan), (b, &chan), (c, &other)] {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            info.state = SLEEPING;
            info.waitchannel = ch as *const WaitChannel;
        }

        procs.wakeup_pool(&chan);
        assert_eq!(a.lock().deref_info().state, RUNNABLE);
        assert_eq!(b.lock().deref_info().state, RUNNABLE);
        assert_eq!(c.lock().deref_info().state, SLEEPING);
    }

    #[test]
    fn update_time_charges_the_running_process() {
        let _s = serial();
        let procs = fresh_procs();
        let (running, _) = alloc_proc(procs);
        let (idle, _) = alloc_proc(procs);
        running.lock().deref_mut_info().state = RUNNING;
        idle.lock().deref_mut_info().state = SLEEPING;

        procs.update_time();
        procs.update_time();
        assert_eq!(running.lock().deref_info().sched.total_run_time, 2);
        assert_eq!(idle.lock().deref_info().sched.total_run_time, 0);
    }

    #[test]
    fn set_priority_resets_run_time() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, pid) = alloc_proc(procs);
        p.lock().deref_mut_info().sched.run_time = 9;

        assert_eq!(procs.set_priority(pid, 40), Some(DEFAULTPRIO));
        let guard = p.lock();
        assert_eq!(guard.deref_info().sched.priority, 40);
        assert_eq!(guard.deref_info().sched.run_time, 0);
        drop(guard);

        assert_eq!(procs.set_priority(12345, 40), None);
    }

    #[test]
    fn dump_lists_live_processes() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, pid) = alloc_proc(procs);
        unsafe { (*p.data.get()).name.push_str("dumpme") };

        let mut out = String::new();
        procs.dump(&mut out).unwrap();
        assert!(out.contains("dumpme"), "dump output: {}", out);
        assert!(out.contains(&std::format!("{}", pid)));
    }
}
