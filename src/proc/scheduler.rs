//! The per-CPU scheduler loop and the pluggable selection policies.
//!
//! Each policy answers the same three questions — which RUNNABLE process
//! runs next (`pick`), what bookkeeping a dispatch needs (`on_dispatch` /
//! `on_return`), and what the timer tick does to it (`on_tick` /
//! `tick_preempt`). Exactly one policy is bound at build time as
//! [`TargetPolicy`].

use core::fmt;
use core::ptr;

use super::{CurrentProc, Proc, ProcGuard, ProcInfo, Procs, Procstate, SchedEntry};
use crate::arch::interface::{InterruptManager, ProcManager, RngManager};
use crate::arch::TargetPlatform;
use crate::kernel::{kernel, Kernel};
use crate::param::{AGINGNUM, MAXNUM, MAXPRIO, NPROC};

/// A scheduling discipline. All five implementations compile everywhere;
/// the build binds one.
pub trait SchedPolicy {
    /// Selects the next process to run. The winner is returned with its
    /// info lock held; the core loop dispatches it.
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>>;

    /// Per-dispatch bookkeeping, after the core loop set RUNNING.
    fn on_dispatch(_guard: &mut ProcGuard<'_>) {}

    /// Cleanup when the process re-enters the scheduler, before the lock is
    /// released.
    fn on_return(_guard: &mut ProcGuard<'_>) {}

    /// Moves this process's time accounting by one tick.
    fn on_tick(info: &mut ProcInfo);

    /// Whether the process running on this CPU must yield on this tick.
    fn tick_preempt(ctx: &CurrentProc<'_>) -> bool;

    /// One procdump line for a non-UNUSED process.
    fn dump_line(info: &ProcInfo, name: &str, now: u32, w: &mut dyn fmt::Write) -> fmt::Result;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "mlfq")] {
        pub type TargetPolicy = Mlfq;
    } else if #[cfg(feature = "lbs")] {
        pub type TargetPolicy = Lottery;
    } else if #[cfg(feature = "pbs")] {
        pub type TargetPolicy = Pbs;
    } else if #[cfg(feature = "fcfs")] {
        pub type TargetPolicy = Fcfs;
    } else {
        pub type TargetPolicy = RoundRobin;
    }
}

impl Kernel {
    /// Per-CPU process scheduler. Each CPU calls this after setting itself
    /// up; it never returns. It loops, picking a process to run, switching
    /// to it, and taking control back when the process yields, sleeps, or
    /// exits.
    ///
    /// # Safety
    ///
    /// Must only be called once per CPU, as the CPU's scheduler thread.
    pub unsafe fn scheduler(&self) -> ! {
        // SAFETY: the scheduler thread is pinned to this CPU.
        let cpu = unsafe { self.cpus().current_unchecked() };
        cpu.set_proc(ptr::null_mut());
        loop {
            // Avoid deadlock by ensuring that devices can interrupt.
            unsafe { TargetPlatform::intr_on() };

            if let Some(mut guard) = TargetPolicy::pick(self.procs()) {
                // Switch to the chosen process. It is the process's job to
                // release its lock and reacquire it before jumping back.
                guard.deref_mut_info().state = Procstate::RUNNING;
                TargetPolicy::on_dispatch(&mut guard);
                cpu.set_proc(&*guard as *const Proc);

                // SAFETY: the process's context was prepared by alloc, and
                // holding its lock across the switch is the protocol.
                unsafe {
                    TargetPlatform::context_switch(
                        cpu.context_raw_mut(),
                        &mut (*guard.data.get()).context,
                    )
                };

                // The process is done running for now; it changed its own
                // state before coming back.
                cpu.set_proc(ptr::null_mut());
                TargetPolicy::on_return(&mut guard);
            }
        }
    }
}

/// Called from the timer interrupt on the CPU running `ctx`; yields when
/// the bound policy preempts on ticks.
pub fn timer_yield(ctx: &mut CurrentProc<'_>) {
    if TargetPolicy::tick_preempt(ctx) {
        ctx.yield_cpu();
    }
}

/// Round-robin: sweep the table, giving every RUNNABLE process one turn per
/// sweep.
pub struct RoundRobin;

impl SchedPolicy for RoundRobin {
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>> {
        // The rotor remembers where the previous sweep stopped, so one
        // pick/dispatch round continues the sweep instead of restarting it.
        // SAFETY: pick runs on the pinned scheduler thread.
        let cpu = unsafe { kernel().cpus().current_unchecked() };
        let start = cpu.rotor();
        for off in 0..NPROC {
            let i = (start + off) % NPROC;
            let guard = procs.pool()[i].lock();
            if guard.state() == Procstate::RUNNABLE {
                cpu.set_rotor((i + 1) % NPROC);
                return Some(guard);
            }
        }
        None
    }

    fn on_tick(info: &mut ProcInfo) {
        if info.state == Procstate::RUNNING {
            info.sched.total_run_time += 1;
        }
    }

    fn tick_preempt(_ctx: &CurrentProc<'_>) -> bool {
        true
    }

    fn dump_line(info: &ProcInfo, name: &str, _now: u32, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(w, "{} {} {}", info.pid, info.state.as_str(), name)
    }
}

/// First-come-first-served: the oldest RUNNABLE process runs to completion.
pub struct Fcfs;

impl SchedPolicy for Fcfs {
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>> {
        // One full scan for the earliest creation time. At most the current
        // best and the probe are locked at once, and the winner's lock is
        // held through dispatch, so its state cannot change under us.
        let mut best: Option<ProcGuard<'_>> = None;
        for p in procs.pool().iter() {
            let cand = p.lock();
            if cand.state() != Procstate::RUNNABLE {
                continue;
            }
            let wins = match &best {
                None => true,
                Some(b) => {
                    b.deref_info().sched.creation_time > cand.deref_info().sched.creation_time
                }
            };
            if wins {
                // Replacing `best` drops the previous candidate's lock.
                best = Some(cand);
            }
        }
        best
    }

    fn on_tick(info: &mut ProcInfo) {
        if info.state == Procstate::RUNNING {
            info.sched.total_run_time += 1;
        }
    }

    /// FCFS is non-preemptive: the timer never takes the CPU away.
    fn tick_preempt(_ctx: &CurrentProc<'_>) -> bool {
        false
    }

    fn dump_line(info: &ProcInfo, name: &str, _now: u32, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            w,
            "{} {} {} {}",
            info.pid,
            info.state.as_str(),
            name,
            info.sched.creation_time
        )
    }
}

/// Niceness rewards a process for sleeping: the share of its recent life it
/// spent waiting, scaled to 0..=10. Fresh processes start in the middle.
fn niceness(e: &SchedEntry) -> u32 {
    if e.run_time + e.wait_time == 0 {
        return 5;
    }
    e.wait_time * 10 / (e.run_time + e.wait_time)
}

/// The effective PBS priority: static priority corrected by niceness,
/// clamped to 0..=100. Smaller is better.
pub fn dynamic_priority(e: &SchedEntry) -> u32 {
    let dp = e.priority as i64 - niceness(e) as i64 + 5;
    dp.clamp(0, MAXPRIO as i64) as u32
}

/// Priority-based scheduling with dynamic niceness.
pub struct Pbs;

impl SchedPolicy for Pbs {
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>> {
        let mut best: Option<ProcGuard<'_>> = None;
        for p in procs.pool().iter() {
            let cand = p.lock();
            if cand.state() != Procstate::RUNNABLE {
                continue;
            }
            let wins = match &best {
                None => true,
                Some(b) => {
                    let b_info = b.deref_info();
                    let c_info = cand.deref_info();
                    let b_dp = dynamic_priority(&b_info.sched);
                    let c_dp = dynamic_priority(&c_info.sched);
                    // Ties go to the process dispatched less often, then to
                    // the older one.
                    c_dp < b_dp
                        || (c_dp == b_dp
                            && (c_info.sched.runs < b_info.sched.runs
                                || (c_info.sched.runs == b_info.sched.runs
                                    && c_info.sched.creation_time < b_info.sched.creation_time)))
                }
            };
            if wins {
                best = Some(cand);
            }
        }
        best
    }

    fn on_dispatch(guard: &mut ProcGuard<'_>) {
        let sched = &mut guard.deref_mut_info().sched;
        sched.runs += 1;
        sched.run_time = 0;
        sched.wait_time = 0;
    }

    fn on_tick(info: &mut ProcInfo) {
        match info.state {
            Procstate::RUNNING => {
                info.sched.total_run_time += 1;
                info.sched.run_time += 1;
            }
            Procstate::SLEEPING => {
                info.sched.wait_time += 1;
            }
            _ => {}
        }
    }

    /// PBS runs a process until it blocks or an explicit `set_priority`
    /// improvement yields.
    fn tick_preempt(_ctx: &CurrentProc<'_>) -> bool {
        false
    }

    fn dump_line(info: &ProcInfo, name: &str, now: u32, w: &mut dyn fmt::Write) -> fmt::Result {
        let wait_time = now
            .wrapping_sub(info.sched.creation_time)
            .wrapping_sub(info.sched.total_run_time);
        write!(
            w,
            "{} {} {} {} {} {} {}",
            info.pid,
            dynamic_priority(&info.sched),
            info.state.as_str(),
            name,
            info.sched.total_run_time,
            wait_time,
            info.sched.runs
        )
    }
}

/// Lottery scheduling: a RUNNABLE process wins the draw with probability
/// proportional to its tickets.
pub struct Lottery;

impl SchedPolicy for Lottery {
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>> {
        // Tickets are fixed after allocation; the locks below are for the
        // state checks riding along.
        let mut total: u64 = 0;
        for p in procs.pool().iter() {
            let guard = p.lock();
            if guard.state() == Procstate::RUNNABLE {
                total += guard.deref_info().sched.tickets as u64;
            }
        }
        if total == 0 {
            return None;
        }

        let winning = TargetPlatform::rand_range(total);

        // Walk the table again, accumulating tickets until the draw is
        // covered. A process that stopped being RUNNABLE in between simply
        // voids this round.
        let mut seen: u64 = 0;
        for p in procs.pool().iter() {
            let guard = p.lock();
            if guard.state() != Procstate::RUNNABLE {
                continue;
            }
            seen += guard.deref_info().sched.tickets as u64;
            if seen >= winning {
                return Some(guard);
            }
        }
        None
    }

    fn on_tick(info: &mut ProcInfo) {
        if info.state == Procstate::RUNNING {
            info.sched.total_run_time += 1;
        }
    }

    fn tick_preempt(_ctx: &CurrentProc<'_>) -> bool {
        true
    }

    fn dump_line(info: &ProcInfo, name: &str, _now: u32, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            w,
            "{} {} {} {}",
            info.pid,
            info.state.as_str(),
            name,
            info.sched.tickets
        )
    }
}

/// Multi-level feedback queues with aging.
pub struct Mlfq;

impl Mlfq {
    /// Aging pass: a process that has sat RUNNABLE for `AGINGNUM` ticks is
    /// pulled out of its queue and promoted one level.
    pub(crate) fn age(procs: &Procs, now: u32) {
        for (i, p) in procs.pool().iter().enumerate() {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            if info.state != Procstate::RUNNABLE
                || now.wrapping_sub(info.sched.queue_entry_time) < AGINGNUM
            {
                continue;
            }
            info.sched.queue_entry_time = now;
            if info.sched.in_queue {
                kernel().mlfq(info.sched.level).lock().remove(i);
                info.sched.in_queue = false;
            }
            if info.sched.level > 0 {
                info.sched.level -= 1;
            }
        }
    }

    /// Admission pass: every RUNNABLE process not sitting in a queue is
    /// enqueued at its level.
    pub(crate) fn admit(procs: &Procs) {
        for (i, p) in procs.pool().iter().enumerate() {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            if info.state == Procstate::RUNNABLE && !info.sched.in_queue {
                kernel().mlfq(info.sched.level).lock().push(i);
                info.sched.in_queue = true;
            }
        }
    }

    /// Selection pass: pop the highest non-empty level until a RUNNABLE
    /// process comes up.
    pub(crate) fn select(procs: &Procs, now: u32) -> Option<ProcGuard<'_>> {
        for level in 0..MAXNUM {
            loop {
                let slot = {
                    let mut queue = kernel().mlfq(level).lock();
                    if queue.is_empty() {
                        break;
                    }
                    queue.pop()
                };
                let mut guard = procs.pool()[slot].lock();
                let info = guard.deref_mut_info();
                info.sched.in_queue = false;
                if info.state == Procstate::RUNNABLE {
                    info.sched.queue_entry_time = now;
                    return Some(guard);
                }
            }
        }
        None
    }
}

impl SchedPolicy for Mlfq {
    fn pick(procs: &Procs) -> Option<ProcGuard<'_>> {
        let now = kernel().ticks();
        Self::age(procs, now);
        Self::admit(procs);
        Self::select(procs, now)
    }

    fn on_dispatch(guard: &mut ProcGuard<'_>) {
        let sched = &mut guard.deref_mut_info().sched;
        sched.time_quantum = (sched.level * 2) as i32;
        sched.runs += 1;
    }

    fn on_return(guard: &mut ProcGuard<'_>) {
        guard.deref_mut_info().sched.queue_entry_time = kernel().ticks();
    }

    fn on_tick(info: &mut ProcInfo) {
        if info.state == Procstate::RUNNING {
            info.sched.total_run_time += 1;
            info.sched.queue_run_time[info.sched.level] += 1;
            info.sched.time_quantum -= 1;
        }
    }

    /// Every tick preempts; a spent quantum additionally demotes one level.
    fn tick_preempt(ctx: &CurrentProc<'_>) -> bool {
        let mut guard = ctx.lock();
        let sched = &mut guard.deref_mut_info().sched;
        if sched.time_quantum <= 0 && sched.level < MAXNUM - 1 {
            sched.level += 1;
        }
        true
    }

    fn dump_line(info: &ProcInfo, name: &str, now: u32, w: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            w,
            "{} {} {} {} {} {}",
            info.pid,
            info.sched.level,
            info.state.as_str(),
            name,
            info.sched.total_run_time,
            now.wrapping_sub(info.sched.queue_entry_time),
        )?;
        write!(w, " {}", info.sched.runs)?;
        for level in 0..MAXNUM {
            write!(w, " {}", info.sched.queue_run_time[level])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::proc::Procstate::{RUNNABLE, RUNNING, SLEEPING};

    fn stage_runnable(p: &Proc, creation_time: u32) {
        let mut guard = p.lock();
        let info = guard.deref_mut_info();
        info.state = RUNNABLE;
        info.sched.creation_time = creation_time;
    }

    #[test]
    fn niceness_worked_examples() {
        let mut e = SchedEntry::new();
        e.priority = 60;
        e.run_time = 3;
        e.wait_time = 7;
        assert_eq!(dynamic_priority(&e), 58);

        let mut fresh = SchedEntry::new();
        fresh.priority = 60;
        assert_eq!(dynamic_priority(&fresh), 60);
    }

    #[test]
    fn dynamic_priority_is_clamped() {
        let mut e = SchedEntry::new();
        e.priority = 2;
        e.run_time = 0;
        e.wait_time = 50;
        // niceness 10: 2 - 10 + 5 would go negative.
        assert_eq!(dynamic_priority(&e), 0);

        e.priority = 100;
        e.run_time = 50;
        e.wait_time = 0;
        // niceness 0: 100 + 5 exceeds the bound.
        assert_eq!(dynamic_priority(&e), 100);
    }

    #[test]
    fn fcfs_runs_oldest_to_completion_first() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, pid_a) = alloc_proc(procs);
        let (b, pid_b) = alloc_proc(procs);
        let (c, pid_c) = alloc_proc(procs);
        stage_runnable(a, 10);
        stage_runnable(b, 11);
        stage_runnable(c, 12);

        for expect in [pid_a, pid_b, pid_c] {
            let mut guard = Fcfs::pick(procs).expect("a runnable process is staged");
            assert_eq!(guard.deref_info().pid, expect);
            // Simulate the dispatch; FCFS never preempts, so the process
            // "runs to completion" before the next pick.
            guard.deref_mut_info().state = RUNNING;
        }
        assert!(Fcfs::pick(procs).is_none());
    }

    #[test]
    fn pbs_prefers_lower_dynamic_priority_and_breaks_ties() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, pid_a) = alloc_proc(procs);
        let (b, pid_b) = alloc_proc(procs);
        stage_runnable(a, 5);
        stage_runnable(b, 6);

        // a: dp 58 (60 - 7 + 5), b: fresh dp 60.
        {
            let mut guard = a.lock();
            guard.deref_mut_info().sched.run_time = 3;
            guard.deref_mut_info().sched.wait_time = 7;
        }
        assert_eq!(Pbs::pick(procs).unwrap().deref_info().pid, pid_a);

        // Equal dp: fewer dispatches wins.
        {
            let mut guard = a.lock();
            let sched = &mut guard.deref_mut_info().sched;
            sched.run_time = 0;
            sched.wait_time = 0;
            sched.runs = 2;
        }
        {
            let mut guard = b.lock();
            guard.deref_mut_info().sched.runs = 1;
        }
        assert_eq!(Pbs::pick(procs).unwrap().deref_info().pid, pid_b);

        // Equal dp and runs: the older process wins.
        {
            let mut guard = b.lock();
            guard.deref_mut_info().sched.runs = 2;
        }
        assert_eq!(Pbs::pick(procs).unwrap().deref_info().pid, pid_a);
    }

    #[test]
    fn pbs_dispatch_resets_per_dispatch_counters() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, _) = alloc_proc(procs);
        stage_runnable(a, 0);
        {
            let mut guard = a.lock();
            let sched = &mut guard.deref_mut_info().sched;
            sched.run_time = 4;
            sched.wait_time = 9;
        }

        let mut guard = Pbs::pick(procs).unwrap();
        Pbs::on_dispatch(&mut guard);
        let sched = &guard.deref_info().sched;
        assert_eq!(sched.runs, 1);
        assert_eq!(sched.run_time, 0);
        assert_eq!(sched.wait_time, 0);
    }

    #[test]
    fn lottery_is_proportional_to_tickets() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, pid_a) = alloc_proc(procs);
        let (b, pid_b) = alloc_proc(procs);
        stage_runnable(a, 0);
        stage_runnable(b, 0);
        b.lock().deref_mut_info().sched.tickets = 3;

        TargetPlatform::seed_rng(0x5eed);
        const DRAWS: usize = 10_000;
        let mut b_wins = 0usize;
        for _ in 0..DRAWS {
            let guard = Lottery::pick(procs).unwrap();
            let pid = guard.deref_info().pid;
            if pid == pid_b {
                b_wins += 1;
            } else {
                assert_eq!(pid, pid_a);
            }
        }
        // b holds 3 of 4 tickets: expect 75% of the draws, within 2%.
        let share = b_wins as f64 / DRAWS as f64;
        assert!((0.73..=0.77).contains(&share), "share = {}", share);
    }

    #[test]
    fn lottery_skips_empty_table() {
        let _s = serial();
        let procs = fresh_procs();
        assert!(Lottery::pick(procs).is_none());
    }

    #[test]
    fn mlfq_aging_promotes_starved_process() {
        let _s = serial();
        drain_mlfq();
        let procs = fresh_procs();
        let (q, _) = alloc_proc(procs);
        let now = kernel().ticks();
        let slot = slot_of(procs, q);
        {
            let mut guard = q.lock();
            let info = guard.deref_mut_info();
            info.state = RUNNABLE;
            info.sched.level = 3;
            info.sched.queue_entry_time = now.wrapping_sub(AGINGNUM);
            info.sched.in_queue = true;
        }
        kernel().mlfq(3).lock().push(slot);

        Mlfq::age(procs, now);
        {
            let guard = q.lock();
            let info = guard.deref_info();
            assert_eq!(info.sched.level, 2);
            assert!(!info.sched.in_queue);
            assert_eq!(info.sched.queue_entry_time, now);
        }
        assert!(kernel().mlfq(3).lock().is_empty());

        // The next admission pass re-enqueues it one level up.
        Mlfq::admit(procs);
        assert_eq!(kernel().mlfq(2).lock().front(), Some(slot));
        assert!(q.lock().deref_info().sched.in_queue);
        drain_mlfq();
    }

    #[test]
    fn mlfq_selects_highest_level_and_sets_quantum() {
        let _s = serial();
        drain_mlfq();
        let procs = fresh_procs();
        let (low, _) = alloc_proc(procs);
        let (high, pid_high) = alloc_proc(procs);
        stage_runnable(low, 0);
        stage_runnable(high, 0);
        low.lock().deref_mut_info().sched.level = 2;

        let mut guard = Mlfq::pick(procs).expect("two runnable processes");
        assert_eq!(guard.deref_info().pid, pid_high);
        Mlfq::on_dispatch(&mut guard);
        let sched = &guard.deref_info().sched;
        assert_eq!(sched.time_quantum, 0); // level 0 * 2
        assert_eq!(sched.runs, 1);
        drop(guard);
        drain_mlfq();
    }

    #[test]
    fn mlfq_selection_discards_non_runnable_entries() {
        let _s = serial();
        drain_mlfq();
        let procs = fresh_procs();
        let (asleep, _) = alloc_proc(procs);
        let (ready, pid_ready) = alloc_proc(procs);
        {
            let mut guard = asleep.lock();
            guard.deref_mut_info().state = SLEEPING;
            guard.deref_mut_info().sched.in_queue = true;
        }
        stage_runnable(ready, 0);
        ready.lock().deref_mut_info().sched.in_queue = true;
        kernel().mlfq(0).lock().push(slot_of(procs, asleep));
        kernel().mlfq(0).lock().push(slot_of(procs, ready));

        let guard = Mlfq::select(procs, 0).expect("the second entry is runnable");
        assert_eq!(guard.deref_info().pid, pid_ready);
        assert!(!asleep.lock().deref_info().sched.in_queue);
        drop(guard);
        drain_mlfq();
    }

    #[test]
    fn mlfq_tick_preempt_demotes_on_spent_quantum() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, _) = alloc_proc(procs);
        {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            info.state = RUNNING;
            info.sched.level = 1;
            info.sched.time_quantum = 0;
        }
        let ctx = make_current(p);
        assert!(Mlfq::tick_preempt(&ctx));
        assert_eq!(p.lock().deref_info().sched.level, 2);

        // With quantum left the level stays put.
        p.lock().deref_mut_info().sched.time_quantum = 2;
        assert!(Mlfq::tick_preempt(&ctx));
        assert_eq!(p.lock().deref_info().sched.level, 2);

        // The bottom level is the floor.
        {
            let mut guard = p.lock();
            let info = guard.deref_mut_info();
            info.sched.level = MAXNUM - 1;
            info.sched.time_quantum = 0;
        }
        assert!(Mlfq::tick_preempt(&ctx));
        assert_eq!(p.lock().deref_info().sched.level, MAXNUM - 1);
        clear_current();
    }

    #[test]
    fn per_policy_tick_accounting() {
        let mut info = fresh_info();
        info.state = RUNNING;

        RoundRobin::on_tick(&mut info);
        assert_eq!(info.sched.total_run_time, 1);

        Pbs::on_tick(&mut info);
        assert_eq!(info.sched.total_run_time, 2);
        assert_eq!(info.sched.run_time, 1);

        info.state = SLEEPING;
        Pbs::on_tick(&mut info);
        assert_eq!(info.sched.wait_time, 1);
        assert_eq!(info.sched.total_run_time, 2);

        info.state = RUNNING;
        info.sched.level = 1;
        info.sched.time_quantum = 2;
        Mlfq::on_tick(&mut info);
        assert_eq!(info.sched.queue_run_time[1], 1);
        assert_eq!(info.sched.time_quantum, 1);
        assert_eq!(info.sched.total_run_time, 3);
    }

    #[test]
    fn round_robin_sweeps_the_whole_table() {
        let _s = serial();
        let procs = fresh_procs();
        let (a, pid_a) = alloc_proc(procs);
        let (b, pid_b) = alloc_proc(procs);
        stage_runnable(a, 0);
        stage_runnable(b, 0);

        // Both stay RUNNABLE; the rotor must alternate between them instead
        // of re-picking the first.
        let first = RoundRobin::pick(procs).unwrap().deref_info().pid;
        let second = RoundRobin::pick(procs).unwrap().deref_info().pid;
        let third = RoundRobin::pick(procs).unwrap().deref_info().pid;
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert!([first, second].contains(&pid_a) && [first, second].contains(&pid_b));
        reset_rotor();
    }
}
