//! Process-management system calls.

use crate::error::{KernelError, Result};
use crate::kernel::kernel;
use crate::param::MAXPRIO;
use crate::proc::CurrentProc;
use crate::vm::{UserMemoryManager, UVAddr};

impl CurrentProc<'_> {
    pub fn sys_fork(&mut self) -> Result<usize> {
        kernel().procs().fork(self).map(|pid| pid as usize)
    }

    /// Terminate the current process; status reported to wait(). No return.
    pub fn sys_exit(&mut self) -> Result<usize> {
        let status = self.argint(0)?;
        kernel().procs().exit_current(status, self)
    }

    pub fn sys_wait(&mut self) -> Result<usize> {
        let addr = self.argaddr(0)?;
        kernel()
            .procs()
            .wait(UVAddr::new(addr), self)
            .map(|pid| pid as usize)
    }

    /// wait(), plus the child's run and wait tick totals written to user
    /// pointers.
    pub fn sys_waitx(&mut self) -> Result<usize> {
        let addr = self.argaddr(0)?;
        let run_addr = self.argaddr(1)?;
        let wait_addr = self.argaddr(2)?;
        let (pid, run_time, wait_time) = kernel().procs().waitx(UVAddr::new(addr), self)?;
        self.memory_mut()
            .copy_out(UVAddr::new(run_addr), &run_time)?;
        self.memory_mut()
            .copy_out(UVAddr::new(wait_addr), &wait_time)?;
        Ok(pid as usize)
    }

    pub fn sys_kill(&mut self) -> Result<usize> {
        let pid = self.argint(0)?;
        if pid <= 0 {
            return Err(KernelError::InvalidArgument);
        }
        kernel().procs().kill(pid)?;
        Ok(0)
    }

    pub fn sys_getpid(&mut self) -> Result<usize> {
        Ok(self.pid() as usize)
    }

    pub fn sys_sbrk(&mut self) -> Result<usize> {
        let n = self.argint(0)?;
        let old_size = self.memory().size();
        self.resize(n)?;
        Ok(old_size)
    }

    pub fn sys_uptime(&mut self) -> Result<usize> {
        Ok(kernel().ticks() as usize)
    }

    /// Report syscalls whose mask bit is set on the console, for strace.
    pub fn sys_trace(&mut self) -> Result<usize> {
        let mask = self.argint(0)?;
        self.set_trace_mask(mask as u32);
        Ok(0)
    }

    pub fn sys_sigalarm(&mut self) -> Result<usize> {
        let interval = self.argint(0)?;
        let handler = self.argaddr(1)?;
        if interval < 0 {
            return Err(KernelError::InvalidArgument);
        }
        self.sigalarm(interval as u32, handler);
        Ok(0)
    }

    /// Change a process's static PBS priority; yields when the change made
    /// the target more urgent, so it gets rescheduled at once.
    pub fn sys_set_priority(&mut self) -> Result<usize> {
        let priority = self.argint(0)?;
        let pid = self.argint(1)?;
        let old_addr = self.argaddr(2)?;
        if priority < 0 || priority as u32 > MAXPRIO {
            return Err(KernelError::InvalidArgument);
        }
        let old = kernel()
            .procs()
            .set_priority(pid, priority as u32)
            .ok_or(KernelError::NoSuchProcess)?;
        if old_addr != 0 {
            self.memory_mut().copy_out(UVAddr::new(old_addr), &old)?;
        }
        if old > priority as u32 {
            self.yield_cpu();
        }
        Ok(0)
    }

    pub fn sys_yield(&mut self) -> Result<usize> {
        self.yield_cpu();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::arch::interface::{RegNum, TrapFrameManager};
    use crate::arch::TargetPlatform;
    use crate::param::PGSIZE;
    use crate::proc::test_support::*;
    use crate::syscall::syscall;
    use crate::vm::UserMemoryManager;

    const SYS_GETPID: usize = 11;
    const SYS_SBRK: usize = 12;
    const SYS_TRACE: usize = 22;

    #[test]
    fn getpid_lands_in_the_return_register() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, pid) = alloc_proc(procs);
        let mut ctx = make_current(p);
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R7) = SYS_GETPID;

        syscall(&mut ctx);
        assert_eq!(ctx.trap_frame().param_reg(RegNum::R0), pid as usize);
        clear_current();
    }

    #[test]
    fn sbrk_returns_old_size_and_grows() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, _) = alloc_proc(procs);
        let mut ctx = make_current(p);
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R7) = SYS_SBRK;
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R0) = PGSIZE;

        syscall(&mut ctx);
        assert_eq!(ctx.trap_frame().param_reg(RegNum::R0), PGSIZE);
        assert_eq!(ctx.memory().size(), 2 * PGSIZE);
        clear_current();
    }

    #[test]
    fn traced_syscalls_are_reported() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, pid) = alloc_proc(procs);
        let mut ctx = make_current(p);

        // trace(1 << SYS_GETPID), then getpid.
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R7) = SYS_TRACE;
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R0) = 1 << SYS_GETPID;
        syscall(&mut ctx);

        let _ = TargetPlatform::console_take();
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R7) = SYS_GETPID;
        syscall(&mut ctx);
        let out = TargetPlatform::console_take();
        let expected = std::format!("{}: syscall getpid -> {}", pid, pid);
        assert!(out.contains(&expected), "console: {}", out);
        clear_current();
    }

    #[test]
    fn unknown_syscall_returns_minus_one() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, _) = alloc_proc(procs);
        let mut ctx = make_current(p);
        *ctx.trap_frame_mut().param_reg_mut(RegNum::R7) = 99;

        syscall(&mut ctx);
        assert_eq!(ctx.trap_frame().param_reg(RegNum::R0), usize::MAX);
        clear_current();
    }

    #[test]
    fn alarm_fires_after_its_interval() {
        let _s = serial();
        let procs = fresh_procs();
        let (p, _) = alloc_proc(procs);
        let mut ctx = make_current(p);
        ctx.sigalarm(3, 0x1000);

        assert!(ctx.alarm_tick().is_none());
        assert!(ctx.alarm_tick().is_none());
        let due = ctx.alarm_tick().expect("third tick fires");
        assert_eq!(due.into_usize(), 0x1000);
        // The countdown restarts.
        assert!(ctx.alarm_tick().is_none());
        clear_current();
    }
}
