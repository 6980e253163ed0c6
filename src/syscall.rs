//! System call dispatch: argument checking, the numbered table, and the
//! trace surface `strace` consumes.
//!
//! The core owns the process-management calls; the embedding kernel's file
//! layer dispatches its own numbers before falling through to here.

use crate::arch::interface::{RegNum, TrapFrameManager};
use crate::error::{KernelError, Result};
use crate::println;
use crate::proc::CurrentProc;

impl CurrentProc<'_> {
    fn argraw(&self, n: usize) -> usize {
        self.trap_frame().param_reg(RegNum::from(n))
    }

    /// Fetch the nth 32-bit system call argument.
    pub fn argint(&self, n: usize) -> Result<i32> {
        Ok(self.argraw(n) as i32)
    }

    /// Retrieve an argument as a pointer. Legality is not checked here;
    /// copyin/copyout do that.
    pub fn argaddr(&self, n: usize) -> Result<usize> {
        Ok(self.argraw(n))
    }
}

const SYS_FORK: i32 = 1;
const SYS_EXIT: i32 = 2;
const SYS_WAIT: i32 = 3;
const SYS_KILL: i32 = 6;
const SYS_GETPID: i32 = 11;
const SYS_SBRK: i32 = 12;
const SYS_UPTIME: i32 = 14;
const SYS_TRACE: i32 = 22;
const SYS_SIGALARM: i32 = 23;
const SYS_WAITX: i32 = 24;
const SYS_SET_PRIORITY: i32 = 25;
const SYS_YIELD: i32 = 26;

fn name_of(num: i32) -> &'static str {
    match num {
        SYS_FORK => "fork",
        SYS_EXIT => "exit",
        SYS_WAIT => "wait",
        SYS_KILL => "kill",
        SYS_GETPID => "getpid",
        SYS_SBRK => "sbrk",
        SYS_UPTIME => "uptime",
        SYS_TRACE => "trace",
        SYS_SIGALARM => "sigalarm",
        SYS_WAITX => "waitx",
        SYS_SET_PRIORITY => "set_priority",
        SYS_YIELD => "yield",
        _ => "?",
    }
}

fn dispatch(ctx: &mut CurrentProc<'_>, num: i32) -> Result<usize> {
    match num {
        SYS_FORK => ctx.sys_fork(),
        SYS_EXIT => ctx.sys_exit(),
        SYS_WAIT => ctx.sys_wait(),
        SYS_KILL => ctx.sys_kill(),
        SYS_GETPID => ctx.sys_getpid(),
        SYS_SBRK => ctx.sys_sbrk(),
        SYS_UPTIME => ctx.sys_uptime(),
        SYS_TRACE => ctx.sys_trace(),
        SYS_SIGALARM => ctx.sys_sigalarm(),
        SYS_WAITX => ctx.sys_waitx(),
        SYS_SET_PRIORITY => ctx.sys_set_priority(),
        SYS_YIELD => ctx.sys_yield(),
        _ => {
            println!("{} {}: unknown sys call {}", ctx.pid(), ctx.name(), num);
            Err(KernelError::InvalidArgument)
        }
    }
}

/// Handles the system call the trap handler decoded: runs it, reports it
/// when traced, and stores the return value (or -1) in the trap frame.
pub fn syscall(ctx: &mut CurrentProc<'_>) {
    let num = ctx.trap_frame().param_reg(RegNum::R7) as i32;
    let ret = match dispatch(ctx, num) {
        Ok(value) => value,
        Err(_) => usize::MAX,
    };
    if (0..32).contains(&num) && ctx.trace_mask() & (1u32 << num as u32) != 0 {
        println!("{}: syscall {} -> {}", ctx.pid(), name_of(num), ret as isize);
    }
    ctx.trap_frame_mut().set_ret_val(ret);
}
