//! The process management and scheduling core of the mv6 teaching kernel.
//!
//! This crate owns the process table and the lifecycle of kernel-managed
//! processes (creation, fork, exit, reaping), puts one runnable process on
//! each CPU through a build-time-selected scheduling policy, and provides
//! the sleep/wakeup/kill rendezvous the rest of the kernel coordinates with.
//!
//! Everything below the core — physical pages, user address spaces, files,
//! the console, the context-switch stub, returning to user space — is
//! reached through the trait family in [`arch::interface`]. The embedding
//! kernel implements those traits for its machine; on a hosted build the
//! crate binds to a software platform so the core's logic can run (and be
//! tested) on the build host.
//!
//! Boot protocol for an embedder:
//!  1. `kernel().init()` once, before anything else.
//!  2. `kernel().procs().user_proc_init()` once, to create the init process.
//!  3. `kernel().scheduler()` on every CPU; it does not return.
//!  4. From the timer interrupt: `kernel().clock_intr()` on one CPU, and
//!     [`timer_yield`] on whichever CPU runs a user process.
//!  5. From the syscall trap: [`syscall`].

#![no_std]
#![warn(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

mod cpu;
mod error;
mod kernel;
mod page;
mod proc;
mod syscall;
mod sysproc;

pub mod lock;

pub mod arch;
pub mod file;
pub mod param;
pub mod printf;
pub mod vm;

pub use cpu::{cpuid, Cpu, CpuMut, Cpus, HeldInterrupts};
pub use error::{KernelError, Result};
pub use kernel::{kernel, Kernel};
pub use page::{Page, RawPage};
pub use proc::{
    myproc, timer_yield, CurrentProc, Fcfs, Lottery, Mlfq, Pbs, Pid, Proc, ProcData, ProcGuard,
    ProcInfo, Procs, Procstate, ReadyQueue, RoundRobin, SchedEntry, SchedPolicy, TargetPolicy,
    WaitChannel,
};
pub use syscall::syscall;
