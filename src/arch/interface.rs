//! The boundary the core consumes from the rest of the kernel.
//!
//! One type per build target implements [`Platform`]; the core reaches it
//! only through the [`TargetPlatform`](super::TargetPlatform) alias, so no
//! generics leak into the process machinery.

use crate::file::{KernelFile, KernelInode};
use crate::page::Page;
use crate::vm::UserMemoryManager;

/// Index of a trap-frame argument register (a0..a7 on riscv).
#[derive(Copy, Clone, Debug)]
pub enum RegNum {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl From<usize> for RegNum {
    fn from(item: usize) -> Self {
        match item {
            0 => Self::R0,
            1 => Self::R1,
            2 => Self::R2,
            3 => Self::R3,
            4 => Self::R4,
            5 => Self::R5,
            6 => Self::R6,
            7 => Self::R7,
            _ => panic!("register index out of range"),
        }
    }
}

/// The saved user-mode register set at kernel entry.
pub trait TrapFrameManager: Copy {
    /// Set the saved user program counter.
    fn set_pc(&mut self, val: usize);

    /// Set the saved user stack pointer.
    fn set_sp(&mut self, val: usize);

    /// Set the value of the return-value register.
    fn set_ret_val(&mut self, val: usize);

    /// Get the value of a function-argument register.
    fn param_reg(&self, index: RegNum) -> usize;

    /// Get a mutable reference to a function-argument register.
    fn param_reg_mut(&mut self, index: RegNum) -> &mut usize;
}

/// The callee-saved register set of a kernel context switch.
pub trait ContextManager: Copy + Default {
    fn new() -> Self;

    /// Set the return address the switch resumes at.
    fn set_ret_addr(&mut self, val: usize);

    /// Set the kernel stack pointer.
    fn set_sp(&mut self, val: usize);
}

/// Process execution machinery: trap frames, contexts, the switch itself.
pub trait ProcManager {
    type TrapFrame: TrapFrameManager;
    type Context: ContextManager;

    /// Binary of the user program that calls exec("/init").
    fn init_code() -> &'static [u8];

    /// Saves the current context into `old` and resumes `new`. Returns when
    /// something switches back into `old`.
    ///
    /// # Safety
    ///
    /// Both contexts must stay valid for the whole round trip, and the
    /// caller must hold exactly the locks the scheduler protocol expects.
    unsafe fn context_switch(old: *mut Self::Context, new: *mut Self::Context);

    /// Returns to user space through the trap machinery. Never returns.
    ///
    /// # Safety
    ///
    /// Must be called on a CPU whose current process is fully set up.
    unsafe fn user_trap_ret() -> !;
}

/// Device-interrupt control.
pub trait InterruptManager {
    /// Enable device interrupts.
    ///
    /// # Safety
    ///
    /// Interrupt handlers must have been configured.
    unsafe fn intr_on();

    /// Disable device interrupts.
    fn intr_off();

    /// Whether device interrupts are enabled.
    fn intr_get() -> bool;
}

/// The physical-page allocator.
pub trait PageManager {
    /// Allocates one page, or `None` when memory is exhausted.
    fn alloc_page() -> Option<Page>;

    /// Returns a page to the allocator.
    fn free_page(page: Page);
}

/// The user virtual-memory subsystem.
pub trait VmManager {
    type UserMemory: UserMemoryManager;
}

/// The file subsystem.
pub trait FsManager {
    type File: KernelFile;
    type Inode: KernelInode;

    /// One-time file-system initialization; runs in the first process.
    fn fsinit(dev: u32);

    /// The root directory, for a first process's cwd.
    fn root_inode() -> Self::Inode;

    /// Begin a file-system operation (transaction).
    fn begin_op();

    /// End a file-system operation.
    fn end_op();
}

/// Console byte output.
pub trait ConsoleManager {
    fn console_putc(c: u8);
}

/// The kernel PRNG the lottery policy draws from.
pub trait RngManager {
    fn seed_rng(seed: u64);

    /// A draw in `[1, bound]`; 0 when `bound` is 0.
    fn rand_range(bound: u64) -> u64;
}

/// Everything the core consumes, as one bound.
pub trait Platform:
    ProcManager
    + InterruptManager
    + PageManager
    + VmManager
    + FsManager
    + ConsoleManager
    + RngManager
{
    /// Which hart (core) is this?
    fn cpu_id() -> usize;

    /// Virtual address of process `i`'s kernel stack.
    fn kstack(i: usize) -> usize;
}
