//! The hosted software platform.
//!
//! Binds the core to nothing but the build host: pages come from a static
//! pool, user memory is a plain buffer, the console is a ring buffer, and
//! the PRNG is a seeded xorshift. This is the platform the unit tests run
//! against. What a host cannot do — switch kernel contexts, return to user
//! space — panics if reached.

mod console;
mod vm;

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use arrayvec::ArrayVec;
use spin::{Mutex, Once};

use super::interface::{
    ConsoleManager, ContextManager, FsManager, InterruptManager, PageManager, Platform,
    ProcManager, RegNum, RngManager, TrapFrameManager, VmManager,
};
use crate::file::{KernelFile, KernelInode};
use crate::page::{Page, RawPage};
use crate::param::PGSIZE;

pub struct Hosted;

/// Saved registers for kernel context switches.
#[derive(Copy, Clone, Default)]
pub struct Context {
    ra: usize,
    sp: usize,
}

impl Context {
    pub const fn new() -> Self {
        Self { ra: 0, sp: 0 }
    }
}

impl ContextManager for Context {
    fn new() -> Self {
        Context::new()
    }

    fn set_ret_addr(&mut self, val: usize) {
        self.ra = val;
    }

    fn set_sp(&mut self, val: usize) {
        self.sp = val;
    }
}

/// Saved user registers, reduced to what the core reads and writes.
#[derive(Copy, Clone)]
pub struct TrapFrame {
    pc: usize,
    sp: usize,
    regs: [usize; 8],
}

impl TrapFrameManager for TrapFrame {
    fn set_pc(&mut self, val: usize) {
        self.pc = val;
    }

    fn set_sp(&mut self, val: usize) {
        self.sp = val;
    }

    fn set_ret_val(&mut self, val: usize) {
        self.regs[0] = val;
    }

    fn param_reg(&self, index: RegNum) -> usize {
        self.regs[index as usize]
    }

    fn param_reg_mut(&mut self, index: RegNum) -> &mut usize {
        &mut self.regs[index as usize]
    }
}

/// Whether simulated device interrupts are enabled.
static INTR_ON: AtomicBool = AtomicBool::new(false);

impl InterruptManager for Hosted {
    unsafe fn intr_on() {
        INTR_ON.store(true, Ordering::SeqCst);
    }

    fn intr_off() {
        INTR_ON.store(false, Ordering::SeqCst);
    }

    fn intr_get() -> bool {
        INTR_ON.load(Ordering::SeqCst)
    }
}

const POOL_PAGES: usize = 512;

struct PoolStorage(UnsafeCell<[RawPage; POOL_PAGES]>);

// SAFETY: frames are only reached through owning `Page` handles.
unsafe impl Sync for PoolStorage {}

static STORAGE: PoolStorage = PoolStorage(UnsafeCell::new([RawPage::DEFAULT; POOL_PAGES]));
static FREE_LIST: Mutex<ArrayVec<usize, POOL_PAGES>> = Mutex::new(ArrayVec::new_const());
static POOL_PRIMED: Once<()> = Once::new();

fn pool_base() -> usize {
    STORAGE.0.get() as usize
}

fn prime_pool() {
    POOL_PRIMED.call_once(|| {
        let mut free = FREE_LIST.lock();
        for i in 0..POOL_PAGES {
            free.push(i);
        }
    });
}

impl PageManager for Hosted {
    fn alloc_page() -> Option<Page> {
        prime_pool();
        let i = FREE_LIST.lock().pop()?;
        // SAFETY: `i` was on the free list, so the frame is unowned.
        let mut page = unsafe { Page::from_usize(pool_base() + i * PGSIZE) };
        // Fill with junk.
        page.write_bytes(5);
        Some(page)
    }

    fn free_page(page: Page) {
        let addr = page.into_usize();
        assert!(
            addr >= pool_base() && addr < pool_base() + POOL_PAGES * PGSIZE,
            "free_page: not a pool frame"
        );
        let mut free = FREE_LIST.lock();
        free.push((addr - pool_base()) / PGSIZE);
    }
}

impl VmManager for Hosted {
    type UserMemory = vm::UserMemory;
}

/// Hosted open-file handle; the reference counting it mirrors lives in a
/// real file table.
#[derive(Clone, Copy)]
pub struct FileHandle;

#[derive(Clone, Copy)]
pub struct InodeHandle;

impl KernelFile for FileHandle {
    fn dup(&self) -> Self {
        FileHandle
    }

    fn close(self) {}
}

impl KernelInode for InodeHandle {
    fn dup(&self) -> Self {
        InodeHandle
    }

    fn put(self) {}
}

impl FsManager for Hosted {
    type File = FileHandle;
    type Inode = InodeHandle;

    fn fsinit(_dev: u32) {}

    fn root_inode() -> Self::Inode {
        InodeHandle
    }

    fn begin_op() {}

    fn end_op() {}
}

impl ConsoleManager for Hosted {
    fn console_putc(c: u8) {
        console::CONSOLE.lock().push(c);
    }
}

static RNG: Mutex<u64> = Mutex::new(0x853c_49e6_748f_ea9b);

impl RngManager for Hosted {
    fn seed_rng(seed: u64) {
        *RNG.lock() = if seed == 0 { 0x853c_49e6_748f_ea9b } else { seed };
    }

    fn rand_range(bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        let mut state = RNG.lock();
        // xorshift64*.
        let mut x = *state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        *state = x;
        let r = x.wrapping_mul(0x2545_f491_4f6c_dd1d);
        (r >> 32) % bound + 1
    }
}

impl ProcManager for Hosted {
    type TrapFrame = TrapFrame;
    type Context = Context;

    fn init_code() -> &'static [u8] {
        // Stand-in for the assembled user/initcode; a single ecall.
        &[0x73, 0x00, 0x00, 0x00]
    }

    unsafe fn context_switch(_old: *mut Context, _new: *mut Context) {
        panic!("context switch is not available on the hosted platform");
    }

    unsafe fn user_trap_ret() -> ! {
        panic!("the hosted platform has no user space to return to");
    }
}

impl Platform for Hosted {
    fn cpu_id() -> usize {
        0
    }

    fn kstack(i: usize) -> usize {
        0x4000_0000 + i * 2 * PGSIZE
    }
}

#[cfg(test)]
impl Hosted {
    /// Drains the simulated console for inspection.
    pub fn console_take() -> std::string::String {
        console::CONSOLE.lock().take()
    }

    pub fn free_page_count() -> usize {
        prime_pool();
        FREE_LIST.lock().len()
    }
}
