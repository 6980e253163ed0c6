//! Binding to an embedding riscv kernel.
//!
//! The core consumes the machine through symbols the embedding kernel
//! provides at link time: the context-switch stub (swtch.S), the trampoline
//! page, CSR helpers, the physical-page allocator, the uvm calls, and the
//! file subsystem. Nothing here touches hardware directly.

use core::ffi::c_void;

use bitflags::bitflags;

use super::interface::{
    ConsoleManager, ContextManager, FsManager, InterruptManager, PageManager, Platform,
    ProcManager, RegNum, RngManager, TrapFrameManager, VmManager,
};
use crate::error::{KernelError, Result};
use crate::file::{KernelFile, KernelInode};
use crate::page::Page;
use crate::param::PGSIZE;
use crate::vm::{PteFlags, UserMemoryManager, UVAddr};

/// One beyond the highest possible virtual address (Sv39).
const MAXVA: usize = 1 << (9 + 9 + 9 + 12 - 1);

/// The trampoline page, at the highest user virtual address.
const TRAMPOLINE: usize = MAXVA - PGSIZE;

/// The trap frame page, just below the trampoline.
const TRAPFRAME: usize = TRAMPOLINE - PGSIZE;

bitflags! {
    /// Sv39 page-table entry bits, as the embedding kernel's vm.c takes them.
    struct RawPte: i32 {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
    }
}

impl From<PteFlags> for RawPte {
    fn from(flags: PteFlags) -> Self {
        RawPte::from_bits_truncate(flags.bits() as i32)
    }
}

extern "C" {
    // trampoline.S
    static mut trampoline: [u8; 0];

    // swtch.S
    fn swtch(old: *mut Context, new: *mut Context);

    // trap.c
    fn usertrapret() -> !;

    // riscv.h wrappers
    fn intr_on();
    fn intr_off();
    fn intr_get() -> i32;
    fn cpuid() -> i32;

    // kalloc.c
    fn kalloc() -> *mut u8;
    fn kfree(pa: *mut u8);

    // vm.c
    fn uvmcreate() -> usize;
    fn uvmfirst(pagetable: usize, src: *const u8, sz: usize);
    fn uvmalloc(pagetable: usize, oldsz: usize, newsz: usize, xperm: i32) -> usize;
    fn uvmdealloc(pagetable: usize, oldsz: usize, newsz: usize) -> usize;
    fn uvmcopy(old: usize, new: usize, sz: usize) -> i32;
    fn uvmfree(pagetable: usize, sz: usize);
    fn uvmunmap(pagetable: usize, va: usize, npages: usize, do_free: i32);
    fn mappages(pagetable: usize, va: usize, size: usize, pa: usize, perm: i32) -> i32;
    fn copyout(pagetable: usize, dstva: usize, src: *const u8, len: usize) -> i32;
    fn copyin(pagetable: usize, dst: *mut u8, srcva: usize, len: usize) -> i32;

    // file.c / fs.c / log.c
    fn filedup(f: *mut c_void) -> *mut c_void;
    fn fileclose(f: *mut c_void);
    fn idup(ip: *mut c_void) -> *mut c_void;
    fn iput(ip: *mut c_void);
    fn namei(path: *const u8) -> *mut c_void;
    fn begin_op();
    fn end_op();
    fn fsinit(dev: i32);

    // console.c
    fn consputc(c: i32);

    // rand.c
    fn sgenrand(seed: u64);
    #[allow(dead_code)]
    fn genrand() -> i64;
    fn random_gen(bound: i64) -> i64;
}

pub struct RiscV;

/// Saved registers for kernel context switches.
#[derive(Copy, Clone, Default)]
#[repr(C)]
pub struct Context {
    ra: usize,
    sp: usize,

    // callee-saved
    s0: usize,
    s1: usize,
    s2: usize,
    s3: usize,
    s4: usize,
    s5: usize,
    s6: usize,
    s7: usize,
    s8: usize,
    s9: usize,
    s10: usize,
    s11: usize,
}

impl Context {
    pub const fn new() -> Self {
        Self {
            ra: 0,
            sp: 0,
            s0: 0,
            s1: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
        }
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

/// Per-process data for the trap handling code in trampoline.S, in the
/// layout trampoline.S expects. Sits in a page by itself just under the
/// trampoline page in the user page table.
#[derive(Copy, Clone)]
#[repr(C)]
pub struct TrapFrame {
    /*   0 */ pub kernel_satp: usize,
    /*   8 */ pub kernel_sp: usize,
    /*  16 */ pub kernel_trap: usize,
    /*  24 */ pub epc: usize,
    /*  32 */ pub kernel_hartid: usize,
    /*  40 */ pub ra: usize,
    /*  48 */ pub sp: usize,
    /*  56 */ pub gp: usize,
    /*  64 */ pub tp: usize,
    /*  72 */ pub t0: usize,
    /*  80 */ pub t1: usize,
    /*  88 */ pub t2: usize,
    /*  96 */ pub s0: usize,
    /* 104 */ pub s1: usize,
    /* 112 */ pub a0: usize,
    /* 120 */ pub a1: usize,
    /* 128 */ pub a2: usize,
    /* 136 */ pub a3: usize,
    /* 144 */ pub a4: usize,
    /* 152 */ pub a5: usize,
    /* 160 */ pub a6: usize,
    /* 168 */ pub a7: usize,
    /* 176 */ pub s2: usize,
    /* 184 */ pub s3: usize,
    /* 192 */ pub s4: usize,
    /* 200 */ pub s5: usize,
    /* 208 */ pub s6: usize,
    /* 216 */ pub s7: usize,
    /* 224 */ pub s8: usize,
    /* 232 */ pub s9: usize,
    /* 240 */ pub s10: usize,
    /* 248 */ pub s11: usize,
    /* 256 */ pub t3: usize,
    /* 264 */ pub t4: usize,
    /* 272 */ pub t5: usize,
    /* 280 */ pub t6: usize,
}

impl TrapFrameManager for TrapFrame {
    fn set_pc(&mut self, val: usize) {
        self.epc = val;
    }

    fn set_sp(&mut self, val: usize) {
        self.sp = val;
    }

    fn set_ret_val(&mut self, val: usize) {
        self.a0 = val;
    }

    fn param_reg(&self, index: RegNum) -> usize {
        match index {
            RegNum::R0 => self.a0,
            RegNum::R1 => self.a1,
            RegNum::R2 => self.a2,
            RegNum::R3 => self.a3,
            RegNum::R4 => self.a4,
            RegNum::R5 => self.a5,
            RegNum::R6 => self.a6,
            RegNum::R7 => self.a7,
        }
    }

    fn param_reg_mut(&mut self, index: RegNum) -> &mut usize {
        match index {
            RegNum::R0 => &mut self.a0,
            RegNum::R1 => &mut self.a1,
            RegNum::R2 => &mut self.a2,
            RegNum::R3 => &mut self.a3,
            RegNum::R4 => &mut self.a4,
            RegNum::R5 => &mut self.a5,
            RegNum::R6 => &mut self.a6,
            RegNum::R7 => &mut self.a7,
        }
    }
}

impl InterruptManager for RiscV {
    unsafe fn intr_on() {
        unsafe { intr_on() }
    }

    fn intr_off() {
        unsafe { intr_off() }
    }

    fn intr_get() -> bool {
        unsafe { intr_get() != 0 }
    }
}

impl PageManager for RiscV {
    fn alloc_page() -> Option<Page> {
        let pa = unsafe { kalloc() };
        if pa.is_null() {
            return None;
        }
        // SAFETY: kalloc hands out a unique page-aligned frame.
        Some(unsafe { Page::from_usize(pa as usize) })
    }

    fn free_page(page: Page) {
        unsafe { kfree(page.into_usize() as *mut u8) }
    }
}

/// A process's page table plus its user-memory size, over the embedding
/// kernel's uvm calls. `new` reproduces proc_pagetable: an empty table with
/// the trampoline mapped read/execute at the top of user space and the trap
/// frame just below it.
pub struct UserMemory {
    pagetable: usize,
    size: usize,
}

impl UserMemoryManager for UserMemory {
    fn new(trap_frame: usize, initcode: Option<&[u8]>) -> Option<Self> {
        let pagetable = unsafe { uvmcreate() };
        if pagetable == 0 {
            return None;
        }

        // Map the trampoline code (for system call return) at the highest
        // user virtual address. Only the supervisor uses it, on the way
        // to/from user space, so not PTE_U.
        let tramp = unsafe { trampoline.as_ptr() as usize };
        if unsafe {
            mappages(
                pagetable,
                TRAMPOLINE,
                PGSIZE,
                tramp,
                (RawPte::R | RawPte::X).bits(),
            )
        } < 0
        {
            unsafe { uvmfree(pagetable, 0) };
            return None;
        }

        // Map the trap frame page just below the trampoline page.
        if unsafe {
            mappages(
                pagetable,
                TRAPFRAME,
                PGSIZE,
                trap_frame,
                (RawPte::R | RawPte::W).bits(),
            )
        } < 0
        {
            unsafe {
                uvmunmap(pagetable, TRAMPOLINE, 1, 0);
                uvmfree(pagetable, 0);
            }
            return None;
        }

        let mut memory = Self { pagetable, size: 0 };
        if let Some(code) = initcode {
            assert!(code.len() <= PGSIZE, "initcode larger than a page");
            unsafe { uvmfirst(pagetable, code.as_ptr(), code.len()) };
            memory.size = PGSIZE;
        }
        Some(memory)
    }

    fn try_clone(&mut self, trap_frame: usize) -> Option<Self> {
        let mut clone = Self::new(trap_frame, None)?;
        if unsafe { uvmcopy(self.pagetable, clone.pagetable, self.size) } < 0 {
            clone.free();
            return None;
        }
        clone.size = self.size;
        Some(clone)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn alloc(&mut self, newsz: usize, xperm: PteFlags) -> Result<usize> {
        if newsz <= self.size {
            return Ok(self.size);
        }
        let sz = unsafe { uvmalloc(self.pagetable, self.size, newsz, RawPte::from(xperm).bits()) };
        if sz == 0 {
            return Err(KernelError::OutOfMemory);
        }
        self.size = sz;
        Ok(sz)
    }

    fn dealloc(&mut self, newsz: usize) -> usize {
        if newsz >= self.size {
            return self.size;
        }
        self.size = unsafe { uvmdealloc(self.pagetable, self.size, newsz) };
        self.size
    }

    fn copy_out_bytes(&mut self, dst: UVAddr, src: &[u8]) -> Result<()> {
        if unsafe { copyout(self.pagetable, dst.into_usize(), src.as_ptr(), src.len()) } < 0 {
            return Err(KernelError::BadAddress);
        }
        Ok(())
    }

    fn copy_in_bytes(&mut self, dst: &mut [u8], src: UVAddr) -> Result<()> {
        if unsafe { copyin(self.pagetable, dst.as_mut_ptr(), src.into_usize(), dst.len()) } < 0 {
            return Err(KernelError::BadAddress);
        }
        Ok(())
    }

    fn free(self) {
        unsafe {
            uvmunmap(self.pagetable, TRAMPOLINE, 1, 0);
            uvmunmap(self.pagetable, TRAPFRAME, 1, 0);
            uvmfree(self.pagetable, self.size);
        }
    }
}

impl VmManager for RiscV {
    type UserMemory = UserMemory;
}

/// An open file of the embedding kernel's file table.
pub struct FileHandle(*mut c_void);

pub struct InodeHandle(*mut c_void);

impl KernelFile for FileHandle {
    fn dup(&self) -> Self {
        FileHandle(unsafe { filedup(self.0) })
    }

    fn close(self) {
        unsafe { fileclose(self.0) }
    }
}

impl KernelInode for InodeHandle {
    fn dup(&self) -> Self {
        InodeHandle(unsafe { idup(self.0) })
    }

    fn put(self) {
        unsafe { iput(self.0) }
    }
}

impl FsManager for RiscV {
    type File = FileHandle;
    type Inode = InodeHandle;

    fn fsinit(dev: u32) {
        unsafe { fsinit(dev as i32) }
    }

    fn root_inode() -> Self::Inode {
        InodeHandle(unsafe { namei(b"/\0".as_ptr()) })
    }

    fn begin_op() {
        unsafe { begin_op() }
    }

    fn end_op() {
        unsafe { end_op() }
    }
}

impl ConsoleManager for RiscV {
    fn console_putc(c: u8) {
        unsafe { consputc(c as i32) }
    }
}

impl RngManager for RiscV {
    fn seed_rng(seed: u64) {
        unsafe { sgenrand(seed) }
    }

    fn rand_range(bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        unsafe { random_gen(bound as i64) as u64 }
    }
}

/// A user program that calls exec("/init").
/// od -t xC user/initcode
const INITCODE: [u8; 52] = [
    0x17, 0x05, 0x00, 0x00, 0x13, 0x05, 0x45, 0x02, 0x97, 0x05, 0x00, 0x00, 0x93, 0x85, 0x35, 0x02,
    0x93, 0x08, 0x70, 0x00, 0x73, 0x00, 0x00, 0x00, 0x93, 0x08, 0x20, 0x00, 0x73, 0x00, 0x00, 0x00,
    0xef, 0xf0, 0x9f, 0xff, 0x2f, 0x69, 0x6e, 0x69, 0x74, 0x00, 0x00, 0x24, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

impl ProcManager for RiscV {
    type TrapFrame = TrapFrame;
    type Context = Context;

    fn init_code() -> &'static [u8] {
        &INITCODE
    }

    unsafe fn context_switch(old: *mut Context, new: *mut Context) {
        unsafe { swtch(old, new) }
    }

    unsafe fn user_trap_ret() -> ! {
        unsafe { usertrapret() }
    }
}

impl Platform for RiscV {
    fn cpu_id() -> usize {
        unsafe { cpuid() as usize }
    }

    /// Kernel stacks grow down from just below the trampoline, one guard
    /// page apart.
    fn kstack(i: usize) -> usize {
        TRAMPOLINE - (i + 1) * 2 * PGSIZE
    }
}
