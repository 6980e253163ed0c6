//! The user virtual-memory boundary.
//!
//! The core never walks page tables itself: each process owns a
//! [`UserMemoryManager`] provided by the platform, which maps the uvm
//! calls of the embedding kernel (create/first/alloc/dealloc/copy/free,
//! copyin/copyout) behind an owning type.

use bitflags::bitflags;
use zerocopy::{AsBytes, FromBytes};

use crate::error::{KernelError, Result};

bitflags! {
    /// Page-table entry permissions, in the riscv Sv39 encoding.
    pub struct PteFlags: usize {
        /// valid
        const V = 1 << 0;
        /// readable
        const R = 1 << 1;
        /// writable
        const W = 1 << 2;
        /// executable
        const X = 1 << 3;
        /// user-accessible
        const U = 1 << 4;
    }
}

/// A user virtual address.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct UVAddr(usize);

impl UVAddr {
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    pub const fn into_usize(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A process's user address space: page table plus its size in bytes.
///
/// Dropping one without calling `free` leaks (or panics over) its frames;
/// the process teardown path always frees explicitly.
pub trait UserMemoryManager: Sized {
    /// Builds an address space with the trampoline and the given trap frame
    /// mapped, and, when `initcode` is given, one user page holding it.
    /// Returns `None` if a page or a mapping cannot be allocated; partial
    /// work has been undone.
    fn new(trap_frame: usize, initcode: Option<&[u8]>) -> Option<Self>;

    /// Duplicates the whole address space for a fork child whose trap frame
    /// page is `trap_frame`. Returns `None` on allocation failure.
    fn try_clone(&mut self, trap_frame: usize) -> Option<Self>;

    /// User-memory size in bytes.
    fn size(&self) -> usize;

    /// Grows the space to `newsz` bytes with permissions `xperm`.
    /// Returns the new size.
    fn alloc(&mut self, newsz: usize, xperm: PteFlags) -> Result<usize>;

    /// Shrinks the space to `newsz` bytes. Returns the new size.
    fn dealloc(&mut self, newsz: usize) -> usize;

    /// Copies `src` into user space at `dst`.
    fn copy_out_bytes(&mut self, dst: UVAddr, src: &[u8]) -> Result<()>;

    /// Copies user bytes at `src` into `dst`.
    fn copy_in_bytes(&mut self, dst: &mut [u8], src: UVAddr) -> Result<()>;

    /// Releases every frame of the address space.
    fn free(self);

    /// Grows or shrinks the space by `n` bytes. Returns the new size.
    fn resize(&mut self, n: i32) -> Result<usize> {
        let size = self.size();
        if n >= 0 {
            self.alloc(size + n as usize, PteFlags::W)
        } else {
            let shrink = -(n as isize) as usize;
            if shrink > size {
                return Err(KernelError::BadAddress);
            }
            Ok(self.dealloc(size - shrink))
        }
    }

    /// Typed copy to a user address.
    fn copy_out<T: AsBytes + FromBytes>(&mut self, dst: UVAddr, src: &T) -> Result<()> {
        self.copy_out_bytes(dst, src.as_bytes())
    }

    /// Typed copy from a user address.
    fn copy_in<T: AsBytes + FromBytes>(&mut self, dst: &mut T, src: UVAddr) -> Result<()> {
        self.copy_in_bytes(dst.as_bytes_mut(), src)
    }
}
