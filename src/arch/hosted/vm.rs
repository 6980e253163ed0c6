//! Simulated user address space: a page-backed flat buffer.

use arrayvec::ArrayVec;

use super::Hosted;
use crate::arch::interface::PageManager;
use crate::error::{KernelError, Result};
use crate::page::Page;
use crate::param::PGSIZE;
use crate::vm::{PteFlags, UserMemoryManager, UVAddr};

/// Largest simulated process image, in pages.
const USER_PAGES: usize = 32;

pub struct UserMemory {
    pages: ArrayVec<Page, USER_PAGES>,
    size: usize,
}

impl UserMemory {
    /// Grows the backing store to cover `newsz` bytes. On failure the newly
    /// grabbed pages are returned to the pool.
    fn grow_to(&mut self, newsz: usize) -> Result<()> {
        if newsz > USER_PAGES * PGSIZE {
            return Err(KernelError::OutOfMemory);
        }
        let had = self.pages.len();
        while self.pages.len() * PGSIZE < newsz {
            match Hosted::alloc_page() {
                Some(mut page) => {
                    page.write_bytes(0);
                    self.pages.push(page);
                }
                None => {
                    while self.pages.len() > had {
                        Hosted::free_page(self.pages.pop().unwrap());
                    }
                    return Err(KernelError::OutOfMemory);
                }
            }
        }
        Ok(())
    }

    /// Splits `[addr, addr + len)` into per-page chunks.
    fn check_range(&self, addr: usize, len: usize) -> Result<()> {
        let end = addr.checked_add(len).ok_or(KernelError::BadAddress)?;
        if end > self.size {
            return Err(KernelError::BadAddress);
        }
        Ok(())
    }
}

impl UserMemoryManager for UserMemory {
    fn new(_trap_frame: usize, initcode: Option<&[u8]>) -> Option<Self> {
        let mut memory = Self {
            pages: ArrayVec::new(),
            size: 0,
        };
        if let Some(code) = initcode {
            assert!(code.len() <= PGSIZE, "initcode larger than a page");
            memory.grow_to(PGSIZE).ok()?;
            memory.size = PGSIZE;
            memory.pages[0][..code.len()].copy_from_slice(code);
        }
        Some(memory)
    }

    fn try_clone(&mut self, _trap_frame: usize) -> Option<Self> {
        let mut clone = Self {
            pages: ArrayVec::new(),
            size: 0,
        };
        for page in self.pages.iter() {
            match Hosted::alloc_page() {
                Some(mut copy) => {
                    copy.copy_from_slice(&page[..]);
                    clone.pages.push(copy);
                }
                None => {
                    clone.free();
                    return None;
                }
            }
        }
        clone.size = self.size;
        Some(clone)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn alloc(&mut self, newsz: usize, _xperm: PteFlags) -> Result<usize> {
        if newsz <= self.size {
            return Ok(self.size);
        }
        self.grow_to(newsz)?;
        self.size = newsz;
        Ok(newsz)
    }

    fn dealloc(&mut self, newsz: usize) -> usize {
        if newsz >= self.size {
            return self.size;
        }
        let keep = (newsz + PGSIZE - 1) / PGSIZE;
        while self.pages.len() > keep {
            Hosted::free_page(self.pages.pop().unwrap());
        }
        self.size = newsz;
        newsz
    }

    fn copy_out_bytes(&mut self, dst: UVAddr, src: &[u8]) -> Result<()> {
        let mut addr = dst.into_usize();
        self.check_range(addr, src.len())?;
        let mut src = src;
        while !src.is_empty() {
            let off = addr % PGSIZE;
            let n = core::cmp::min(PGSIZE - off, src.len());
            self.pages[addr / PGSIZE][off..off + n].copy_from_slice(&src[..n]);
            addr += n;
            src = &src[n..];
        }
        Ok(())
    }

    fn copy_in_bytes(&mut self, dst: &mut [u8], src: UVAddr) -> Result<()> {
        let mut addr = src.into_usize();
        self.check_range(addr, dst.len())?;
        let mut dst = dst;
        while !dst.is_empty() {
            let off = addr % PGSIZE;
            let n = core::cmp::min(PGSIZE - off, dst.len());
            dst[..n].copy_from_slice(&self.pages[addr / PGSIZE][off..off + n]);
            addr += n;
            dst = &mut dst[n..];
        }
        Ok(())
    }

    fn free(mut self) {
        while let Some(page) = self.pages.pop() {
            Hosted::free_page(page);
        }
        self.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_roundtrip_crosses_pages() {
        let _s = crate::proc::test_support::serial();
        let mut memory = UserMemory::new(0, None).unwrap();
        memory.alloc(3 * PGSIZE, PteFlags::W).unwrap();

        let msg = [0xabu8; 100];
        let addr = UVAddr::new(PGSIZE - 50);
        memory.copy_out_bytes(addr, &msg).unwrap();

        let mut back = [0u8; 100];
        memory.copy_in_bytes(&mut back, addr).unwrap();
        assert_eq!(back, msg);
        memory.free();
    }

    #[test]
    fn copy_past_size_is_rejected() {
        let _s = crate::proc::test_support::serial();
        let mut memory = UserMemory::new(0, None).unwrap();
        memory.alloc(PGSIZE, PteFlags::W).unwrap();
        let err = memory.copy_out_bytes(UVAddr::new(PGSIZE - 1), &[1, 2]);
        assert_eq!(err, Err(KernelError::BadAddress));
        memory.free();
    }

    #[test]
    fn clone_duplicates_contents() {
        let _s = crate::proc::test_support::serial();
        let mut memory = UserMemory::new(0, Some(&[1, 2, 3, 4])).unwrap();
        let mut clone = memory.try_clone(0).unwrap();

        let mut word = [0u8; 4];
        clone.copy_in_bytes(&mut word, UVAddr::new(0)).unwrap();
        assert_eq!(word, [1, 2, 3, 4]);
        assert_eq!(clone.size(), memory.size());

        memory.free();
        clone.free();
    }

    #[test]
    fn resize_shrinks_and_grows() {
        let _s = crate::proc::test_support::serial();
        let mut memory = UserMemory::new(0, None).unwrap();
        assert_eq!(memory.resize(2 * PGSIZE as i32).unwrap(), 2 * PGSIZE);
        assert_eq!(memory.resize(-(PGSIZE as i32)).unwrap(), PGSIZE);
        assert_eq!(memory.size(), PGSIZE);
        memory.free();
    }
}
