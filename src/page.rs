use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use crate::param::PGSIZE;

/// One page of physical memory.
#[repr(C, align(4096))]
pub struct RawPage {
    inner: [u8; PGSIZE],
}

impl RawPage {
    /// Workaround for non-const `Default::default`.
    pub const DEFAULT: Self = Self { inner: [0; PGSIZE] };
}

/// An owned physical page handed out by the platform allocator.
///
/// A `Page` must go back to the allocator; letting one fall out of scope is
/// a kernel bug and panics.
pub struct Page {
    inner: NonNull<RawPage>,
}

// SAFETY: `Page` is the unique owner of its frame.
unsafe impl Send for Page {}

impl Page {
    /// Takes the page apart into its physical address, giving up ownership.
    pub fn into_usize(self) -> usize {
        let addr = self.inner.as_ptr() as usize;
        core::mem::forget(self);
        addr
    }

    /// Rebuilds a page from an address produced by `into_usize`.
    ///
    /// # Safety
    ///
    /// `addr` must uniquely refer to a page-aligned, allocator-owned frame
    /// previously taken apart with `into_usize`.
    pub unsafe fn from_usize(addr: usize) -> Self {
        debug_assert_eq!(addr % PGSIZE, 0);
        Self {
            // SAFETY: safety condition of this method.
            inner: unsafe { NonNull::new_unchecked(addr as *mut RawPage) },
        }
    }

    /// The page's physical address.
    pub fn addr(&self) -> usize {
        self.inner.as_ptr() as usize
    }

    pub fn write_bytes(&mut self, value: u8) {
        self.deref_mut().inner.fill(value);
    }
}

impl Deref for Page {
    type Target = RawPage;

    fn deref(&self) -> &Self::Target {
        // SAFETY: `Page` owns the frame.
        unsafe { self.inner.as_ref() }
    }
}

impl DerefMut for Page {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: `Page` owns the frame exclusively.
        unsafe { self.inner.as_mut() }
    }
}

impl Deref for RawPage {
    type Target = [u8; PGSIZE];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for RawPage {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        panic!("Page must never drop: use the platform allocator");
    }
}
