//! Kernel error taxonomy.
//!
//! Recoverable conditions are reported to the caller and flattened to the
//! -1 return convention at the syscall boundary; violated invariants panic
//! instead (they indicate kernel bugs, not runtime conditions).

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// No UNUSED slot in the process table.
    OutOfProcs,
    /// Physical page or mapping allocation failed.
    OutOfMemory,
    /// The calling process has no children to wait for.
    NoChild,
    /// The calling process has been killed.
    Killed,
    /// A user address failed validation during copy in/out.
    BadAddress,
    /// A syscall argument is out of range.
    InvalidArgument,
    /// No process has the given pid.
    NoSuchProcess,
}

pub type Result<T> = core::result::Result<T, KernelError>;
