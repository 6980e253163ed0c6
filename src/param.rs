use static_assertions::const_assert;

/// Maximum number of processes.
pub const NPROC: usize = 64;

/// Maximum number of CPUs.
pub const NCPU: usize = 8;

/// Open files per process.
pub const NOFILE: usize = 16;

/// Device number of file system root disk.
pub const ROOTDEV: u32 = 1;

/// Maximum length of process name.
pub const MAXPROCNAME: usize = 16;

/// Bytes per page.
pub const PGSIZE: usize = 4096;

/// Number of MLFQ priority levels. Level 0 is the highest.
pub const MAXNUM: usize = 5;

/// Ticks a RUNNABLE process may starve before MLFQ promotes it one level.
pub const AGINGNUM: u32 = 30;

/// Static PBS priority assigned at allocation.
pub const DEFAULTPRIO: u32 = 60;

/// Highest (numerically largest) static PBS priority.
pub const MAXPRIO: u32 = 100;

/// Lottery tickets assigned at allocation and inherited by fork.
pub const DEFAULTTICKETS: u32 = 1;

const_assert!(NPROC >= 1);
const_assert!(MAXNUM >= 1);
const_assert!(DEFAULTPRIO <= MAXPRIO);
