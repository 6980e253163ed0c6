//! Platform binding.
//!
//! On a bare-metal riscv build the core binds to the embedding kernel's
//! symbols; everywhere else it binds to the hosted software platform, which
//! is also what the unit tests run against.

pub mod interface;

use self::interface::{FsManager, ProcManager, VmManager};

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "riscv64", target_os = "none"))] {
        mod riscv;
        pub use riscv::RiscV as TargetPlatform;
    } else {
        mod hosted;
        pub use hosted::Hosted as TargetPlatform;
    }
}

pub type Context = <TargetPlatform as ProcManager>::Context;
pub type TrapFrame = <TargetPlatform as ProcManager>::TrapFrame;
pub type UserMemory = <TargetPlatform as VmManager>::UserMemory;
pub type File = <TargetPlatform as FsManager>::File;
pub type Inode = <TargetPlatform as FsManager>::Inode;
