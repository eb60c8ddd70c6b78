//! Linux Boot Pipeline
//!
//! Chain-loading a Linux kernel from UEFI: reserve conventional memory,
//! place the kernel and initrd at the alignment the bzImage header
//! demands, synthesize the E820 map, build a `boot_params` region that
//! is bit-compatible with the x86 boot protocol, exit Boot Services and
//! jump to the 64-bit entry point.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod bzimage;
pub mod e820;
pub mod error;
pub mod handoff;
pub mod image;
pub mod params;

pub use bzimage::Kernel;
pub use error::BootError;
pub use image::LinuxImage;
pub use params::{BootParams, E820Entry, EfiInfo, ScreenInfo};
