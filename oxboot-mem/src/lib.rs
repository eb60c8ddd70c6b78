//! Physical Memory Windows and the Boot Heap
//!
//! The loader's runtime lives in its own heap, but firmware hands out
//! physical addresses. This crate provides the two memory primitives the
//! rest of the loader builds on:
//!
//! - [`PhysWindow`](window::PhysWindow): a scoped borrow of a
//!   `(address, length)` range of firmware memory, released on drop.
//!   Two live windows over the same range are rejected.
//! - [`BootHeap`](heap::BootHeap): a `GlobalAlloc` implementation seeded
//!   from a static region and extended with an explicit
//!   [`grow`](heap::BootHeap::grow) operation once firmware memory has
//!   been reserved for it.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod heap;
pub mod window;

pub use heap::BootHeap;
pub use window::{PhysWindow, WindowError};
