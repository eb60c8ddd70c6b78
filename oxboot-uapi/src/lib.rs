//! Boot Loader Entries
//!
//! Parsing for Type #1 Boot Loader Entries following the specifications
//! at:
//!
//! <https://uapi-group.org/specifications/specs/boot_loader_specification>
//!
//! Each entry keyfile names a kernel, any number of initrds and the
//! kernel command line; the referenced blobs are loaded from the same
//! volume as the entry.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod entry;

pub use entry::{load_entry, Entry, EntryError};
