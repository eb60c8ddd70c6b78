//! Boot-Transparency Validation
//!
//! Every bootable artifact set is registered in a verifiable log; the
//! loader refuses to boot unless an inclusion proof plus policy check
//! succeed for the exact bytes about to run. The log and signature
//! machinery lives in an external engine, passed in explicitly through
//! the [`Engine`] trait; this crate owns configuration loading, the
//! artifact-hash binding, and the validation algorithm.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod engine;
pub mod entry;
pub mod hex;

#[cfg(test)]
mod testdata;

pub use config::{Config, EngineKind, Status};
pub use engine::{Claims, ClaimedArtifact, Engine, EngineError, ProofBundle, Requirements, WitnessPolicy};
pub use entry::{Artifact, BootEntry, ValidateError};

use alloc::string::String;
use sha2::{Digest, Sha256};

/// Hash artifact data with SHA-256, the algorithm the transparency log
/// commits to. Returns the digest as a hex string.
#[must_use]
pub fn hash(data: &[u8]) -> String {
    hex::encode(&Sha256::digest(data))
}

/// SHA-256 digest of artifact data, raw form.
#[must_use]
pub fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}
