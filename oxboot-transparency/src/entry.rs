//! Boot Entry Validation
//!
//! A boot entry is the set of artifacts about to be executed, each bound
//! to its SHA-256 hash. Validation proves the set is registered in the
//! transparency log and authorized by policy — and, crucially, that the
//! statement covers these exact bytes: without the artifact-hash binding
//! the log would only prove that *some* artifact set was authorized.

use alloc::vec::Vec;
use core::fmt;

use oxboot_uefi::Volume;

use crate::config::{Config, Status, DIGEST_SIZE};
use crate::engine::{Claims, Engine, EngineError};
use crate::hex;

/// A boot artifact: a category (as defined by the engine's artifact
/// handlers) and the SHA-256 hash of the loaded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub category: u32,
    pub hash: Vec<u8>,
}

/// A boot entry as a set of artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootEntry {
    pub artifacts: Vec<Artifact>,
}

/// Validation outcomes that refuse a boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateError {
    /// The entry carries no artifacts.
    InvalidEntry,
    /// A per-entry configuration file could not be read.
    ConfigMissing(&'static str),
    /// Inclusion proof verification failed.
    ProofInvalid,
    /// The logged claims do not meet the boot policy.
    PolicyNotMet,
    /// An artifact hash is not a SHA-256 digest.
    HashInvalid,
    /// An artifact's hash is not covered by the statement.
    HashMismatch,
    /// Online validation requested without a network transport.
    OnlineUnavailable,
    /// The engine failed outside the proof or policy verdicts.
    Engine(EngineError),
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEntry => write!(f, "invalid boot entry"),
            Self::ConfigMissing(name) => {
                write!(f, "cannot load configuration file {name}")
            }
            Self::ProofInvalid => write!(f, "inclusion proof verification failed"),
            Self::PolicyNotMet => write!(f, "boot bundle is not authorized by policy"),
            Self::HashInvalid => write!(f, "invalid artifact hash"),
            Self::HashMismatch => write!(
                f,
                "loaded boot artifacts do not correspond to the proof bundle ones"
            ),
            Self::OnlineUnavailable => {
                write!(f, "online validation requires a network transport")
            }
            Self::Engine(err) => write!(f, "transparency engine error, {err}"),
        }
    }
}

impl From<EngineError> for ValidateError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl BootEntry {
    /// Apply boot-transparency validation for this entry against the
    /// given configuration.
    ///
    /// When `uefi_root` is present the configuration documents are
    /// loaded from the entry's directory on that volume first. The
    /// engine instance is an explicit dependency; `Online` status is
    /// rejected up front when it has no network transport.
    pub fn validate<E: Engine + ?Sized, V: Volume>(
        &self,
        config: &mut Config,
        engine: &mut E,
        uefi_root: Option<&V>,
    ) -> Result<(), ValidateError> {
        if config.status == Status::None {
            return Ok(());
        }

        if self.artifacts.is_empty() {
            return Err(ValidateError::InvalidEntry);
        }

        if config.status == Status::Online && !engine.supports_online() {
            return Err(ValidateError::OnlineUnavailable);
        }

        if let Some(root) = uefi_root {
            let entry_path = config.path(self)?;
            config.load_from_volume(root, &entry_path)?;
        }

        engine.set_keys(&[config.log_key.as_slice()], &[config.submit_key.as_slice()])?;

        let witness_policy = engine.parse_witness_policy(&config.witness_policy)?;
        engine.set_witness_policy(witness_policy)?;

        let mut bundle = engine.parse_proof_bundle(&config.proof_bundle)?;

        if config.status == Status::Online {
            // probe the log and verify the fresh proof instead of the
            // embedded one
            bundle.proof = engine.get_proof(&bundle)?;
        }

        engine
            .verify_proof(&bundle)
            .map_err(|_| ValidateError::ProofInvalid)?;

        let requirements = engine.parse_requirements(&config.boot_policy)?;
        let claims = engine.parse_statement(&bundle.statement)?;

        self.validate_proof_hashes(engine, &claims)?;

        engine
            .validate_policy(&requirements, &claims)
            .map_err(|_| ValidateError::PolicyNotMet)?;

        Ok(())
    }

    /// Require every artifact hash to be covered by the statement's
    /// claims for its category.
    fn validate_proof_hashes<E: Engine + ?Sized>(
        &self,
        engine: &E,
        claims: &Claims,
    ) -> Result<(), ValidateError> {
        for artifact in &self.artifacts {
            artifact.validate_proof_hash(engine, claims)?;
        }

        Ok(())
    }
}

impl Artifact {
    fn validate_proof_hash<E: Engine + ?Sized>(
        &self,
        engine: &E,
        claims: &Claims,
    ) -> Result<(), ValidateError> {
        if self.hash.len() != DIGEST_SIZE {
            return Err(ValidateError::HashInvalid);
        }

        let file_hash = hex::encode(&self.hash);

        for claimed in &claims.artifacts {
            if claimed.category != self.category {
                continue;
            }

            return match engine.validate_artifact(self.category, &file_hash, &claimed.claims) {
                Ok(()) => Ok(()),
                Err(EngineError::UnknownCategory) => {
                    Err(ValidateError::Engine(EngineError::UnknownCategory))
                }
                Err(_) => Err(ValidateError::HashMismatch),
            };
        }

        // no claims block for this category at all
        Err(ValidateError::HashMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::testdata::{self, MockEngine};
    use alloc::vec;

    fn entry() -> BootEntry {
        BootEntry {
            artifacts: vec![
                Artifact {
                    category: testdata::CATEGORY_KERNEL,
                    hash: testdata::kernel_hash(),
                },
                Artifact {
                    category: testdata::CATEGORY_INITRD,
                    hash: testdata::initrd_hash(),
                },
            ],
        }
    }

    fn offline_config() -> Config {
        let mut config = Config::new(Status::Offline, EngineKind::Sigsum);
        testdata::fill_documents(&mut config);
        config
    }

    #[test]
    fn test_status_none_passes() {
        let mut config = Config::new(Status::None, EngineKind::Sigsum);
        let mut engine = MockEngine::default();

        entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap();

        // the engine is never touched
        assert_eq!(engine.verify_calls, 0);
    }

    #[test]
    fn test_offline_validate() {
        let mut config = offline_config();
        let mut engine = MockEngine::default();

        entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap();

        assert_eq!(engine.verify_calls, 1);
        assert_eq!(engine.get_proof_calls, 0);
    }

    #[test]
    fn test_online_validate_uses_fresh_proof() {
        let mut config = offline_config();
        config.status = Status::Online;

        let mut engine = MockEngine::with_transport();

        entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap();

        assert_eq!(engine.get_proof_calls, 1);
        assert!(engine.verified_fresh);
    }

    #[test]
    fn test_online_without_transport_rejected() {
        let mut config = offline_config();
        config.status = Status::Online;

        let mut engine = MockEngine::default();

        let err = entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::OnlineUnavailable);
        assert_eq!(engine.get_proof_calls, 0);
    }

    #[test]
    fn test_missing_hash_is_invalid() {
        let mut config = offline_config();
        let mut engine = MockEngine::default();

        let mut e = entry();
        e.artifacts[1].hash = Vec::new();

        let err = e
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::HashInvalid);
    }

    #[test]
    fn test_flipped_hash_is_mismatch() {
        let mut config = offline_config();
        let mut engine = MockEngine::default();

        let mut e = entry();
        e.artifacts[0].hash[0] ^= 0x01;

        let err = e
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::HashMismatch);
    }

    #[test]
    fn test_unclaimed_category_is_mismatch() {
        let mut config = offline_config();
        let mut engine = MockEngine::default();

        let mut e = entry();
        e.artifacts.push(Artifact {
            category: 9,
            hash: vec![0xab; 32],
        });

        let err = e
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::HashMismatch);
    }

    #[test]
    fn test_bad_proof_is_invalid() {
        let mut config = offline_config();
        config.proof_bundle = testdata::bundle_with_proof(b"garbage");

        let mut engine = MockEngine::default();

        let err = entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::ProofInvalid);
    }

    #[test]
    fn test_unauthorized_policy() {
        let mut config = offline_config();
        config.boot_policy = b"deny".to_vec();

        let mut engine = MockEngine::default();

        let err = entry()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::PolicyNotMet);
    }

    #[test]
    fn test_empty_entry_rejected() {
        let mut config = offline_config();
        let mut engine = MockEngine::default();

        let err = BootEntry::default()
            .validate(&mut config, &mut engine, testdata::no_volume())
            .unwrap_err();

        assert_eq!(err, ValidateError::InvalidEntry);
    }

    #[test]
    fn test_load_from_uefi_root() {
        let mut config = Config::new(Status::Offline, EngineKind::Sigsum);
        let mut engine = MockEngine::default();

        let volume = testdata::entry_volume(&entry());

        entry()
            .validate(&mut config, &mut engine, Some(&volume))
            .unwrap();

        assert!(!config.proof_bundle.is_empty());
        assert_eq!(engine.verify_calls, 1);
    }
}
