//! Shared test fixtures: a mock engine, in-memory volumes and the
//! reference artifact hashes.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use oxboot_uefi::{Error as UefiError, Volume};

use crate::config::{
    Config, BOOT_POLICY_FILE, LOG_KEY_FILE, PROOF_BUNDLE_FILE, SUBMIT_KEY_FILE,
    WITNESS_POLICY_FILE,
};
use crate::engine::{
    ClaimedArtifact, Claims, Engine, EngineError, ProofBundle, Requirements, WitnessPolicy,
};
use crate::entry::BootEntry;
use crate::hex;

pub const CATEGORY_KERNEL: u32 = 1;
pub const CATEGORY_INITRD: u32 = 2;

pub const KERNEL_HASH: &str = "4551848b4ab43cb4321c4d6ba98e1d215f950cee21bfd82c8c82ab64e34ec9a6";
pub const INITRD_HASH: &str = "337630b74e55eae241f460faadf5a2f9a2157d6de2853d4106c35769e4acf538";

const EMBEDDED_PROOF: &[u8] = b"valid";
const FRESH_PROOF: &[u8] = b"fresh";

pub fn kernel_hash() -> Vec<u8> {
    hex::decode(KERNEL_HASH).unwrap()
}

pub fn initrd_hash() -> Vec<u8> {
    hex::decode(INITRD_HASH).unwrap()
}

/// A statement covering the reference kernel and initrd, one
/// `category:file_hash` claim per line.
pub fn statement() -> Vec<u8> {
    format!("{CATEGORY_KERNEL}:{KERNEL_HASH}\n{CATEGORY_INITRD}:{INITRD_HASH}").into_bytes()
}

/// A bundle document: statement and proof separated by `|`.
pub fn bundle_with_proof(proof: &[u8]) -> Vec<u8> {
    let mut doc = statement();
    doc.push(b'|');
    doc.extend_from_slice(proof);
    doc
}

pub fn fill_documents(config: &mut Config) {
    config.boot_policy = b"allow".to_vec();
    config.witness_policy = b"witness".to_vec();
    config.submit_key = b"submit-key".to_vec();
    config.log_key = b"log-key".to_vec();
    config.proof_bundle = bundle_with_proof(EMBEDDED_PROOF);
}

/// The `uefi_root` argument for tests that provide documents directly.
pub fn no_volume() -> Option<&'static MapVolume> {
    None
}

/// An in-memory volume.
pub struct MapVolume(pub Vec<(String, Vec<u8>)>);

impl Volume for MapVolume {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, UefiError> {
        self.0
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| data.clone())
            .ok_or(UefiError::NotFound)
    }
}

/// A volume holding placeholder configuration documents under `prefix`.
pub fn config_volume(prefix: &str) -> MapVolume {
    MapVolume(
        [
            (BOOT_POLICY_FILE, b"policy".to_vec()),
            (WITNESS_POLICY_FILE, b"witness".to_vec()),
            (PROOF_BUNDLE_FILE, b"bundle".to_vec()),
            (SUBMIT_KEY_FILE, b"submit".to_vec()),
            (LOG_KEY_FILE, b"log".to_vec()),
        ]
        .into_iter()
        .map(|(name, data)| (format!("{prefix}/{name}"), data))
        .collect(),
    )
}

/// A volume holding a complete, valid configuration for `entry` at its
/// derived path.
pub fn entry_volume(entry: &BootEntry) -> MapVolume {
    let config = Config::default();
    let prefix = config.path(entry).unwrap();

    MapVolume(
        [
            (BOOT_POLICY_FILE, b"allow".to_vec()),
            (WITNESS_POLICY_FILE, b"witness".to_vec()),
            (PROOF_BUNDLE_FILE, bundle_with_proof(EMBEDDED_PROOF)),
            (SUBMIT_KEY_FILE, b"submit-key".to_vec()),
            (LOG_KEY_FILE, b"log-key".to_vec()),
        ]
        .into_iter()
        .map(|(name, data)| (format!("{prefix}/{name}"), data))
        .collect(),
    )
}

/// An engine double that treats the bundle format produced by
/// [`bundle_with_proof`] as its wire format.
#[derive(Default)]
pub struct MockEngine {
    transport: bool,

    pub keys_set: bool,
    pub witness_policy: Vec<u8>,
    pub verify_calls: usize,
    pub verified_fresh: bool,
    pub get_proof_calls: usize,
}

impl MockEngine {
    pub fn with_transport() -> Self {
        Self {
            transport: true,
            ..Self::default()
        }
    }
}

impl Engine for MockEngine {
    fn set_keys(&mut self, log_keys: &[&[u8]], submit_keys: &[&[u8]]) -> Result<(), EngineError> {
        if log_keys.iter().any(|k| k.is_empty()) || submit_keys.iter().any(|k| k.is_empty()) {
            return Err(EngineError::InvalidKey);
        }

        self.keys_set = true;
        Ok(())
    }

    fn parse_witness_policy(&self, policy: &[u8]) -> Result<WitnessPolicy, EngineError> {
        if policy.is_empty() {
            return Err(EngineError::InvalidWitnessPolicy);
        }

        Ok(WitnessPolicy(policy.to_vec()))
    }

    fn set_witness_policy(&mut self, policy: WitnessPolicy) -> Result<(), EngineError> {
        self.witness_policy = policy.0;
        Ok(())
    }

    fn parse_proof_bundle(&self, bundle: &[u8]) -> Result<ProofBundle, EngineError> {
        let split = bundle
            .iter()
            .position(|&b| b == b'|')
            .ok_or(EngineError::InvalidBundle)?;

        Ok(ProofBundle {
            statement: bundle[..split].to_vec(),
            proof: bundle[split + 1..].to_vec(),
            probe: b"probe".to_vec(),
        })
    }

    fn get_proof(&mut self, _bundle: &ProofBundle) -> Result<Vec<u8>, EngineError> {
        if !self.transport {
            return Err(EngineError::NoTransport);
        }

        self.get_proof_calls += 1;
        Ok(FRESH_PROOF.to_vec())
    }

    fn verify_proof(&mut self, bundle: &ProofBundle) -> Result<(), EngineError> {
        self.verify_calls += 1;

        if bundle.proof == FRESH_PROOF {
            self.verified_fresh = true;
            return Ok(());
        }

        if bundle.proof == EMBEDDED_PROOF {
            return Ok(());
        }

        Err(EngineError::VerifyFailed)
    }

    fn parse_requirements(&self, policy: &[u8]) -> Result<Requirements, EngineError> {
        if policy.is_empty() {
            return Err(EngineError::InvalidPolicy);
        }

        Ok(Requirements(policy.to_vec()))
    }

    fn parse_statement(&self, statement: &[u8]) -> Result<Claims, EngineError> {
        let text = core::str::from_utf8(statement).map_err(|_| EngineError::InvalidPolicy)?;
        let mut artifacts = Vec::new();

        for line in text.lines() {
            let (category, hash) = line.split_once(':').ok_or(EngineError::InvalidPolicy)?;

            artifacts.push(ClaimedArtifact {
                category: category.parse().map_err(|_| EngineError::InvalidPolicy)?,
                claims: hash.to_string().into_bytes(),
            });
        }

        Ok(Claims { artifacts })
    }

    fn validate_artifact(
        &self,
        _category: u32,
        file_hash: &str,
        claims: &[u8],
    ) -> Result<(), EngineError> {
        if claims == file_hash.as_bytes() {
            Ok(())
        } else {
            Err(EngineError::NotSatisfied)
        }
    }

    fn validate_policy(
        &self,
        requirements: &Requirements,
        _claims: &Claims,
    ) -> Result<(), EngineError> {
        if requirements.0 == b"deny" {
            return Err(EngineError::NotSatisfied);
        }

        Ok(())
    }

    fn supports_online(&self) -> bool {
        self.transport
    }
}
