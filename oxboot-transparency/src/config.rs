//! Boot-Transparency Configuration
//!
//! Configuration is loaded per boot entry from the ESP: the directory
//! name is derived from the entry's artifact hashes, so a bundle update
//! atomically switches to its own policy, keys and proof.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use oxboot_uefi::Volume;

use crate::entry::{BootEntry, ValidateError};
use crate::hex;

/// Boot transparency configuration root directory and filenames.
pub const TRANSPARENCY_ROOT: &str = "/transparency";

pub const BOOT_POLICY_FILE: &str = "policy.json";
pub const WITNESS_POLICY_FILE: &str = "trust_policy";
pub const PROOF_BUNDLE_FILE: &str = "proof-bundle.json";
pub const SUBMIT_KEY_FILE: &str = "submit-key.pub";
pub const LOG_KEY_FILE: &str = "log-key.pub";

/// SHA-256 digest size; artifact hashes must be exactly this long.
pub(crate) const DIGEST_SIZE: usize = 32;

/// The status of the boot transparency functionality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    /// Boot transparency disabled.
    #[default]
    None,
    /// Enabled; the embedded inclusion proof is verified.
    Offline,
    /// Enabled; a fresh inclusion proof is fetched from the log.
    Online,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transparency engine flavor a configuration expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineKind {
    #[default]
    Sigsum,
    Tessera,
}

impl EngineKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sigsum => "sigsum",
            Self::Tessera => "tessera",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the boot transparency functionality.
///
/// The document fields are either provided directly (user-space tools,
/// tests) or loaded from the per-entry ESP directory during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub status: Status,
    pub engine: EngineKind,

    /// Boot policy in the engine's policy syntax (JSON).
    pub boot_policy: Vec<u8>,
    /// Witness policy in the engine's plaintext format.
    pub witness_policy: Vec<u8>,
    /// Proof bundle document (JSON).
    pub proof_bundle: Vec<u8>,
    /// Log submitter public key in OpenSSH format.
    pub submit_key: Vec<u8>,
    /// Log public key in OpenSSH format.
    pub log_key: Vec<u8>,
}

impl Config {
    /// A fresh configuration with the given status and engine; document
    /// fields start empty so no key material leaks across toggles.
    #[must_use]
    pub fn new(status: Status, engine: EngineKind) -> Self {
        Self {
            status,
            engine,
            ..Self::default()
        }
    }

    /// The per-entry configuration directory: `/transparency/` joined
    /// with the hex artifact hashes, sorted ascending by category.
    pub fn path(&self, entry: &BootEntry) -> Result<String, ValidateError> {
        if entry.artifacts.is_empty() {
            return Err(ValidateError::InvalidEntry);
        }

        let mut artifacts = entry.artifacts.clone();
        artifacts.sort_by_key(|a| a.category);

        let mut path = String::from(TRANSPARENCY_ROOT);

        for artifact in &artifacts {
            if artifact.hash.len() != DIGEST_SIZE {
                return Err(ValidateError::HashInvalid);
            }

            path = format!("{path}/{}", hex::encode(&artifact.hash));
        }

        Ok(path)
    }

    /// Load the five configuration documents from the per-entry
    /// directory on the given volume.
    pub fn load_from_volume<V: Volume>(
        &mut self,
        volume: &V,
        entry_path: &str,
    ) -> Result<(), ValidateError> {
        self.boot_policy = read_config_file(volume, entry_path, BOOT_POLICY_FILE)?;
        self.witness_policy = read_config_file(volume, entry_path, WITNESS_POLICY_FILE)?;
        self.submit_key = read_config_file(volume, entry_path, SUBMIT_KEY_FILE)?;
        self.log_key = read_config_file(volume, entry_path, LOG_KEY_FILE)?;
        self.proof_bundle = read_config_file(volume, entry_path, PROOF_BUNDLE_FILE)?;
        Ok(())
    }
}

fn read_config_file<V: Volume>(
    volume: &V,
    entry_path: &str,
    name: &'static str,
) -> Result<Vec<u8>, ValidateError> {
    let path = format!("{entry_path}/{name}");

    volume
        .read_file(&path)
        .map_err(|_| ValidateError::ConfigMissing(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Artifact;
    use crate::testdata;
    use alloc::vec;

    #[test]
    fn test_path_sorted_by_category() {
        let config = Config::new(Status::Offline, EngineKind::Sigsum);

        // categories deliberately out of order
        let entry = BootEntry {
            artifacts: vec![
                Artifact {
                    category: 2,
                    hash: testdata::initrd_hash(),
                },
                Artifact {
                    category: 1,
                    hash: testdata::kernel_hash(),
                },
            ],
        };

        let path = config.path(&entry).unwrap();
        assert_eq!(
            path,
            format!(
                "/transparency/{}/{}",
                testdata::KERNEL_HASH,
                testdata::INITRD_HASH
            )
        );
    }

    #[test]
    fn test_path_rejects_bad_hash_length() {
        let config = Config::new(Status::Offline, EngineKind::Sigsum);

        let entry = BootEntry {
            artifacts: vec![Artifact {
                category: 1,
                hash: vec![0xaa; 16],
            }],
        };

        assert_eq!(config.path(&entry), Err(ValidateError::HashInvalid));
    }

    #[test]
    fn test_path_rejects_empty_entry() {
        let config = Config::new(Status::Offline, EngineKind::Sigsum);
        let entry = BootEntry { artifacts: vec![] };

        assert_eq!(config.path(&entry), Err(ValidateError::InvalidEntry));
    }

    #[test]
    fn test_load_from_volume() {
        let volume = testdata::config_volume("/transparency/aa/bb");
        let mut config = Config::new(Status::Offline, EngineKind::Sigsum);

        config
            .load_from_volume(&volume, "/transparency/aa/bb")
            .unwrap();

        assert_eq!(config.boot_policy, b"policy");
        assert_eq!(config.witness_policy, b"witness");
        assert_eq!(config.proof_bundle, b"bundle");
        assert_eq!(config.submit_key, b"submit");
        assert_eq!(config.log_key, b"log");
    }

    #[test]
    fn test_load_missing_file() {
        let volume = testdata::config_volume("/transparency/aa/bb");
        let mut config = Config::new(Status::Offline, EngineKind::Sigsum);

        let err = config
            .load_from_volume(&volume, "/transparency/other")
            .unwrap_err();

        assert_eq!(err, ValidateError::ConfigMissing(BOOT_POLICY_FILE));
    }

    #[test]
    fn test_new_resets_documents() {
        let mut config = Config::new(Status::Offline, EngineKind::Sigsum);
        config.log_key = b"secret".to_vec();

        let toggled = Config::new(Status::Online, EngineKind::Tessera);
        assert!(toggled.log_key.is_empty());
        assert_eq!(toggled.status, Status::Online);
        assert_eq!(toggled.engine, EngineKind::Tessera);

        // repeated toggles converge on the last state
        let toggled = Config::new(Status::None, EngineKind::Sigsum);
        assert_eq!(toggled.status, Status::None);
        assert!(toggled.boot_policy.is_empty());
    }
}
