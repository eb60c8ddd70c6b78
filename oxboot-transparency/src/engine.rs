//! Transparency Engine Contract
//!
//! The inclusion-proof and signature machinery is an external library;
//! the validator talks to it through this trait and is handed an
//! instance at validation time. An engine that cannot reach a log
//! reports `supports_online() == false` and `Online` validation is
//! rejected before any proof work starts.

use alloc::vec::Vec;
use core::fmt;

/// Errors surfaced by an engine implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// Keys could not be parsed or set.
    InvalidKey,
    /// The witness policy could not be parsed.
    InvalidWitnessPolicy,
    /// The proof bundle could not be parsed.
    InvalidBundle,
    /// Proof verification failed.
    VerifyFailed,
    /// The policy or statement could not be parsed.
    InvalidPolicy,
    /// A claims set did not satisfy the requirements.
    NotSatisfied,
    /// The requested artifact category has no handler.
    UnknownCategory,
    /// The engine has no network transport.
    NoTransport,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key material"),
            Self::InvalidWitnessPolicy => write!(f, "invalid witness policy"),
            Self::InvalidBundle => write!(f, "invalid proof bundle"),
            Self::VerifyFailed => write!(f, "proof verification failed"),
            Self::InvalidPolicy => write!(f, "invalid policy or statement"),
            Self::NotSatisfied => write!(f, "requirements not satisfied"),
            Self::UnknownCategory => write!(f, "unknown artifact category"),
            Self::NoTransport => write!(f, "no network transport available"),
        }
    }
}

/// A parsed proof bundle: the canonical statement, the inclusion proof,
/// and the descriptor used to probe the log for a fresh proof online.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofBundle {
    pub statement: Vec<u8>,
    pub proof: Vec<u8>,
    pub probe: Vec<u8>,
}

/// An engine-parsed witness policy, opaque to the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessPolicy(pub Vec<u8>);

/// Engine-parsed policy requirements, opaque to the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements(pub Vec<u8>);

/// One artifact block of a parsed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedArtifact {
    pub category: u32,
    pub claims: Vec<u8>,
}

/// The claims carried by a parsed statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    pub artifacts: Vec<ClaimedArtifact>,
}

/// The boot-transparency engine contract.
pub trait Engine {
    /// Configure the log and submitter public keys.
    fn set_keys(&mut self, log_keys: &[&[u8]], submit_keys: &[&[u8]]) -> Result<(), EngineError>;

    /// Parse a witness policy document.
    fn parse_witness_policy(&self, policy: &[u8]) -> Result<WitnessPolicy, EngineError>;

    /// Install a parsed witness policy.
    fn set_witness_policy(&mut self, policy: WitnessPolicy) -> Result<(), EngineError>;

    /// Parse a proof bundle document.
    fn parse_proof_bundle(&self, bundle: &[u8]) -> Result<ProofBundle, EngineError>;

    /// Fetch a fresh inclusion proof from the log (network).
    fn get_proof(&mut self, bundle: &ProofBundle) -> Result<Vec<u8>, EngineError>;

    /// Verify the bundle's inclusion proof against the configured keys
    /// and witness policy.
    fn verify_proof(&mut self, bundle: &ProofBundle) -> Result<(), EngineError>;

    /// Parse boot policy requirements.
    fn parse_requirements(&self, policy: &[u8]) -> Result<Requirements, EngineError>;

    /// Parse the statement into its claims.
    fn parse_statement(&self, statement: &[u8]) -> Result<Claims, EngineError>;

    /// Check one artifact's claims against a required file hash.
    fn validate_artifact(
        &self,
        category: u32,
        file_hash: &str,
        claims: &[u8],
    ) -> Result<(), EngineError>;

    /// Check the logged claims against the policy requirements.
    fn validate_policy(
        &self,
        requirements: &Requirements,
        claims: &Claims,
    ) -> Result<(), EngineError>;

    /// Whether a network transport is wired in for online probing.
    fn supports_online(&self) -> bool {
        false
    }
}
