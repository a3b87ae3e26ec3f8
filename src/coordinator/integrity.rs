//! Replica consistency checks
//!
//! Each downloaded replica is digested and compared with the replica that
//! responded just before it. Only consecutive pairs are compared, never all
//! pairs, so a mismatch names the replica where the sequence changed rather
//! than the replica that is actually corrupted.

use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of one replica's bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Digest a replica
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Result of comparing a replica against its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No earlier replica to compare with
    First,
    Passed,
    Mismatch { previous: Checksum },
}

/// Compares each observed checksum with the one observed just before it
#[derive(Debug, Clone, Default)]
pub struct ConsecutiveVerifier {
    previous: Option<Checksum>,
}

impl ConsecutiveVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, checksum: Checksum) -> Verdict {
        let verdict = match self.previous {
            None => Verdict::First,
            Some(previous) if previous == checksum => Verdict::Passed,
            Some(previous) => Verdict::Mismatch { previous },
        };
        self.previous = Some(checksum);
        verdict
    }
}
