//! Commit-reveal for provably fair rounds.
//!
//! ## Flow
//!
//! 1. **Derive** - When a bet is accepted, the house derives the round's reveal from its
//!    secret and the bet's authorization id.
//! 2. **Commit** - The commitment (hash of the reveal) is returned with the bet, before the
//!    player makes any choice that depends on the outcome.
//! 3. **Reveal** - The reveal is disclosed when the round is settled.
//! 4. **Verify** - Anyone can check `hash(reveal) == commit` and replay the round from the
//!    reveal.
//!
//! ```text
//! reveal = hash(house_secret || authorization || "reveal")
//! commit = hash(reveal)
//! ```

use commonware_cryptography::sha256::Sha256;
use commonware_cryptography::Hasher;
use commonware_utils::{from_hex, hex};
use thiserror::Error;

/// Length of commit and reveal values in bytes.
pub const COMMIT_REVEAL_LEN: usize = 32;

/// Derive the reveal value of a round.
pub fn derive_reveal(secret: &[u8], authorization: &[u8]) -> [u8; COMMIT_REVEAL_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(authorization);
    hasher.update(b"reveal"); // Domain separator
    hasher.finalize().0
}

/// Compute a commitment from a reveal value.
pub fn compute_commit(reveal: &[u8; COMMIT_REVEAL_LEN]) -> [u8; COMMIT_REVEAL_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(reveal);
    hasher.finalize().0
}

/// Returns `true` if `commit == hash(reveal)`.
pub fn verify_commit_reveal(
    commit: &[u8; COMMIT_REVEAL_LEN],
    reveal: &[u8; COMMIT_REVEAL_LEN],
) -> bool {
    &compute_commit(reveal) == commit
}

/// Verify a hex-encoded commitment against a hex-encoded reveal, as they travel on the wire.
///
/// Returns the decoded reveal on success.
pub fn verify_commit_reveal_hex(
    commit: &str,
    reveal: &str,
) -> Result<[u8; COMMIT_REVEAL_LEN], CommitRevealError> {
    let commit = decode(commit).ok_or(CommitRevealError::InvalidCommit)?;
    let reveal = decode(reveal).ok_or(CommitRevealError::InvalidReveal)?;
    if verify_commit_reveal(&commit, &reveal) {
        Ok(reveal)
    } else {
        Err(CommitRevealError::VerificationFailed)
    }
}

/// Hex-encode a commit or reveal.
pub fn encode(value: &[u8; COMMIT_REVEAL_LEN]) -> String {
    hex(value)
}

/// Decode a hex commit or reveal; `None` unless it is exactly 32 bytes.
pub fn decode(value: &str) -> Option<[u8; COMMIT_REVEAL_LEN]> {
    from_hex(value)?.try_into().ok()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitRevealError {
    #[error("commit is not 32 hex-encoded bytes")]
    InvalidCommit,
    #[error("reveal is not 32 hex-encoded bytes")]
    InvalidReveal,
    #[error("commit-reveal verification failed")]
    VerificationFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_reveal_deterministic() {
        let a = derive_reveal(b"secret", b"auth-1");
        let b = derive_reveal(b"secret", b"auth-1");
        assert_eq!(a, b);
        assert_ne!(a, derive_reveal(b"secret", b"auth-2"));
        assert_ne!(a, derive_reveal(b"other", b"auth-1"));
    }

    #[test]
    fn test_verify_commit_reveal() {
        let reveal = derive_reveal(b"secret", b"auth");
        let commit = compute_commit(&reveal);
        assert!(verify_commit_reveal(&commit, &reveal));

        let mut bad_reveal = reveal;
        bad_reveal[0] ^= 0xFF;
        assert!(!verify_commit_reveal(&commit, &bad_reveal));
    }

    #[test]
    fn test_verify_hex() {
        let reveal = derive_reveal(b"secret", b"auth");
        let commit = compute_commit(&reveal);
        let decoded = verify_commit_reveal_hex(&encode(&commit), &encode(&reveal)).unwrap();
        assert_eq!(decoded, reveal);

        assert_eq!(
            verify_commit_reveal_hex("abcd", &encode(&reveal)),
            Err(CommitRevealError::InvalidCommit)
        );
        assert_eq!(
            verify_commit_reveal_hex(&encode(&reveal), &encode(&reveal)),
            Err(CommitRevealError::VerificationFailed)
        );
    }
}
