//! Source hashing for artifact keys.
//!
//! An artifact is named after the first [`KEY_LEN`] hex digits of the SHA-256
//! of the translation unit it was compiled from, so identical source always
//! maps onto the same file.

use sha2::{Digest, Sha256};

/// Number of hex digits of the digest used as an artifact key.
pub const KEY_LEN: usize = 16;

/// Hex SHA-256 digest of a source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceHash(String);

impl SourceHash {
    pub fn compute(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        SourceHash(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Full 64-digit hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The artifact key.
    pub fn key(&self) -> &str {
        &self.0[..KEY_LEN]
    }

    /// Whether `s` has the shape of an artifact key.
    pub fn is_key(s: &str) -> bool {
        s.len() == KEY_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl std::fmt::Display for SourceHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_hash() {
        assert_eq!(SourceHash::compute("int x;"), SourceHash::compute("int x;"));
    }

    #[test]
    fn different_inputs_different_hash() {
        assert_ne!(
            SourceHash::compute("int fun() { return 1; }"),
            SourceHash::compute("int fun() { return 2; }")
        );
    }

    #[test]
    fn known_digest() {
        let h = SourceHash::compute("");
        assert_eq!(
            h.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(h.key(), "e3b0c44298fc1c14");
    }

    #[test]
    fn key_shape() {
        assert!(SourceHash::is_key(SourceHash::compute("a").key()));
        assert!(!SourceHash::is_key("x"));
        assert!(!SourceHash::is_key("E3B0C44298FC1C14"));
        assert!(!SourceHash::is_key("e3b0c44298fc1c1z"));
    }
}
