//! SHA-256 digests
//!
//! Every digest in the pipeline funnels through this module so that the
//! certificate's hash chain has exactly one hashing backend. Both a one-shot
//! helper and an incremental stream are exposed; output is byte-identical
//! across platforms (FIPS 180-4, via the `sha2` crate).

use sha2::{Digest, Sha256};

/// Length of every digest in the pipeline, in bytes.
pub const DIGEST_LEN: usize = 32;

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental SHA-256 for multi-part inputs (BN parameter records, layer
/// contract sequences).
#[derive(Clone, Default)]
pub struct Sha256Stream {
    inner: Sha256,
}

impl Sha256Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.inner.finalize().into()
    }
}

/// Render a digest as lowercase hex (log and Display output).
pub fn to_hex(digest: &[u8; DIGEST_LEN]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS 180-4 anchor vectors. These pin the backend: any deviation here
    // invalidates every certificate the crate has ever produced.

    #[test]
    fn test_sha256_empty() {
        let d = sha256(b"");
        assert_eq!(
            to_hex(&d),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_abc() {
        let d = sha256(b"abc");
        assert_eq!(
            to_hex(&d),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut stream = Sha256Stream::new();
        stream.update(b"a");
        stream.update(b"b");
        stream.update(b"c");
        assert_eq!(stream.finalize(), sha256(b"abc"));
    }

    #[test]
    fn test_incremental_empty_updates() {
        let mut stream = Sha256Stream::new();
        stream.update(b"");
        stream.update(b"abc");
        stream.update(b"");
        assert_eq!(stream.finalize(), sha256(b"abc"));
    }

    #[test]
    fn test_distinct_inputs_distinct_digests() {
        assert_ne!(sha256(b"abc"), sha256(b"abd"));
    }
}
