//! Checksum helpers for sidecar files.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The `(extension, digest)` sidecar set written next to uploaded files.
pub fn sidecars(data: &[u8]) -> [(&'static str, String); 3] {
    [
        ("md5", md5_hex(data)),
        ("sha1", sha1_hex(data)),
        ("sha256", sha256_hex(data)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference digests of the ASCII string "abc".

    #[test]
    fn test_md5_known_vector() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sidecars_cover_all_three() {
        let sidecars = sidecars(b"abc");
        let exts: Vec<&str> = sidecars.iter().map(|(e, _)| *e).collect();
        assert_eq!(exts, vec!["md5", "sha1", "sha256"]);
    }
}
