use sha2::{Digest, Sha256};

/// SHA-256 over `salt || plaintext || salt`, as lowercase hex.
///
/// The salt on both sides keeps someone who edits a save file from
/// recomputing a matching checksum with a stock hashing tool.
pub fn checksum(salt: &str, plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    hasher.update(salt.as_bytes());
    to_hex_lower(&hasher.finalize())
}

pub fn verify(salt: &str, plaintext: &str, expected: &str) -> bool {
    checksum(salt, plaintext) == expected
}

pub(crate) fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
