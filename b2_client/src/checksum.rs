//! Content-integrity digests for upload bodies.

use std::io::Read;

use sha1::{Digest, Sha1};

const READ_BLOCK_SIZE: usize = 64 * 1024;

/// SHA-1 digest of an in-memory buffer, as 40 lowercase hex characters.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// SHA-1 digest of a reader, consumed to EOF in fixed-size blocks so the
/// input is never resident in memory as a whole.
pub fn sha1_hex_from_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha1::new();
    let mut block = vec![0u8; READ_BLOCK_SIZE];

    loop {
        let n = reader.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_reference_vectors() {
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            sha1_hex(b"The quick brown fox jumps over the lazy dog"),
            "2fd4e1c67a2d28fced849ee1bb76e7391b93eb12"
        );
    }

    #[test]
    fn reader_digest_matches_buffer_digest() {
        // Larger than one read block so the loop runs more than once.
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();

        let from_reader = sha1_hex_from_reader(&data[..]).unwrap();
        assert_eq!(from_reader, sha1_hex(&data));
    }

    #[test]
    fn digest_is_deterministic() {
        let data = b"some part payload";
        assert_eq!(sha1_hex(data), sha1_hex(data));
    }
}
