//! Test fixtures for generating test data.

use bytes::Bytes;
use stash_core::ContentDigest;

/// Deterministic pseudo-random media bytes; distinct seeds give distinct content.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut x = seed ^ 0x9e37_79b9_7f4a_7c15;
    let data: Vec<u8> = (0..len)
        .map(|_| {
            // xorshift64
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x >> 24) as u8
        })
        .collect();
    Bytes::from(data)
}

/// Hex digest of `data`, as a client would compute it.
#[allow(dead_code)]
pub fn digest_hex(data: &[u8]) -> String {
    ContentDigest::compute(data).to_hex()
}

/// Split data into chunks of specified size.
#[allow(dead_code)]
pub fn split_into_chunks(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
    data.chunks(chunk_size)
        .map(Bytes::copy_from_slice)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_bytes_repeat_per_seed() {
        assert_eq!(seeded_bytes(7, 64), seeded_bytes(7, 64));
        assert_ne!(seeded_bytes(7, 64), seeded_bytes(8, 64));
        assert_ne!(digest_hex(&seeded_bytes(1, 10)), digest_hex(&seeded_bytes(2, 10)));
    }

    #[test]
    fn split_keeps_a_short_tail() {
        let data = seeded_bytes(1, 100);
        let chunks = split_into_chunks(&data, 30);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![30, 30, 30, 10]);
        assert_eq!(chunks.concat(), data.to_vec());
    }
}
