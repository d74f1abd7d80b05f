use bytes::Bytes;
use filetime::FileTime;
use futures::Stream;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output (reproducible tests).
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// A request-body-like stream yielding `data` in 64 KiB frames.
pub fn body_of(data: Bytes) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let frames: Vec<_> = data
        .chunks(64 * 1024)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(frames)
}

/// Set the mtime of `path` to `age` in the past.
pub fn backdate(path: &Path, age: Duration) {
    let then = SystemTime::now() - age;
    let secs = then.duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
}
