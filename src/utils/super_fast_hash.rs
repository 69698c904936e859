//! Paul Hsieh's SuperFastHash
//!
//! A 32-bit non-cryptographic mixing hash. Input bytes are consumed as
//! little-endian 16-bit words so the digest does not depend on the host's
//! native byte order.

/// Hash an arbitrary byte buffer. An empty buffer hashes to 0.
pub fn super_fast_hash(data: &[u8]) -> u32 {
    if data.is_empty() {
        return 0;
    }

    let mut hash = data.len() as u32;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        hash = hash.wrapping_add(read_u16_le(chunk[0], chunk[1]));
        let tmp = (read_u16_le(chunk[2], chunk[3]) << 11) ^ hash;
        hash = (hash << 16) ^ tmp;
        hash = hash.wrapping_add(hash >> 11);
    }

    match *chunks.remainder() {
        [a, b, c] => {
            hash = hash.wrapping_add(read_u16_le(a, b));
            hash ^= hash << 16;
            hash ^= (c as u32) << 18;
            hash = hash.wrapping_add(hash >> 11);
        }
        [a, b] => {
            hash = hash.wrapping_add(read_u16_le(a, b));
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        [a] => {
            hash = hash.wrapping_add(a as u32);
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    // Avalanche the final bits
    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);

    hash
}

#[inline]
fn read_u16_le(lo: u8, hi: u8) -> u32 {
    u16::from_le_bytes([lo, hi]) as u32
}
