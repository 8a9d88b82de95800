use md5::{Digest, Md5};

/// MD5 digest folded into 64 bits: XOR of the two little-endian halves.
pub fn md5_fold_64(data: &[u8]) -> u64 {
    let digest = Md5::digest(data);

    let mut low = [0u8; 8];
    let mut high = [0u8; 8];
    low.copy_from_slice(&digest[..8]);
    high.copy_from_slice(&digest[8..16]);

    u64::from_le_bytes(low) ^ u64::from_le_bytes(high)
}
