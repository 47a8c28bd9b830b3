//! Hand-assembled test vectors.
//!
//! [`fozdb_image`] builds a database file byte by byte, independently of the
//! storage engine, so tests can check that the engine reads and writes the
//! exact on-disk layout.

use mediaconv_hash::PayloadHash;

/// File header of a version 6 database.
pub const FOZDB_HEADER_V6: [u8; 16] = [
    0x81, b'F', b'O', b'S', b'S', b'I', b'L', b'I', b'Z', b'E', b'D', b'B', 0, 0, 0, 6,
];

/// Reference MurmurHash3_x64_128 digests: input, seed, low half, high half.
pub const MURMUR3_X64_VECTORS: &[(&[u8], u32, u64, u64)] = &[
    (b"", 0, 0, 0),
    (
        b"The quick brown fox jumps over the lazy dog",
        0,
        0xe34b_bc7b_bc07_1b6c,
        0x7a43_3ca9_c49a_9347,
    ),
];

/// Builds a database image holding `entries` in order, uncompressed and
/// with CRCs.
pub fn fozdb_image(entries: &[(u32, PayloadHash, &[u8])]) -> Vec<u8> {
    let mut image = FOZDB_HEADER_V6.to_vec();
    for (tag, hash, data) in entries {
        image.extend_from_slice(format!("{tag:08x}{:032x}", hash.as_u128()).as_bytes());
        image.extend_from_slice(&(data.len() as u32).to_le_bytes());
        image.extend_from_slice(&1u32.to_le_bytes());
        image.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        image.extend_from_slice(&(data.len() as u32).to_le_bytes());
        image.extend_from_slice(data);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_layout() {
        let image = fozdb_image(&[(2, PayloadHash::new(0xab), b"xy")]);
        assert_eq!(image.len(), 16 + 40 + 16 + 2);
        assert_eq!(&image[16..24], b"00000002");
        assert_eq!(&image[54..56], b"ab");
        assert_eq!(&image[60..64], &1u32.to_le_bytes());
        assert_eq!(&image[72..], b"xy");
    }
}
