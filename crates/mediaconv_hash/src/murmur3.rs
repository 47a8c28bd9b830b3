//! Incremental MurmurHash3, 128-bit output.
//!
//! Each state keeps the seed, the lane accumulators, the number of bytes
//! consumed and a tail of up to 15 bytes that did not yet fill a block.
//! [`Murmur3::finish`] works on a copy, so a state can keep absorbing input
//! after a fingerprint has been taken.

use crate::fingerprint::PayloadHash;
use std::io::{self, Read};

/// Seed used for every fingerprint stored by the transcode cache.
pub const HASH_SEED: u32 = 0x4AA6_1F63;

const BLOCK_SIZE: usize = 16;
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Common interface of the MurmurHash3 variants.
pub trait Murmur3: Clone {
    /// Creates a state initialized to `seed`.
    fn with_seed(seed: u32) -> Self;

    /// Returns the configured seed.
    fn seed(&self) -> u32;

    /// Absorbs `data`.
    fn update(&mut self, data: &[u8]);

    /// Number of bytes absorbed since creation or the last [`reset`](Self::reset).
    fn processed(&self) -> u64;

    /// Restores the lanes and counter to the seed, keeping the seed.
    fn reset(&mut self);

    /// Applies the finalization mix to a copy of the state.
    fn finish(&self) -> PayloadHash;
}

/// Feeds everything `reader` yields into `state`.
///
/// A read of zero bytes marks the end of the data. Returns the number of
/// bytes absorbed by this call.
pub fn hash_reader<H: Murmur3, R: Read>(state: &mut H, mut reader: R) -> io::Result<u64> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        state.update(&buf[..n]);
        total += n as u64;
    }
}

/// Hashes the complete contents of `reader` with the native variant.
pub fn full_hash<R: Read>(reader: R, seed: u32) -> io::Result<PayloadHash> {
    let mut state = crate::DefaultMurmur3::with_seed(seed);
    hash_reader(&mut state, reader)?;
    Ok(state.finish())
}

/// Hashes a byte slice with the native variant.
#[must_use]
pub fn hash_bytes(data: &[u8], seed: u32) -> PayloadHash {
    let mut state = crate::DefaultMurmur3::with_seed(seed);
    state.update(data);
    state.finish()
}

/// Partial-block buffer shared by both variants.
#[derive(Debug, Clone, Copy, Default)]
struct Tail {
    bytes: [u8; BLOCK_SIZE],
    len: usize,
}

impl Tail {
    /// Splits `data` into whole blocks for `process`, keeping the remainder.
    fn absorb(&mut self, mut data: &[u8], mut process: impl FnMut(&[u8; BLOCK_SIZE])) {
        if self.len > 0 {
            let take = (BLOCK_SIZE - self.len).min(data.len());
            self.bytes[self.len..self.len + take].copy_from_slice(&data[..take]);
            self.len += take;
            data = &data[take..];
            if self.len < BLOCK_SIZE {
                return;
            }
            process(&self.bytes);
            self.len = 0;
        }

        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            let mut b = [0u8; BLOCK_SIZE];
            b.copy_from_slice(block);
            process(&b);
        }

        let rest = blocks.remainder();
        self.bytes[..rest.len()].copy_from_slice(rest);
        self.len = rest.len();
    }

    /// The pending bytes, zero padded to a full block.
    fn padded(&self) -> [u8; BLOCK_SIZE] {
        let mut out = [0u8; BLOCK_SIZE];
        out[..self.len].copy_from_slice(&self.bytes[..self.len]);
        out
    }
}

fn u64_le(b: &[u8]) -> u64 {
    let mut w = [0u8; 8];
    w.copy_from_slice(&b[..8]);
    u64::from_le_bytes(w)
}

fn u32_le(b: &[u8]) -> u32 {
    let mut w = [0u8; 4];
    w.copy_from_slice(&b[..4]);
    u32::from_le_bytes(w)
}

const fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

const fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// `MurmurHash3_x64_128`: two 64-bit lanes.
#[derive(Debug, Clone)]
pub struct Murmur3x64 {
    seed: u32,
    h1: u64,
    h2: u64,
    processed: u64,
    tail: Tail,
}

impl Murmur3x64 {
    const C1: u64 = 0x87c3_7b91_1142_53d5;
    const C2: u64 = 0x4cf5_ad43_2745_937f;

    fn mix_k1(k1: u64) -> u64 {
        k1.wrapping_mul(Self::C1)
            .rotate_left(31)
            .wrapping_mul(Self::C2)
    }

    fn mix_k2(k2: u64) -> u64 {
        k2.wrapping_mul(Self::C2)
            .rotate_left(33)
            .wrapping_mul(Self::C1)
    }

    fn block(h1: &mut u64, h2: &mut u64, block: &[u8; BLOCK_SIZE]) {
        let k1 = u64_le(&block[0..8]);
        let k2 = u64_le(&block[8..16]);

        *h1 ^= Self::mix_k1(k1);
        *h1 = h1
            .rotate_left(27)
            .wrapping_add(*h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        *h2 ^= Self::mix_k2(k2);
        *h2 = h2
            .rotate_left(31)
            .wrapping_add(*h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }
}

impl Murmur3 for Murmur3x64 {
    fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            h1: u64::from(seed),
            h2: u64::from(seed),
            processed: 0,
            tail: Tail::default(),
        }
    }

    fn seed(&self) -> u32 {
        self.seed
    }

    fn update(&mut self, data: &[u8]) {
        let (h1, h2) = (&mut self.h1, &mut self.h2);
        self.tail.absorb(data, |block| Self::block(h1, h2, block));
        self.processed += data.len() as u64;
    }

    fn processed(&self) -> u64 {
        self.processed
    }

    fn reset(&mut self) {
        *self = Self::with_seed(self.seed);
    }

    fn finish(&self) -> PayloadHash {
        let (mut h1, mut h2) = (self.h1, self.h2);

        let rest = self.tail.len;
        let tail = self.tail.padded();
        if rest > 8 {
            h2 ^= Self::mix_k2(u64_le(&tail[8..16]));
        }
        if rest > 0 {
            h1 ^= Self::mix_k1(u64_le(&tail[0..8]));
        }

        h1 ^= self.processed;
        h2 ^= self.processed;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        PayloadHash::from_halves(h1, h2)
    }
}

/// `MurmurHash3_x86_128`: four 32-bit lanes.
#[derive(Debug, Clone)]
pub struct Murmur3x86 {
    seed: u32,
    h: [u32; 4],
    processed: u64,
    tail: Tail,
}

impl Murmur3x86 {
    const C1: u32 = 0x239b_961b;
    const C2: u32 = 0xab0e_9789;
    const C3: u32 = 0x38b3_4ae5;
    const C4: u32 = 0xa1e3_8b93;

    fn mix(k: u32, lane: usize) -> u32 {
        let (ca, rot, cb) = match lane {
            0 => (Self::C1, 15, Self::C2),
            1 => (Self::C2, 16, Self::C3),
            2 => (Self::C3, 17, Self::C4),
            _ => (Self::C4, 18, Self::C1),
        };
        k.wrapping_mul(ca).rotate_left(rot).wrapping_mul(cb)
    }

    fn block(h: &mut [u32; 4], block: &[u8; BLOCK_SIZE]) {
        let k = [
            u32_le(&block[0..4]),
            u32_le(&block[4..8]),
            u32_le(&block[8..12]),
            u32_le(&block[12..16]),
        ];

        h[0] ^= Self::mix(k[0], 0);
        h[0] = h[0]
            .rotate_left(19)
            .wrapping_add(h[1])
            .wrapping_mul(5)
            .wrapping_add(0x561c_cd1b);

        h[1] ^= Self::mix(k[1], 1);
        h[1] = h[1]
            .rotate_left(17)
            .wrapping_add(h[2])
            .wrapping_mul(5)
            .wrapping_add(0x0bca_a747);

        h[2] ^= Self::mix(k[2], 2);
        h[2] = h[2]
            .rotate_left(15)
            .wrapping_add(h[3])
            .wrapping_mul(5)
            .wrapping_add(0x96cd_1c35);

        h[3] ^= Self::mix(k[3], 3);
        h[3] = h[3]
            .rotate_left(13)
            .wrapping_add(h[0])
            .wrapping_mul(5)
            .wrapping_add(0x32ac_3b17);
    }
}

impl Murmur3 for Murmur3x86 {
    fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            h: [seed; 4],
            processed: 0,
            tail: Tail::default(),
        }
    }

    fn seed(&self) -> u32 {
        self.seed
    }

    fn update(&mut self, data: &[u8]) {
        let h = &mut self.h;
        self.tail.absorb(data, |block| Self::block(h, block));
        self.processed += data.len() as u64;
    }

    fn processed(&self) -> u64 {
        self.processed
    }

    fn reset(&mut self) {
        *self = Self::with_seed(self.seed);
    }

    fn finish(&self) -> PayloadHash {
        let mut h = self.h;

        let rest = self.tail.len;
        let tail = self.tail.padded();
        for lane in (0..4).rev() {
            if rest > lane * 4 {
                h[lane] ^= Self::mix(u32_le(&tail[lane * 4..lane * 4 + 4]), lane);
            }
        }

        // The reference implementation folds the length in as a 32-bit int.
        let len = self.processed as u32;
        for lane in &mut h {
            *lane ^= len;
        }

        h[0] = h[0].wrapping_add(h[1]).wrapping_add(h[2]).wrapping_add(h[3]);
        h[1] = h[1].wrapping_add(h[0]);
        h[2] = h[2].wrapping_add(h[0]);
        h[3] = h[3].wrapping_add(h[0]);

        for lane in &mut h {
            *lane = fmix32(*lane);
        }

        h[0] = h[0].wrapping_add(h[1]).wrapping_add(h[2]).wrapping_add(h[3]);
        h[1] = h[1].wrapping_add(h[0]);
        h[2] = h[2].wrapping_add(h[0]);
        h[3] = h[3].wrapping_add(h[0]);

        PayloadHash::from_words(h)
    }
}
