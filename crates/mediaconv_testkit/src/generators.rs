//! Property-based test generators using proptest.
//!
//! Provides strategies for hashes, payloads, database contents and chunk
//! sequences shaped like real streams (including looping ones).

use bytes::Bytes;
use mediaconv_hash::PayloadHash;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for arbitrary 128-bit hashes.
pub fn payload_hash_strategy() -> impl Strategy<Value = PayloadHash> {
    any::<u128>().prop_map(PayloadHash::new)
}

/// Strategy for payloads, including empty ones.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Strategy for database contents: distinct `(tag, hash)` keys with payloads.
pub fn entries_strategy(
    num_tags: u32,
    max_entries: usize,
) -> impl Strategy<Value = Vec<(u32, PayloadHash, Vec<u8>)>> {
    prop::collection::btree_map(
        (0..num_tags, any::<u128>()),
        payload_strategy(),
        0..max_entries,
    )
    .prop_map(|map: BTreeMap<(u32, u128), Vec<u8>>| {
        map.into_iter()
            .map(|((tag, hash), data)| (tag, PayloadHash::new(hash), data))
            .collect()
    })
}

/// Strategy for one non-empty chunk.
pub fn chunk_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 1..256).prop_map(Bytes::from)
}

/// Strategy for chunk sequences drawn from a small alphabet, so repeats and
/// shared prefixes are common.
pub fn chunk_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Bytes>> {
    prop::collection::vec(0u8..4, 0..max_len).prop_map(|symbols| {
        symbols
            .into_iter()
            .map(|s| Bytes::from(vec![b'a' + s; 3]))
            .collect()
    })
}

/// Strategy for a looping stream: a period of distinct chunks and a repeat
/// count of at least two.
pub fn looped_stream_strategy() -> impl Strategy<Value = (Vec<Bytes>, usize)> {
    (prop::collection::btree_set(any::<u32>(), 1..8), 2usize..5).prop_map(|(ids, repeats)| {
        let period = ids
            .into_iter()
            .map(|id| Bytes::from(id.to_le_bytes().to_vec()))
            .collect();
        (period, repeats)
    })
}
