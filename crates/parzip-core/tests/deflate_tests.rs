use flate2::{Decompress, FlushDecompress, Status};
use parzip_core::{DeflatePool, WINDOW_SIZE};

const BLOCK: usize = 1024 * 1024;

fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

/// Mixed-entropy input: repeated text broken up by pseudo-random runs, so
/// back-references cross block boundaries.
fn mixed_input(len: usize) -> Vec<u8> {
    let noise = pseudo_random(len, 0x5eed);
    let mut out = Vec::with_capacity(len);
    let phrase = b"the quick brown fox jumps over the lazy dog ";
    let mut i = 0usize;
    while out.len() < len {
        if i % 3 == 2 {
            let take = (len - out.len()).min(512);
            out.extend_from_slice(&noise[out.len()..out.len() + take]);
        } else {
            out.extend_from_slice(phrase);
        }
        i += 1;
    }
    out.truncate(len);
    out
}

/// Inflates a raw deflate byte sequence. Accepts sync-flushed prefixes that
/// carry no end-of-stream marker.
fn inflate(data: &[u8]) -> Vec<u8> {
    let mut state = Decompress::new(false);
    let mut out = Vec::with_capacity(data.len() * 4 + 64);
    let mut consumed = 0usize;
    loop {
        if out.len() == out.capacity() {
            out.reserve(64 * 1024);
        }
        let before_in = state.total_in();
        let before_out = state.total_out();
        let status = state
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .expect("inflate");
        consumed += (state.total_in() - before_in) as usize;
        if matches!(status, Status::StreamEnd) {
            break;
        }
        if consumed == data.len() && state.total_out() == before_out {
            break;
        }
    }
    out
}

fn split_compress(pool: &DeflatePool, data: &[u8]) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut start = 0usize;
    while start < data.len() {
        let end = (start + BLOCK).min(data.len());
        let dict = if start >= WINDOW_SIZE {
            Some(&data[start - WINDOW_SIZE..start])
        } else {
            None
        };
        let last = end == data.len();
        blocks.push(
            pool.compress_block(&data[start..end], dict, last)
                .expect("compress block"),
        );
        start = end;
    }
    blocks
}

#[test]
fn concatenated_blocks_form_one_valid_stream() {
    let data = mixed_input(3 * BLOCK + 12345);
    let pool = DeflatePool::new(5);

    let blocks = split_compress(&pool, &data);
    assert_eq!(blocks.len(), 4);

    let joined: Vec<u8> = blocks.concat();
    assert_eq!(inflate(&joined), data);
}

#[test]
fn first_block_inflates_alone() {
    let data = mixed_input(2 * BLOCK);
    let pool = DeflatePool::new(5);

    let blocks = split_compress(&pool, &data);
    // A sync-flushed block is decodable without its continuation.
    assert_eq!(inflate(&blocks[0]), data[..BLOCK]);
}

#[test]
fn dictionary_priming_reaches_back_across_blocks() {
    // Second block repeats the tail of the first; with the window primed the
    // matches resolve, and the concatenated stream must still round-trip.
    let mut data = mixed_input(BLOCK);
    let tail = data[BLOCK - WINDOW_SIZE..].to_vec();
    for _ in 0..4 {
        data.extend_from_slice(&tail);
    }

    let pool = DeflatePool::new(6);
    let blocks = split_compress(&pool, &data);
    assert_eq!(inflate(&blocks.concat()), data);
}

#[test]
fn pooled_states_survive_reuse() {
    let pool = DeflatePool::new(5);
    for round in 0..8u64 {
        let data = pseudo_random(4096, round + 1);
        let compressed = pool
            .compress_block(&data, None, true)
            .expect("compress block");
        assert_eq!(inflate(&compressed), data);
    }
}

#[test]
fn empty_final_block_is_a_complete_stream() {
    let pool = DeflatePool::new(5);
    let compressed = pool.compress_block(&[], None, true).expect("compress block");
    assert!(!compressed.is_empty());
    assert_eq!(inflate(&compressed), Vec::<u8>::new());
}

#[test]
fn level_zero_still_round_trips() {
    let data = mixed_input(BLOCK + 17);
    let pool = DeflatePool::new(0);
    let blocks = split_compress(&pool, &data);
    assert_eq!(inflate(&blocks.concat()), data);
}
