//! Partitioning of an instrument set into per-connection chunks.

/// Split `symbols` into contiguous groups of at most `max_chunk_size`,
/// preserving order. The last group may be smaller; empty input yields no
/// chunks. A zero chunk size is treated as one.
pub fn partition(symbols: &[String], max_chunk_size: usize) -> Vec<Vec<String>> {
    symbols
        .chunks(max_chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
