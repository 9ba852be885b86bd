/// Backend alignment: every non-final chunk must be a multiple of 256 KiB.
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// 2.5 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * CHUNK_ALIGNMENT;

/// Round a requested chunk size down to the backend alignment (never below one unit).
pub fn align_chunk_size(requested: u64) -> u64 {
    (requested / CHUNK_ALIGNMENT).max(1) * CHUNK_ALIGNMENT
}

/// A contiguous span `[start, start + len)` of the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: u64,
    pub len: u64,
}

impl ChunkSpan {
    pub fn end_inclusive(&self) -> u64 {
        self.start + self.len - 1
    }
}

/// The chunk that starts at `offset`, or `None` once the payload is exhausted.
pub fn chunk_at(offset: u64, total: u64, chunk_size: u64) -> Option<ChunkSpan> {
    if offset >= total || chunk_size == 0 {
        return None;
    }
    Some(ChunkSpan {
        start: offset,
        len: (total - offset).min(chunk_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    /// Walk the payload the way the transfer loop does when every chunk is fully confirmed.
    fn partition(total: u64, chunk_size: u64) -> Vec<ChunkSpan> {
        let mut out = Vec::new();
        let mut offset = 0;
        while let Some(span) = chunk_at(offset, total, chunk_size) {
            offset += span.len;
            out.push(span);
        }
        out
    }

    #[test]
    fn partitions_with_short_tail() {
        let spans = partition(25 * MIB, 10 * MIB);
        let sizes: Vec<u64> = spans.iter().map(|s| s.len).collect();
        assert_eq!(sizes, vec![10 * MIB, 10 * MIB, 5 * MIB]);
        assert_eq!(spans[2].start, 20 * MIB);
        assert_eq!(spans[2].end_inclusive(), 25 * MIB - 1);
    }

    #[test]
    fn chunk_count_is_ceiling() {
        for (total, c) in [(1, 7), (7, 7), (8, 7), (100, 3), (21 * MIB, DEFAULT_CHUNK_SIZE)] {
            let spans = partition(total, c);
            assert_eq!(spans.len() as u64, total.div_ceil(c));
            assert_eq!(spans.iter().map(|s| s.len).sum::<u64>(), total);
            let last = spans.last().unwrap();
            assert_eq!(last.len, total - (spans.len() as u64 - 1) * c);
        }
    }

    #[test]
    fn empty_payload_has_no_chunks() {
        assert!(partition(0, 10).is_empty());
        assert_eq!(chunk_at(5, 5, 10), None);
    }

    #[test]
    fn aligns_chunk_sizes() {
        assert_eq!(align_chunk_size(1), CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(3 * CHUNK_ALIGNMENT + 5), 3 * CHUNK_ALIGNMENT);
        assert_eq!(align_chunk_size(DEFAULT_CHUNK_SIZE), DEFAULT_CHUNK_SIZE);
    }
}
