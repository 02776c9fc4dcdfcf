//! Fixed-size byte-range planning for chunked uploads.

/// Chunk size used for every upload session (5 MiB).
///
/// Graph requires fragment sizes that are multiples of 320 KiB; 5 MiB is 16 of them.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Inclusive byte range `[start, end]` of a source of `total` bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }

    /// Value of the `Content-Range` header for this range.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Splits `total` bytes into ascending ranges of at most `chunk_size`.
///
/// A zero-length source yields no ranges at all; callers that need to
/// reject empty files do so before planning.
#[derive(Clone, Copy, Debug)]
pub struct ByteRangeChunker {
    total: u64,
    chunk_size: u64,
}

impl ByteRangeChunker {
    /// Returns `None` when `chunk_size` is zero.
    pub fn new(total: u64, chunk_size: u64) -> Option<Self> {
        (chunk_size > 0).then_some(Self { total, chunk_size })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of ranges `ranges()` will yield.
    pub fn count(&self) -> u64 {
        self.total.div_ceil(self.chunk_size)
    }

    /// Fresh iterator starting at offset 0.
    pub fn ranges(&self) -> ByteRanges {
        ByteRanges {
            next_start: 0,
            total: self.total,
            chunk_size: self.chunk_size,
        }
    }
}

impl IntoIterator for ByteRangeChunker {
    type Item = ByteRange;
    type IntoIter = ByteRanges;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges()
    }
}

#[derive(Clone, Debug)]
pub struct ByteRanges {
    next_start: u64,
    total: u64,
    chunk_size: u64,
}

impl Iterator for ByteRanges {
    type Item = ByteRange;

    fn next(&mut self) -> Option<ByteRange> {
        if self.next_start >= self.total {
            return None;
        }
        let start = self.next_start;
        let len = self.chunk_size.min(self.total - start);
        self.next_start = start + len;
        Some(ByteRange {
            start,
            end: start + len - 1,
            total: self.total,
        })
    }
}
