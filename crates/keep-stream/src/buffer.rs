/// An in-memory accumulator block.
///
/// Written bytes are packed into a buffer block until it reaches capacity.
/// The owning stream then persists it as an ordinary block. A buffer block
/// never shrinks except through [`BufferBlock::compact`] during a repack.
#[derive(Debug, Clone)]
pub(crate) struct BufferBlock {
    data: Vec<u8>,
    capacity: usize,
}

impl BufferBlock {
    /// A zero capacity would never accept data, so it is raised to one byte.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    /// Append as much of `bytes` as fits. Returns the number of bytes taken.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity.saturating_sub(self.data.len()));
        self.data.extend_from_slice(&bytes[..n]);
        n
    }

    /// Bytes `[offset, offset + len)` of the block.
    pub(crate) fn slice(&self, offset: u64, len: u64) -> &[u8] {
        let start = (offset as usize).min(self.data.len());
        let end = start.saturating_add(len as usize).min(self.data.len());
        &self.data[start..end]
    }

    /// Keep only the given disjoint intervals, concatenated in the given order.
    pub(crate) fn compact(&mut self, intervals: &[(u64, u64)]) {
        let mut kept = Vec::with_capacity(self.data.len());
        for &(lo, hi) in intervals {
            kept.extend_from_slice(self.slice(lo, hi - lo));
        }
        self.data = kept;
    }
}
