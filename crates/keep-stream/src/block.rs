use std::fmt;

use keep_types::Locator;

/// Identifier of an in-memory accumulator block, unique within its stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferBlockId(pub(crate) u64);

impl fmt::Display for BufferBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bufferblock{}", self.0)
    }
}

/// Locator type of a stream's block list.
///
/// Persisted blocks are referenced by their content locator. Bytes written
/// since the last flush live in an accumulator block and are referenced by
/// its transient id until the block is persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BlockRef {
    Stored(Locator),
    Buffered(BufferBlockId),
}

impl BlockRef {
    pub fn is_buffered(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(locator) => locator.fmt(f),
            Self::Buffered(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(BlockRef::Buffered(BufferBlockId(3)).to_string(), "bufferblock3");
        assert_eq!(
            BlockRef::Stored(Locator::empty()).to_string(),
            "d41d8cd98f00b204e9800998ecf8427e+0"
        );
    }
}
