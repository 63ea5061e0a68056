//! Manifest line grammar.
//!
//! ```text
//! line    ::= stream_name (" " locator)+ (" " segment)* "\n"
//! segment ::= position ":" size ":" file_name
//! ```
//!
//! Names are escaped with [`escape_name`]. A repeated file name appends a
//! segment at that file's current end, so the file-relative offset of a
//! segment is tracked separately from its stream position.

use keep_ranges::{total_size, Range};
use keep_types::{escape_name, unescape_name, Locator, EMPTY_BLOCK_LOCATOR};

use crate::block::BlockRef;
use crate::error::{StreamError, StreamResult};

/// One file of a stream: its name and its segment list.
///
/// Segment locators are stream positions; the bytes of a segment start at
/// stream position `locator + segment_offset`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub segments: Vec<Range<u64>>,
}

impl FileEntry {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            segments: Vec::new(),
        }
    }

    pub fn size(&self) -> u64 {
        total_size(&self.segments)
    }
}

/// A parsed manifest line.
#[derive(Debug)]
pub(crate) struct ParsedLine {
    pub name: String,
    pub blocks: Vec<Range<BlockRef>>,
    pub files: Vec<FileEntry>,
}

/// Parse one manifest line (with or without its trailing newline).
pub(crate) fn parse_line(line: &str) -> StreamResult<ParsedLine> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut tokens = line.split(' ');

    let name = match tokens.next() {
        Some(token) if !token.is_empty() => unescape_name(token),
        _ => return Err(StreamError::format(line, "missing stream name")),
    };

    let mut blocks: Vec<Range<BlockRef>> = Vec::new();
    let mut files: Vec<FileEntry> = Vec::new();
    let mut stream_size = 0u64;

    for token in tokens {
        if let Ok(locator) = token.parse::<Locator>() {
            if !files.is_empty() {
                return Err(StreamError::format(token, "block locator after file segments"));
            }
            let size = locator.size();
            blocks.push(Range::new(BlockRef::Stored(locator), stream_size, size, 0));
            stream_size += size;
            continue;
        }

        let Some((position, size, file_name)) = parse_segment(token) else {
            return Err(StreamError::format(token, "not a block locator or file segment"));
        };
        if blocks.is_empty() {
            return Err(StreamError::format(token, "file segment before any block locator"));
        }
        if file_name.is_empty() {
            return Err(StreamError::format(token, "empty file name"));
        }
        if position.checked_add(size).map_or(true, |end| end > stream_size) {
            return Err(StreamError::format(
                token,
                format!("segment extends past end of stream ({stream_size} bytes)"),
            ));
        }

        let file_name = unescape_name(file_name);
        let index = match files.iter().position(|f| f.name == file_name) {
            Some(index) => index,
            None => {
                files.push(FileEntry::new(file_name));
                files.len() - 1
            }
        };
        if size > 0 {
            let segments = &mut files[index].segments;
            let file_end = total_size(segments);
            segments.push(Range::new(position, file_end, size, 0));
        }
    }

    if blocks.is_empty() {
        return Err(StreamError::format(line, "stream has no block locators"));
    }

    tracing::debug!(
        stream = %name,
        blocks = blocks.len(),
        files = files.len(),
        "parsed manifest line"
    );
    Ok(ParsedLine {
        name,
        blocks,
        files,
    })
}

fn parse_segment(token: &str) -> Option<(u64, u64, &str)> {
    let mut parts = token.splitn(3, ':');
    let position = parse_decimal(parts.next()?)?;
    let size = parse_decimal(parts.next()?)?;
    Some((position, size, parts.next()?))
}

fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Serialize a stream as one manifest line, newline included.
///
/// With `strip`, locator hints are dropped. Buffered blocks have no
/// locator yet, so their presence is an error.
pub(crate) fn write_line(
    name: &str,
    blocks: &[Range<BlockRef>],
    files: &[FileEntry],
    strip: bool,
) -> StreamResult<String> {
    let buffered = blocks.iter().filter(|b| b.locator.is_buffered()).count();
    if buffered > 0 {
        return Err(StreamError::UncommittedBuffers {
            stream: name.to_string(),
            count: buffered,
        });
    }

    let mut out = escape_name(name);
    if blocks.is_empty() {
        out.push(' ');
        out.push_str(EMPTY_BLOCK_LOCATOR);
    }
    for block in blocks {
        if let BlockRef::Stored(locator) = &block.locator {
            out.push(' ');
            if strip {
                out.push_str(&locator.strip_hints().to_string());
            } else {
                out.push_str(&locator.to_string());
            }
        }
    }

    for file in files {
        let file_name = escape_name(&file.name);
        if file.segments.is_empty() {
            out.push_str(&format!(" 0:0:{file_name}"));
        }
        for segment in &file.segments {
            let position = segment.locator + segment.segment_offset;
            out.push_str(&format!(" {position}:{}:{file_name}", segment.range_size));
        }
    }

    out.push('\n');
    Ok(out)
}
