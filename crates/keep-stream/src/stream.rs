use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use keep_ranges::{locators_and_ranges, replace_range, total_size, LocatorAndRange, Range};
use keep_store::BlockStore;
use keep_types::Locator;

use crate::block::{BlockRef, BufferBlockId};
use crate::buffer::BufferBlock;
use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use crate::file::{FileCore, OpenMode, ReadOnlyFile, StreamFile, WritableFile};
use crate::format::{parse_line, write_line, FileEntry};

/// One stream of a manifest: a block list plus the files laid over it.
///
/// All state sits behind a single mutex. Index lookups and mutations take
/// the lock for their duration; block fetches run after it is released, so
/// readers on different threads only contend while resolving locators.
///
/// A stream is shared through `Arc`; file handles returned by
/// [`Stream::open`] hold a clone.
pub struct Stream {
    name: String,
    store: Arc<dyn BlockStore>,
    config: StreamConfig,
    state: Mutex<StreamState>,
}

/// Lock-protected state of a [`Stream`].
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    pub(crate) blocks: Vec<Range<BlockRef>>,
    pub(crate) files: Vec<FileEntry>,
    pub(crate) buffers: BTreeMap<BufferBlockId, BufferBlock>,
    pub(crate) current: Option<BufferBlockId>,
    next_buffer: u64,
}

/// A step of a read plan: bytes already in hand, or a slice of a stored
/// block that still has to be fetched.
#[derive(Debug)]
enum Piece {
    Ready(Vec<u8>),
    Fetch {
        locator: Locator,
        offset: u64,
        len: u64,
    },
}

/// Scoped access to a stream's index, holding the stream lock.
pub struct StreamGuard<'a> {
    state: MutexGuard<'a, StreamState>,
}

impl StreamGuard<'_> {
    /// The block list.
    pub fn blocks(&self) -> &[Range<BlockRef>] {
        &self.state.blocks
    }

    /// Size of the stream's address space.
    pub fn size(&self) -> u64 {
        total_size(&self.state.blocks)
    }

    /// File names in insertion order.
    pub fn file_names(&self) -> Vec<String> {
        self.state.files.iter().map(|f| f.name.clone()).collect()
    }

    /// Segment list of a file.
    pub fn segments(&self, name: &str) -> Option<&[Range<u64>]> {
        self.state
            .files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.segments.as_slice())
    }

    /// Resolve a range of the stream's address space against the block list.
    pub fn locators_and_ranges(&self, start: u64, size: u64) -> Vec<LocatorAndRange<BlockRef>> {
        locators_and_ranges(&self.state.blocks, start, size)
    }

    /// Number of accumulator blocks not yet persisted.
    pub fn buffered_blocks(&self) -> usize {
        self.state.buffers.len()
    }
}

impl Stream {
    /// Parse a manifest line into a stream.
    pub fn parse(
        line: &str,
        store: Arc<dyn BlockStore>,
        config: StreamConfig,
    ) -> StreamResult<Arc<Self>> {
        let parsed = parse_line(line)?;
        let state = StreamState {
            blocks: parsed.blocks,
            files: parsed.files,
            ..StreamState::default()
        };
        Ok(Arc::new(Self {
            name: parsed.name,
            store,
            config,
            state: Mutex::new(state),
        }))
    }

    /// A stream with no blocks and no files.
    pub fn empty(name: &str, store: Arc<dyn BlockStore>, config: StreamConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            store,
            config,
            state: Mutex::new(StreamState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Take the stream lock.
    pub fn lock(&self) -> StreamGuard<'_> {
        StreamGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Size of the stream's address space.
    pub fn size(&self) -> u64 {
        self.lock().size()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.lock().file_names()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.lock().segments(name).is_some()
    }

    pub fn file_size(&self, name: &str) -> StreamResult<u64> {
        Ok(self.lock().state.file(name)?.size())
    }

    /// Resolve a range of the stream's address space against the block list.
    pub fn locators_and_ranges(&self, start: u64, size: u64) -> Vec<LocatorAndRange<BlockRef>> {
        self.lock().locators_and_ranges(start, size)
    }

    /// Read `[start, start + size)` of the stream's address space, clipped
    /// to the stream's end.
    pub fn readfrom(&self, start: u64, size: u64) -> StreamResult<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let plan = {
            let guard = self.lock();
            guard.state.plan_stream_read(start, size)?
        };
        self.fetch(plan)
    }

    /// Open a file of this stream.
    ///
    /// `Read` and `ReadWrite` require the file to exist. `Write` creates the
    /// file or truncates it to zero. `Append` creates it if missing.
    pub fn open(self: &Arc<Self>, name: &str, mode: OpenMode) -> StreamResult<StreamFile> {
        if name.is_empty() || name.contains('/') {
            return Err(StreamError::InvalidFileName(name.to_string()));
        }

        {
            let mut guard = self.lock();
            let state = &mut guard.state;
            match mode {
                OpenMode::Read | OpenMode::ReadWrite => {
                    state.file(name)?;
                }
                OpenMode::Write => match state.file_index(name) {
                    Ok(index) => state.files[index].segments.clear(),
                    Err(_) => state.files.push(FileEntry::new(name)),
                },
                OpenMode::Append => {
                    if state.file_index(name).is_err() {
                        state.files.push(FileEntry::new(name));
                    }
                }
            }
        }

        tracing::debug!(stream = %self.name, file = name, ?mode, "opened file");
        let core = FileCore::new(Arc::clone(self), name, mode);
        Ok(match mode {
            OpenMode::Read => StreamFile::ReadOnly(ReadOnlyFile::new(core)),
            _ => StreamFile::Writable(WritableFile::new(core)),
        })
    }

    /// Remove a file from the stream. Its bytes stay in the block list until
    /// the next repack.
    pub fn remove(&self, name: &str) -> StreamResult<()> {
        let mut guard = self.lock();
        let index = guard.state.file_index(name)?;
        guard.state.files.remove(index);
        tracing::debug!(stream = %self.name, file = name, "removed file");
        Ok(())
    }

    /// Coalesce every file's segments and drop unreferenced buffered bytes.
    pub fn repack(&self) {
        self.lock().state.repack();
        tracing::debug!(stream = %self.name, "repacked stream");
    }

    /// Persist every buffered block and swap in its locator.
    pub fn flush(&self) -> StreamResult<()> {
        let mut guard = self.lock();
        let ids: Vec<BufferBlockId> = guard.state.buffers.keys().copied().collect();
        for id in ids {
            self.persist(&mut guard.state, id)?;
        }
        Ok(())
    }

    /// Repack, then flush.
    pub fn commit(&self) -> StreamResult<()> {
        self.repack();
        self.flush()
    }

    /// Serialize the stream as a manifest line. Fails while any written
    /// data is still buffered; call [`Stream::commit`] first.
    pub fn manifest_text(&self, strip: bool) -> StreamResult<String> {
        let guard = self.lock();
        write_line(&self.name, &guard.state.blocks, &guard.state.files, strip)
    }

    pub(crate) fn read_file(&self, name: &str, offset: u64, size: u64) -> StreamResult<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let plan = {
            let guard = self.lock();
            guard.state.plan_file_read(name, offset, size)?
        };
        self.fetch(plan)
    }

    pub(crate) fn write_file(&self, name: &str, offset: u64, data: &[u8]) -> StreamResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock();
        let filled = guard
            .state
            .write(name, offset, data, self.config.block_size)?;
        tracing::debug!(
            stream = %self.name,
            file = name,
            offset,
            len = data.len(),
            "wrote file range"
        );
        for id in filled {
            self.persist(&mut guard.state, id)?;
        }
        Ok(())
    }

    pub(crate) fn truncate_file(&self, name: &str, size: u64) -> StreamResult<()> {
        self.lock().state.truncate(name, size)?;
        tracing::debug!(stream = %self.name, file = name, size, "truncated file");
        Ok(())
    }

    /// A one-stream manifest named `.` holding only `name`.
    pub(crate) fn file_manifest(&self, name: &str) -> StreamResult<String> {
        let guard = self.lock();
        let state = &guard.state;
        let file = state.file(name)?;

        let mut blocks: Vec<Range<BlockRef>> = Vec::new();
        let mut starts: HashMap<Locator, u64> = HashMap::new();
        let mut single = FileEntry::new(name);

        for segment in &file.segments {
            let position = segment.locator + segment.segment_offset;
            for piece in locators_and_ranges(&state.blocks, position, segment.range_size) {
                let BlockRef::Stored(locator) = piece.locator else {
                    return Err(StreamError::UncommittedBuffers {
                        stream: self.name.clone(),
                        count: state.buffers.len(),
                    });
                };
                let start = match starts.get(&locator) {
                    Some(&start) => start,
                    None => {
                        let start = total_size(&blocks);
                        blocks.push(Range::new(
                            BlockRef::Stored(locator.clone()),
                            start,
                            locator.size(),
                            0,
                        ));
                        starts.insert(locator, start);
                        start
                    }
                };
                push_merged(
                    &mut single.segments,
                    start + piece.segment_offset,
                    piece.segment_size,
                );
            }
        }

        write_line(".", &blocks, &[single], false)
    }

    /// Fetch the stored pieces of a plan and concatenate everything in order.
    /// Runs without the stream lock.
    fn fetch(&self, plan: Vec<Piece>) -> StreamResult<Vec<u8>> {
        let policy = self.config.retry_policy();
        let mut fetched: HashMap<Locator, Bytes> = HashMap::new();
        let mut out = Vec::new();

        for piece in plan {
            match piece {
                Piece::Ready(data) => out.extend_from_slice(&data),
                Piece::Fetch {
                    locator,
                    offset,
                    len,
                } => {
                    let block = match fetched.get(&locator) {
                        Some(block) => block.clone(),
                        None => {
                            let block = policy
                                .run("get", || self.store.get(&locator))
                                .map_err(|source| StreamError::Fetch {
                                    locator: locator.clone(),
                                    offset,
                                    size: len,
                                    source,
                                })?;
                            fetched.insert(locator.clone(), block.clone());
                            block
                        }
                    };
                    let start = offset as usize;
                    let end = start + len as usize;
                    if block.len() < end {
                        return Err(StreamError::ShortBlock {
                            locator,
                            actual: block.len(),
                            needed: end,
                        });
                    }
                    out.extend_from_slice(&block[start..end]);
                }
            }
        }

        Ok(out)
    }

    /// Put one buffered block to the store and swap in its locator.
    fn persist(&self, state: &mut StreamState, id: BufferBlockId) -> StreamResult<()> {
        let Some(buffer) = state.buffers.get(&id) else {
            return Ok(());
        };
        if buffer.is_empty() {
            state.drop_buffer(id);
            return Ok(());
        }
        let locator = self
            .config
            .retry_policy()
            .run("put", || self.store.put(buffer.data()))?;
        tracing::debug!(stream = %self.name, buffer = %id, %locator, "persisted buffer block");
        state.swap_to_stored(id, locator);
        Ok(())
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StreamState {
    pub(crate) fn file_index(&self, name: &str) -> StreamResult<usize> {
        self.files
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| StreamError::FileNotFound(name.to_string()))
    }

    pub(crate) fn file(&self, name: &str) -> StreamResult<&FileEntry> {
        Ok(&self.files[self.file_index(name)?])
    }

    /// Resolve stream positions to buffered bytes or stored block slices.
    fn plan_stream_read(&self, start: u64, size: u64) -> StreamResult<Vec<Piece>> {
        locators_and_ranges(&self.blocks, start, size)
            .into_iter()
            .map(|piece| match piece.locator {
                BlockRef::Buffered(id) => match self.buffers.get(&id) {
                    Some(buffer) => Ok(Piece::Ready(
                        buffer.slice(piece.segment_offset, piece.segment_size).to_vec(),
                    )),
                    None => Err(StreamError::MissingBuffer(id)),
                },
                BlockRef::Stored(locator) => Ok(Piece::Fetch {
                    locator,
                    offset: piece.segment_offset,
                    len: piece.segment_size,
                }),
            })
            .collect()
    }

    /// Resolve a file range through its segments, then the block list.
    fn plan_file_read(&self, name: &str, offset: u64, size: u64) -> StreamResult<Vec<Piece>> {
        let file = self.file(name)?;
        let mut pieces = Vec::new();
        for seg in locators_and_ranges(&file.segments, offset, size) {
            pieces.extend(self.plan_stream_read(seg.locator + seg.segment_offset, seg.segment_size)?);
        }
        Ok(pieces)
    }

    /// The open accumulator, opening a new one if none is open or the open
    /// one is full.
    fn current_buffer(&mut self, capacity: usize) -> (BufferBlockId, &mut BufferBlock) {
        let id = match self.current {
            Some(id) if self.buffers.get(&id).is_some_and(|b| !b.is_full()) => id,
            _ => {
                let id = BufferBlockId(self.next_buffer);
                self.next_buffer += 1;
                self.current = Some(id);
                id
            }
        };
        let buffer = self
            .buffers
            .entry(id)
            .or_insert_with(|| BufferBlock::new(capacity));
        (id, buffer)
    }

    /// Append `data` to the accumulator and splice it into the file at
    /// `offset`. Returns the buffers that filled up along the way.
    fn write(
        &mut self,
        name: &str,
        offset: u64,
        data: &[u8],
        capacity: usize,
    ) -> StreamResult<Vec<BufferBlockId>> {
        let index = self.file_index(name)?;
        let size = self.files[index].size();
        if offset > size {
            return Err(StreamError::WriteBeyondEnd {
                name: name.to_string(),
                offset,
                size,
            });
        }

        let mut filled = Vec::new();
        let mut written = 0;
        while written < data.len() {
            let (id, buffer_offset, n, full) = {
                let (id, buffer) = self.current_buffer(capacity);
                let buffer_offset = buffer.len() as u64;
                let n = buffer.append(&data[written..]);
                (id, buffer_offset, n as u64, buffer.is_full())
            };

            // The open accumulator is always the last block-list entry.
            let stream_end = total_size(&self.blocks);
            replace_range(
                &mut self.blocks,
                stream_end,
                n,
                BlockRef::Buffered(id),
                buffer_offset,
            )?;
            let buffer_base = stream_end - buffer_offset;
            replace_range(
                &mut self.files[index].segments,
                offset + written as u64,
                n,
                buffer_base,
                buffer_offset,
            )?;

            written += n as usize;
            if full {
                self.current = None;
                filled.push(id);
            }
        }
        Ok(filled)
    }

    fn truncate(&mut self, name: &str, size: u64) -> StreamResult<()> {
        let index = self.file_index(name)?;
        let file = &mut self.files[index];
        let current = file.size();
        if size > current {
            return Err(StreamError::TruncateBeyondEnd {
                name: name.to_string(),
                requested: size,
                size: current,
            });
        }
        if size == current {
            return Ok(());
        }

        let mut position = 0;
        file.segments = locators_and_ranges(&file.segments, 0, size)
            .into_iter()
            .map(|piece| {
                let segment = Range::new(
                    piece.locator,
                    position,
                    piece.segment_size,
                    piece.segment_offset,
                );
                position += piece.segment_size;
                segment
            })
            .collect();
        Ok(())
    }

    /// Stream-wide repack.
    ///
    /// 1. Walk every file's segments in order and place the buffered bytes
    ///    they reference, so each buffer is rebuilt in reference order.
    /// 2. Build the new block list: buffers shrink to their referenced bytes,
    ///    empty entries disappear, offsets are renumbered. At the same time
    ///    build a translation index from old stream positions to new ones.
    /// 3. Rebuild the buffers and drop unreferenced ones.
    /// 4. Rewrite every file's segments through the translation, merging
    ///    pieces that are contiguous in the new stream.
    fn repack(&mut self) {
        let mut placements: BTreeMap<BufferBlockId, Placement> = BTreeMap::new();
        for file in &self.files {
            for segment in &file.segments {
                let position = segment.locator + segment.segment_offset;
                for piece in locators_and_ranges(&self.blocks, position, segment.range_size) {
                    if let BlockRef::Buffered(id) = piece.locator {
                        placements.entry(id).or_default().place(
                            piece.segment_offset,
                            piece.segment_offset + piece.segment_size,
                        );
                    }
                }
            }
        }

        // `None` marks old stream bytes nothing references.
        let mut translation: Vec<Range<Option<u64>>> = Vec::new();
        let mut blocks: Vec<Range<BlockRef>> = Vec::new();
        for entry in &self.blocks {
            if entry.range_size == 0 {
                continue;
            }
            let new_start = total_size(&blocks);
            let BlockRef::Buffered(id) = &entry.locator else {
                translation.push(Range::new(
                    Some(new_start),
                    entry.range_start,
                    entry.range_size,
                    0,
                ));
                blocks.push(Range::new(
                    entry.locator.clone(),
                    new_start,
                    entry.range_size,
                    entry.segment_offset,
                ));
                continue;
            };

            let mut pieces = placements
                .get(id)
                .map(|p| p.pieces.clone())
                .unwrap_or_default();
            pieces.sort_unstable();

            let local_end = entry.segment_offset + entry.range_size;
            let old_position = |local: u64| entry.range_start + (local - entry.segment_offset);
            let mut cursor = entry.segment_offset;
            let mut kept = 0;
            for (lo, hi, new_lo) in pieces {
                if lo > cursor {
                    translation.push(Range::new(None, old_position(cursor), lo - cursor, 0));
                }
                translation.push(Range::new(
                    Some(new_start + new_lo),
                    old_position(lo),
                    hi - lo,
                    0,
                ));
                kept += hi - lo;
                cursor = hi;
            }
            if cursor < local_end {
                translation.push(Range::new(
                    None,
                    old_position(cursor),
                    local_end - cursor,
                    0,
                ));
            }
            if kept > 0 {
                blocks.push(Range::new(entry.locator.clone(), new_start, kept, 0));
            }
        }

        for (id, buffer) in self.buffers.iter_mut() {
            let intervals: Vec<(u64, u64)> = placements
                .get(id)
                .map(|p| p.pieces.iter().map(|&(lo, hi, _)| (lo, hi)).collect())
                .unwrap_or_default();
            buffer.compact(&intervals);
        }
        self.buffers.retain(|_, buffer| !buffer.is_empty());
        if self.current.is_some_and(|id| !self.buffers.contains_key(&id)) {
            self.current = None;
        }

        for file in &mut self.files {
            let mut segments = Vec::new();
            for segment in &file.segments {
                let position = segment.locator + segment.segment_offset;
                for piece in locators_and_ranges(&translation, position, segment.range_size) {
                    // every referenced byte was placed above
                    if let Some(new_start) = piece.locator {
                        push_merged(
                            &mut segments,
                            new_start + piece.segment_offset,
                            piece.segment_size,
                        );
                    }
                }
            }
            file.segments = segments;
        }
        self.blocks = blocks;
    }

    fn swap_to_stored(&mut self, id: BufferBlockId, locator: Locator) {
        for entry in &mut self.blocks {
            if entry.locator == BlockRef::Buffered(id) {
                entry.locator = BlockRef::Stored(locator.clone());
            }
        }
        self.drop_buffer(id);
    }

    fn drop_buffer(&mut self, id: BufferBlockId) {
        self.buffers.remove(&id);
        if self.current == Some(id) {
            self.current = None;
        }
    }
}

/// Append `size` bytes at stream position `position` to a segment list,
/// extending the last segment when the bytes continue it.
fn push_merged(segments: &mut Vec<Range<u64>>, position: u64, size: u64) {
    if let Some(last) = segments.last_mut() {
        if last.locator + last.segment_offset + last.range_size == position {
            last.range_size += size;
            return;
        }
    }
    let start = total_size(segments);
    segments.push(Range::new(position, start, size, 0));
}

/// Where the referenced bytes of one buffer land when it is rebuilt.
#[derive(Debug, Default)]
struct Placement {
    /// `(old_lo, old_hi, new_lo)` in placement order.
    pieces: Vec<(u64, u64, u64)>,
    kept: u64,
}

impl Placement {
    /// Place `[lo, hi)` after everything placed so far. Bytes an earlier
    /// reference already placed keep their first position.
    fn place(&mut self, lo: u64, hi: u64) {
        let mut gaps = vec![(lo, hi)];
        for &(placed_lo, placed_hi, _) in &self.pieces {
            gaps = gaps
                .into_iter()
                .flat_map(|(gap_lo, gap_hi)| {
                    let left = (gap_lo, placed_lo.min(gap_hi));
                    let right = (placed_hi.max(gap_lo), gap_hi);
                    [left, right].into_iter().filter(|(l, h)| h > l)
                })
                .collect();
        }

        for (gap_lo, gap_hi) in gaps {
            match self.pieces.last_mut() {
                Some(last) if last.1 == gap_lo && last.2 + (last.1 - last.0) == self.kept => {
                    last.1 = gap_hi;
                }
                _ => self.pieces.push((gap_lo, gap_hi, self.kept)),
            }
            self.kept += gap_hi - gap_lo;
        }
    }
}
