//! File handles over a [`Stream`].
//!
//! Capabilities are split into two traits. [`Readable`] is implemented by
//! every handle; [`Writable`] only by handles opened for writing. Both are
//! provided entirely on top of a shared [`FileCore`], so a handle type only
//! has to expose its core.

use std::fmt;
use std::io::{self, SeekFrom};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{StreamError, StreamResult};
use crate::read::{ChunkReader, Chunks, Compression, Lines};
use crate::stream::Stream;

/// How a file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// `r`: read only; the file must exist.
    Read,
    /// `r+`: read and write; the file must exist.
    ReadWrite,
    /// `w`, `w+`: create, or truncate an existing file to zero.
    Write,
    /// `a`, `a+`: create if missing; every write goes to the end.
    Append,
}

impl FromStr for OpenMode {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::Read),
            "r+" => Ok(Self::ReadWrite),
            "w" | "w+" => Ok(Self::Write),
            "a" | "a+" => Ok(Self::Append),
            other => Err(StreamError::InvalidMode(other.to_string())),
        }
    }
}

/// State shared by every file handle: the owning stream, the file name,
/// the seek position, the readline cache and whether the handle is closed.
pub struct FileCore {
    stream: Arc<Stream>,
    name: String,
    mode: OpenMode,
    position: u64,
    /// Bytes read past the last returned line, keyed by the position they
    /// start at.
    readline_cache: Option<(u64, Vec<u8>)>,
    closed: bool,
}

impl FileCore {
    pub(crate) fn new(stream: Arc<Stream>, name: &str, mode: OpenMode) -> Self {
        Self {
            stream,
            name: name.to_string(),
            mode,
            position: 0,
            readline_cache: None,
            closed: false,
        }
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub(crate) fn ensure_open(&self) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

impl fmt::Debug for FileCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCore")
            .field("stream", &self.stream.name())
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Read access to a file of a stream.
pub trait Readable {
    fn core(&self) -> &FileCore;
    fn core_mut(&mut self) -> &mut FileCore;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn stream_name(&self) -> &str {
        self.core().stream.name()
    }

    /// Current size of the file.
    fn size(&self) -> StreamResult<u64> {
        let core = self.core();
        core.ensure_open()?;
        core.stream.file_size(&core.name)
    }

    /// Current position.
    fn tell(&self) -> u64 {
        self.core().position
    }

    /// Move the position, clamped to `[0, size]`.
    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        let size = self.size()?;
        let core = self.core_mut();
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(core.position) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
        };
        core.position = target.clamp(0, i128::from(size)) as u64;
        Ok(core.position)
    }

    /// Read up to `size` bytes at the current position and advance past them.
    fn read(&mut self, size: usize) -> StreamResult<Vec<u8>> {
        let core = self.core();
        core.ensure_open()?;
        let data = core.stream.read_file(&core.name, core.position, size as u64)?;
        self.core_mut().position += data.len() as u64;
        Ok(data)
    }

    /// Read up to `size` bytes at `offset` without moving the position.
    fn readfrom(&self, offset: u64, size: usize) -> StreamResult<Vec<u8>> {
        let core = self.core();
        core.ensure_open()?;
        core.stream.read_file(&core.name, offset, size as u64)
    }

    /// Read one line, including its `\n`, or at most `limit` bytes.
    ///
    /// Data is read in chunks; whatever follows the returned line is cached
    /// so the next call at the same position does not read it again.
    fn readline(&mut self, limit: Option<usize>) -> StreamResult<Vec<u8>> {
        self.core().ensure_open()?;
        let limit = limit.unwrap_or(usize::MAX);
        let chunk_size = self.core().stream.config().read_chunk_size.max(1);

        let core = self.core_mut();
        let mut data = match core.readline_cache.take() {
            Some((cached_at, cached)) if cached_at == core.position => {
                core.position += cached.len() as u64;
                cached
            }
            _ => Vec::new(),
        };

        while data.len() < limit && !data.contains(&b'\n') {
            let next = self.read(chunk_size)?;
            if next.is_empty() {
                break;
            }
            data.extend_from_slice(&next);
        }

        let line_end = data
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |i| i + 1)
            .min(limit);
        let rest = data.split_off(line_end);

        let core = self.core_mut();
        core.position -= rest.len() as u64;
        core.readline_cache = Some((core.position, rest));
        Ok(data)
    }

    /// Read lines until end of file, or until at least `sizehint` bytes
    /// have been returned.
    fn readlines(&mut self, sizehint: Option<usize>) -> StreamResult<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let line = self.readline(None)?;
            if line.is_empty() {
                break;
            }
            total += line.len();
            lines.push(line);
            if sizehint.is_some_and(|hint| total >= hint) {
                break;
            }
        }
        Ok(lines)
    }

    /// Iterate over lines from the current position.
    fn lines(&mut self) -> Lines<'_, Self>
    where
        Self: Sized,
    {
        Lines::new(self)
    }

    /// Iterate over the rest of the file in chunks of `chunk_size` bytes.
    fn readall(&mut self, chunk_size: usize) -> Chunks<'_, Self>
    where
        Self: Sized,
    {
        Chunks::new(self, chunk_size)
    }

    /// Read the whole file from the start, decompressing `.gz` and `.bz2`
    /// names on the fly. Other names are passed through unchanged.
    fn readall_decompressed(&mut self, chunk_size: usize) -> StreamResult<Box<dyn io::Read + '_>>
    where
        Self: Sized,
    {
        Readable::seek(self, SeekFrom::Start(0))?;
        let compression = Compression::from_name(self.name());
        let reader = ChunkReader::new(self.readall(chunk_size));
        Ok(compression.wrap(reader))
    }

    /// The file name with a compression suffix removed.
    fn decompressed_name(&self) -> &str {
        Compression::from_name(self.name()).strip_suffix(self.name())
    }

    /// A one-stream manifest (stream `.`) holding only this file.
    fn as_manifest(&self) -> StreamResult<String> {
        let core = self.core();
        core.ensure_open()?;
        core.stream.file_manifest(&core.name)
    }

    /// Close the handle. Every later operation except `close` fails with
    /// [`StreamError::Closed`].
    fn close(&mut self) -> StreamResult<()> {
        self.core_mut().closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.core().closed
    }
}

/// Write access to a file of a stream.
pub trait Writable: Readable {
    /// Write at the current position (at the end in append mode) and
    /// advance past the written bytes.
    fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        let offset = match self.core().mode {
            OpenMode::Append => self.size()?,
            _ => self.tell(),
        };
        self.writeto(offset, data)?;
        self.core_mut().position = offset + data.len() as u64;
        Ok(data.len())
    }

    /// Write at `offset` without moving the position. `offset` may be at
    /// most the current file size.
    fn writeto(&mut self, offset: u64, data: &[u8]) -> StreamResult<()> {
        let core = self.core_mut();
        core.ensure_open()?;
        core.readline_cache = None;
        core.stream.write_file(&core.name, offset, data)
    }

    fn writelines<I, B>(&mut self, lines: I) -> StreamResult<()>
    where
        Self: Sized,
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        for line in lines {
            Writable::write(self, line.as_ref())?;
        }
        Ok(())
    }

    /// Shrink the file to `size` bytes. Growing a file is rejected.
    fn truncate(&mut self, size: u64) -> StreamResult<()> {
        let core = self.core_mut();
        core.ensure_open()?;
        core.stream.truncate_file(&core.name, size)?;
        core.readline_cache = None;
        core.position = core.position.min(size);
        Ok(())
    }

    /// Persist buffered data of the owning stream.
    fn flush(&mut self) -> StreamResult<()> {
        let core = self.core();
        core.ensure_open()?;
        core.stream.flush()
    }
}

/// A file opened with [`OpenMode::Read`].
#[derive(Debug)]
pub struct ReadOnlyFile {
    core: FileCore,
}

impl ReadOnlyFile {
    pub(crate) fn new(core: FileCore) -> Self {
        Self { core }
    }
}

impl Readable for ReadOnlyFile {
    fn core(&self) -> &FileCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FileCore {
        &mut self.core
    }
}

/// A file opened for writing.
#[derive(Debug)]
pub struct WritableFile {
    core: FileCore,
}

impl WritableFile {
    pub(crate) fn new(core: FileCore) -> Self {
        Self { core }
    }
}

impl Readable for WritableFile {
    fn core(&self) -> &FileCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut FileCore {
        &mut self.core
    }

    /// Flush the owning stream, then close the handle.
    fn close(&mut self) -> StreamResult<()> {
        if !self.core.closed {
            self.core.stream.flush()?;
            self.core.closed = true;
        }
        Ok(())
    }
}

impl Writable for WritableFile {}

/// A handle returned by [`Stream::open`].
#[derive(Debug)]
pub enum StreamFile {
    ReadOnly(ReadOnlyFile),
    Writable(WritableFile),
}

impl StreamFile {
    /// The writable handle, if the file was opened for writing.
    pub fn writable(&mut self) -> Option<&mut WritableFile> {
        match self {
            Self::Writable(f) => Some(f),
            Self::ReadOnly(_) => None,
        }
    }

    pub fn into_writable(self) -> Option<WritableFile> {
        match self {
            Self::Writable(f) => Some(f),
            Self::ReadOnly(_) => None,
        }
    }
}

impl Readable for StreamFile {
    fn core(&self) -> &FileCore {
        match self {
            Self::ReadOnly(f) => f.core(),
            Self::Writable(f) => f.core(),
        }
    }

    fn core_mut(&mut self) -> &mut FileCore {
        match self {
            Self::ReadOnly(f) => f.core_mut(),
            Self::Writable(f) => f.core_mut(),
        }
    }

    fn close(&mut self) -> StreamResult<()> {
        match self {
            Self::ReadOnly(f) => f.close(),
            Self::Writable(f) => f.close(),
        }
    }
}

fn io_read<F: Readable>(file: &mut F, buf: &mut [u8]) -> io::Result<usize> {
    let data = Readable::read(file, buf.len())?;
    buf[..data.len()].copy_from_slice(&data);
    Ok(data.len())
}

fn io_seek<F: Readable>(file: &mut F, pos: SeekFrom) -> io::Result<u64> {
    Ok(Readable::seek(file, pos)?)
}

impl io::Read for ReadOnlyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io_read(self, buf)
    }
}

impl io::Seek for ReadOnlyFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        io_seek(self, pos)
    }
}

impl io::Read for WritableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io_read(self, buf)
    }
}

impl io::Seek for WritableFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        io_seek(self, pos)
    }
}

impl io::Write for WritableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Writable::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Writable::flush(self)?)
    }
}
