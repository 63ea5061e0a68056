//! Sequential read helpers: chunk and line iterators, and decompression.

use std::io;
use std::iter::FusedIterator;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;

use crate::error::StreamResult;
use crate::file::Readable;

/// Chunks of a file from its position at creation to its end.
///
/// Ends after the first empty read or the first error. To read again, seek
/// and call [`Readable::readall`] once more.
pub struct Chunks<'a, F> {
    file: &'a mut F,
    chunk_size: usize,
    done: bool,
}

impl<'a, F: Readable> Chunks<'a, F> {
    pub(crate) fn new(file: &'a mut F, chunk_size: usize) -> Self {
        Self {
            file,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl<F: Readable> Iterator for Chunks<'_, F> {
    type Item = StreamResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.file.read(self.chunk_size) {
            Ok(data) if data.is_empty() => {
                self.done = true;
                None
            }
            Ok(data) => Some(Ok(data)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<F: Readable> FusedIterator for Chunks<'_, F> {}

/// Lines of a file from its current position, each with its `\n`.
pub struct Lines<'a, F> {
    file: &'a mut F,
    done: bool,
}

impl<'a, F: Readable> Lines<'a, F> {
    pub(crate) fn new(file: &'a mut F) -> Self {
        Self { file, done: false }
    }
}

impl<F: Readable> Iterator for Lines<'_, F> {
    type Item = StreamResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.file.readline(None) {
            Ok(line) if line.is_empty() => {
                self.done = true;
                None
            }
            Ok(line) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<F: Readable> FusedIterator for Lines<'_, F> {}

/// `io::Read` over an iterator of chunks.
pub struct ChunkReader<I> {
    chunks: I,
    pending: Vec<u8>,
    offset: usize,
}

impl<I> ChunkReader<I>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    pub fn new(chunks: I) -> Self {
        Self {
            chunks,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl<I> io::Read for ChunkReader<I>
where
    I: Iterator<Item = StreamResult<Vec<u8>>>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.chunks.next() {
                Some(chunk) => {
                    self.pending = chunk?;
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Compression format, chosen by file name suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    pub fn from_name(name: &str) -> Self {
        if name.ends_with(".gz") {
            Self::Gzip
        } else if name.ends_with(".bz2") {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
        }
    }

    /// `name` without this format's suffix.
    pub fn strip_suffix(self, name: &str) -> &str {
        name.strip_suffix(self.suffix()).unwrap_or(name)
    }

    /// Wrap `reader` in the matching streaming decoder. Concatenated
    /// members are decoded as one stream.
    pub fn wrap<'a, R: io::Read + 'a>(self, reader: R) -> Box<dyn io::Read + 'a> {
        match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::sync::Arc;

    use crate::config::StreamConfig;
    use crate::file::OpenMode;
    use crate::stream::Stream;
    use keep_store::{BlockStore, InMemoryBlockStore};

    fn stream_with(name: &str, content: &[u8]) -> Arc<Stream> {
        let store = Arc::new(InMemoryBlockStore::new());
        let locator = store.put(content).unwrap();
        Stream::parse(
            &format!(". {locator} 0:{}:{name}", content.len()),
            store,
            StreamConfig::default(),
        )
        .unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn chunks_cover_the_rest_of_the_file() {
        let stream = stream_with("f", b"0123456789");
        let mut f = stream.open("f", OpenMode::Read).unwrap();
        f.seek(io::SeekFrom::Start(1)).unwrap();
        let chunks: Vec<Vec<u8>> = f.readall(4).collect::<StreamResult<_>>().unwrap();
        assert_eq!(chunks, vec![b"1234".to_vec(), b"5678".to_vec(), b"9".to_vec()]);
    }

    #[test]
    fn chunks_are_fused_and_restartable() {
        let stream = stream_with("f", b"abc");
        let mut f = stream.open("f", OpenMode::Read).unwrap();
        {
            let mut chunks = f.readall(8);
            assert_eq!(chunks.next().unwrap().unwrap(), b"abc");
            assert!(chunks.next().is_none());
            assert!(chunks.next().is_none());
        }
        f.seek(io::SeekFrom::Start(0)).unwrap();
        assert_eq!(f.readall(8).count(), 1);
    }

    #[test]
    fn chunk_reader_spans_chunks() {
        let chunks = vec![Ok(b"ab".to_vec()), Ok(Vec::new()), Ok(b"cde".to_vec())];
        let mut reader = ChunkReader::new(chunks.into_iter());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn compression_from_name() {
        assert_eq!(Compression::from_name("log.gz"), Compression::Gzip);
        assert_eq!(Compression::from_name("log.bz2"), Compression::Bzip2);
        assert_eq!(Compression::from_name("log.txt"), Compression::None);
        assert_eq!(Compression::Gzip.strip_suffix("log.gz"), "log");
        assert_eq!(Compression::None.strip_suffix("log.txt"), "log.txt");
    }

    #[test]
    fn gzip_file_is_decompressed() {
        let text = b"line one\nline two\n".repeat(50);
        let stream = stream_with("log.gz", &gzip(&text));
        let mut f = stream.open("log.gz", OpenMode::Read).unwrap();
        assert_eq!(f.decompressed_name(), "log");

        // start from the middle to check the rewind
        f.seek(io::SeekFrom::Start(5)).unwrap();
        let mut out = Vec::new();
        f.readall_decompressed(7).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn concatenated_gzip_members() {
        let mut data = gzip(b"first ");
        data.extend(gzip(b"second"));
        let stream = stream_with("two.gz", &data);
        let mut f = stream.open("two.gz", OpenMode::Read).unwrap();
        let mut out = String::new();
        f.readall_decompressed(1024)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "first second");
    }

    #[test]
    fn bzip2_file_is_decompressed() {
        let text = b"bzip2 payload ".repeat(20);
        let stream = stream_with("data.bz2", &bzip2(&text));
        let mut f = stream.open("data.bz2", OpenMode::Read).unwrap();
        assert_eq!(f.decompressed_name(), "data");
        let mut out = Vec::new();
        f.readall_decompressed(16).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn plain_file_passes_through() {
        let stream = stream_with("plain.txt", b"as is");
        let mut f = stream.open("plain.txt", OpenMode::Read).unwrap();
        let mut out = Vec::new();
        f.readall_decompressed(2).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"as is");
    }

    #[test]
    fn corrupt_gzip_is_an_io_error() {
        let stream = stream_with("bad.gz", b"not gzip at all");
        let mut f = stream.open("bad.gz", OpenMode::Read).unwrap();
        let mut out = Vec::new();
        assert!(f
            .readall_decompressed(64)
            .unwrap()
            .read_to_end(&mut out)
            .is_err());
    }
}
