use std::sync::Arc;

use keep_store::BlockStore;
use keep_types::split_path;

use crate::config::StreamConfig;
use crate::error::{StreamError, StreamResult};
use crate::file::{OpenMode, StreamFile};
use crate::stream::Stream;

/// A whole manifest: one [`Stream`] per line, in order.
pub struct Manifest {
    streams: Vec<Arc<Stream>>,
    store: Arc<dyn BlockStore>,
    config: StreamConfig,
}

impl Manifest {
    /// A manifest with no streams.
    pub fn new(store: Arc<dyn BlockStore>, config: StreamConfig) -> Self {
        Self {
            streams: Vec::new(),
            store,
            config,
        }
    }

    /// Parse manifest text. Blank lines are skipped; errors carry the
    /// 1-based line number.
    pub fn parse(
        text: &str,
        store: Arc<dyn BlockStore>,
        config: StreamConfig,
    ) -> StreamResult<Self> {
        let mut streams = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let stream = Stream::parse(line, Arc::clone(&store), config.clone()).map_err(|e| {
                StreamError::Manifest {
                    line: index + 1,
                    source: Box::new(e),
                }
            })?;
            streams.push(stream);
        }
        tracing::debug!(streams = streams.len(), "parsed manifest");
        Ok(Self {
            streams,
            store,
            config,
        })
    }

    pub fn streams(&self) -> &[Arc<Stream>] {
        &self.streams
    }

    pub fn stream(&self, name: &str) -> Option<&Arc<Stream>> {
        self.streams.iter().find(|s| s.name() == name)
    }

    /// `(stream name, file name, size)` for every file, in manifest order.
    pub fn files(&self) -> StreamResult<Vec<(String, String, u64)>> {
        let mut out = Vec::new();
        for stream in &self.streams {
            for file in stream.file_names() {
                let size = stream.file_size(&file)?;
                out.push((stream.name().to_string(), file, size));
            }
        }
        Ok(out)
    }

    /// Open `path` (`stream/file`, or a bare file name in stream `.`).
    ///
    /// Opening for `Write` or `Append` creates the stream if it is missing.
    pub fn open(&mut self, path: &str, mode: OpenMode) -> StreamResult<StreamFile> {
        let (stream_name, file_name) = split_path(path);
        let stream = match (self.stream(stream_name).cloned(), mode) {
            (Some(stream), _) => stream,
            (None, OpenMode::Write | OpenMode::Append) => {
                let stream = Stream::empty(stream_name, Arc::clone(&self.store), self.config.clone());
                self.streams.push(Arc::clone(&stream));
                stream
            }
            (None, _) => return Err(StreamError::FileNotFound(path.to_string())),
        };
        stream.open(file_name, mode)
    }

    /// Repack and flush every stream.
    pub fn commit(&self) -> StreamResult<()> {
        for stream in &self.streams {
            stream.commit()?;
        }
        Ok(())
    }

    /// Concatenated stream lines. Fails while any stream holds buffered data.
    pub fn manifest_text(&self, strip: bool) -> StreamResult<String> {
        self.streams
            .iter()
            .map(|s| s.manifest_text(strip))
            .collect()
    }
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("streams", &self.streams)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Readable, Writable};
    use keep_store::{FsBlockStore, InMemoryBlockStore};
    use keep_types::Locator;

    const COUNT: &str = "781e5e245d69b566979b86e28d23f2c7+10";
    const FOO: &str = "acbd18db4cc2f85cedef654fccc4a4d8+3";

    fn store() -> Arc<InMemoryBlockStore> {
        let store = Arc::new(InMemoryBlockStore::new());
        store.put(b"0123456789").unwrap();
        store.put(b"foo").unwrap();
        store
    }

    #[test]
    fn normalized_manifest_round_trips() {
        let text = format!(
            ". {COUNT} 0:10:count.txt\n./sub\\040dir {FOO} {COUNT} 0:3:foo 3:10:count\n"
        );
        let manifest = Manifest::parse(&text, store(), StreamConfig::default()).unwrap();
        assert_eq!(manifest.streams().len(), 2);
        assert_eq!(manifest.manifest_text(false).unwrap(), text);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = format!("\n. {COUNT} 0:10:a\n\n");
        let manifest = Manifest::parse(&text, store(), StreamConfig::default()).unwrap();
        assert_eq!(manifest.manifest_text(false).unwrap(), format!(". {COUNT} 0:10:a\n"));
    }

    #[test]
    fn parse_error_reports_line() {
        let text = format!(". {COUNT} 0:10:a\n. bogus\n");
        match Manifest::parse(&text, store(), StreamConfig::default()) {
            Err(StreamError::Manifest { line, source }) => {
                assert_eq!(line, 2);
                assert!(matches!(*source, StreamError::Format { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn files_lists_every_stream() {
        let text = format!(". {COUNT} 0:10:a\n./d {FOO} 0:3:b 0:0:c\n");
        let manifest = Manifest::parse(&text, store(), StreamConfig::default()).unwrap();
        assert_eq!(
            manifest.files().unwrap(),
            vec![
                (".".to_string(), "a".to_string(), 10),
                ("./d".to_string(), "b".to_string(), 3),
                ("./d".to_string(), "c".to_string(), 0),
            ]
        );
        assert!(manifest.stream("./d").is_some());
        assert!(manifest.stream("./e").is_none());
    }

    #[test]
    fn open_resolves_paths() {
        let text = format!(". {COUNT} 0:10:a\n./d {FOO} 0:3:b\n");
        let mut manifest = Manifest::parse(&text, store(), StreamConfig::default()).unwrap();
        let mut a = manifest.open("a", OpenMode::Read).unwrap();
        assert_eq!(a.read(3).unwrap(), b"012");
        let mut b = manifest.open("./d/b", OpenMode::Read).unwrap();
        assert_eq!(b.read(3).unwrap(), b"foo");
        assert!(matches!(
            manifest.open("./missing/x", OpenMode::Read),
            Err(StreamError::FileNotFound(_))
        ));
    }

    #[test]
    fn write_creates_stream_and_commit_persists() {
        let store = store();
        let mut manifest = Manifest::new(store.clone(), StreamConfig::default());
        let mut f = manifest
            .open("./new/hello.txt", OpenMode::Write)
            .unwrap()
            .into_writable()
            .unwrap();
        f.write(b"hello").unwrap();
        assert!(matches!(
            manifest.manifest_text(false),
            Err(StreamError::UncommittedBuffers { .. })
        ));

        manifest.commit().unwrap();
        let locator = Locator::for_data(b"hello");
        assert!(store.exists(&locator).unwrap());
        assert_eq!(
            manifest.manifest_text(false).unwrap(),
            format!("./new {locator} 0:5:hello.txt\n")
        );
    }

    #[test]
    fn strip_applies_to_every_stream() {
        let text = format!(". {COUNT}+K@zzzzz 0:10:a\n./d {FOO}+Afff@1 0:3:b\n");
        let manifest = Manifest::parse(&text, store(), StreamConfig::default()).unwrap();
        assert_eq!(
            manifest.manifest_text(true).unwrap(),
            format!(". {COUNT} 0:10:a\n./d {FOO} 0:3:b\n")
        );
    }

    #[test]
    fn reads_through_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsBlockStore::open(dir.path()).unwrap());
        let mut manifest = Manifest::new(store.clone(), StreamConfig::default());
        manifest
            .open("data.txt", OpenMode::Write)
            .unwrap()
            .into_writable()
            .unwrap()
            .write(b"on disk")
            .unwrap();
        manifest.commit().unwrap();
        let text = manifest.manifest_text(false).unwrap();

        let reopened = Manifest::parse(&text, store, StreamConfig::default()).unwrap();
        let stream = reopened.stream(".").unwrap();
        assert_eq!(stream.readfrom(0, 100).unwrap(), b"on disk");
    }
}
