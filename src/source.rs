//! Source wrapper (C2): a tagged, reference-counted handle over one of
//! {in-memory bytes, seekable file, seekable stream}, with a busy latch
//! that serializes reopen of non-rewindable stream sources.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{LpError, Result};

/// Combined `Read + Seek` trait object bound, used for stream sources.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Shared state backing a `Source::Stream` variant: the pre-opened
/// seekable handle plus its busy latch.
pub struct StreamState {
    inner: Mutex<Box<dyn ReadSeek + Send>>,
    busy: AtomicBool,
}

impl StreamState {
    fn new(inner: Box<dyn ReadSeek + Send>) -> Self {
        Self {
            inner: Mutex::new(inner),
            busy: AtomicBool::new(false),
        }
    }
}

/// A tagged handle over one of three backing stores. Cheap to clone: the
/// payload itself is shared via `Arc`.
#[derive(Clone)]
pub enum Source {
    /// An immutable in-memory buffer; rewindable, freely shareable.
    Bytes(Arc<[u8]>),
    /// A filesystem path opened on demand; rewindable, each reopen issues
    /// a fresh file handle.
    File(Arc<PathBuf>),
    /// A pre-opened seekable handle, shared with a busy latch that fails
    /// fast on overlapping opens rather than interleaving reads.
    Stream(Arc<StreamState>),
}

/// A byte reader positioned at offset 0 of a `Source`, yielded by
/// `Source::open_reader`.
pub enum SourceReader {
    /// Backed by an in-memory buffer.
    Bytes(Cursor<Arc<[u8]>>),
    /// Backed by a freshly opened file handle.
    File(File),
    /// Backed by the shared, latched stream handle.
    Stream(Arc<StreamState>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SourceReader::Bytes(c) => c.read(buf),
            SourceReader::File(f) => f.read(buf),
            SourceReader::Stream(state) => {
                let mut guard = state.inner.lock().expect("stream source poisoned");
                guard.read(buf)
            }
        }
    }
}

impl Source {
    /// Wraps `buf` as a rewindable, unbounded-reads in-memory source.
    pub fn from_bytes(buf: impl Into<Arc<[u8]>>) -> Self {
        Source::Bytes(buf.into())
    }

    /// Wraps `path` as a rewindable file source; each reopen issues a
    /// fresh file handle.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Source::File(Arc::new(path.into()))
    }

    /// Wraps a pre-opened seekable handle. The caller is responsible for
    /// having drained non-seekable input into bytes first (see
    /// `Reader::add_from_stream`'s ingestion policy).
    pub fn from_stream(stream: impl ReadSeek + Send + 'static) -> Self {
        Source::Stream(Arc::new(StreamState::new(Box::new(stream))))
    }

    /// The declared size of a `Bytes` source, if known without I/O.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Source::Bytes(b) => Some(b.len() as u64),
            _ => None,
        }
    }

    /// Yields a fresh byte reader positioned at offset 0.
    ///
    /// `Bytes` and `File` sources have no latch and may be opened
    /// concurrently without limit. A `Stream` source fails fast with
    /// `SourceBusy` if another reader already holds its latch.
    pub fn open_reader(&self) -> Result<SourceReader> {
        match self {
            Source::Bytes(b) => Ok(SourceReader::Bytes(Cursor::new(b.clone()))),
            Source::File(path) => Ok(SourceReader::File(File::open(path.as_path())?)),
            Source::Stream(state) => {
                if state
                    .busy
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return Err(LpError::SourceBusy);
                }
                {
                    let mut guard = state.inner.lock().expect("stream source poisoned");
                    if let Err(e) = guard.seek(SeekFrom::Start(0)) {
                        drop(guard);
                        state.busy.store(false, Ordering::Release);
                        return Err(LpError::Io(e));
                    }
                }
                Ok(SourceReader::Stream(state.clone()))
            }
        }
    }

    /// Releases the busy latch if `self` is stream-backed. Idempotent
    /// with respect to non-latched variants.
    pub fn close_reader(&self, _reader: SourceReader) {
        if let Source::Stream(state) = self {
            state.busy.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as StdCursor;

    #[test]
    fn bytes_source_allows_concurrent_opens() {
        let source = Source::from_bytes(Arc::<[u8]>::from(&b"hello"[..]));
        let mut r1 = source.open_reader().unwrap();
        let mut r2 = source.open_reader().unwrap();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        r1.read_to_end(&mut buf1).unwrap();
        r2.read_to_end(&mut buf2).unwrap();
        assert_eq!(buf1, b"hello");
        assert_eq!(buf2, b"hello");
    }

    #[test]
    fn stream_source_rejects_concurrent_open() {
        let source = Source::from_stream(StdCursor::new(b"data".to_vec()));
        let _r1 = source.open_reader().unwrap();
        let err = source.open_reader().unwrap_err();
        assert!(matches!(err, LpError::SourceBusy));
    }

    #[test]
    fn stream_source_reopens_after_close() {
        let source = Source::from_stream(StdCursor::new(b"data".to_vec()));
        let r1 = source.open_reader().unwrap();
        source.close_reader(r1);
        let mut r2 = source.open_reader().unwrap();
        let mut buf = Vec::new();
        r2.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"data");
    }
}
