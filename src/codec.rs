//! Archive codec (C3): a streaming compressor wrapping a framed sequence
//! of entries `(pathname, size, file_type=regular, mode=0644, payload)`.
//!
//! Write and read both bind a single outer compression filter (deflate,
//! via `flate2`) around the frame stream; the reader rejects nothing else
//! because it never looks at a filter tag — the pack format fixes the
//! filter at build time, as spec.md §6.1 requires.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{LpError, Result};

/// Chunk size used for payload writes, bounding stack usage without
/// affecting throughput for the already-compressed stream.
const CHUNK_SIZE: usize = 512;

/// Regular-file type tag recorded per entry (the only type this format
/// supports; see spec.md §6.1).
pub const FILE_TYPE_REGULAR: u8 = 0;

/// Fixed permission bits recorded per entry.
pub const DEFAULT_MODE: u16 = 0o644;

/// Optional per-entry timestamps, preserved only if present on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTimes {
    /// Last-access time, Unix seconds.
    pub atime: Option<i64>,
    /// Last-metadata-change time, Unix seconds.
    pub ctime: Option<i64>,
    /// Creation time, Unix seconds.
    pub birthtime: Option<i64>,
}

/// Header of one archive entry, as read back by the scan walk.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    /// Root-relative pathname as recorded in the archive.
    pub pathname: String,
    /// Declared payload size in bytes.
    pub size: u64,
    /// Optional timestamps recorded alongside the entry.
    pub times: EntryTimes,
}

/// Writes framed entries through a single deflate stream.
pub struct ArchiveWriter<W: Write> {
    enc: GzEncoder<W>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Binds a writer over `sink`, selecting the fixed compression filter.
    pub fn new(sink: W) -> Self {
        Self {
            enc: GzEncoder::new(sink, Compression::default()),
        }
    }

    /// Writes one entry's header then its payload, read in full from
    /// `payload` and chunked into writes of at most `CHUNK_SIZE` bytes.
    /// A short write (fewer bytes accepted than offered) is fatal.
    pub fn write_entry(
        &mut self,
        pathname: &str,
        size: u64,
        times: EntryTimes,
        mut payload: impl Read,
    ) -> Result<()> {
        self.write_header(pathname, size, times)?;

        let mut remaining = size;
        let mut buf = [0u8; CHUNK_SIZE];
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            payload
                .read_exact(&mut buf[..want])
                .map_err(|e| LpError::Write(e.to_string()))?;
            self.write_all_checked(&buf[..want])?;
            remaining -= want as u64;
        }
        Ok(())
    }

    fn write_header(&mut self, pathname: &str, size: u64, times: EntryTimes) -> Result<()> {
        let name_bytes = pathname.as_bytes();
        self.write_all_checked(&(name_bytes.len() as u32).to_le_bytes())?;
        self.write_all_checked(name_bytes)?;
        self.write_all_checked(&size.to_le_bytes())?;
        self.write_all_checked(&[FILE_TYPE_REGULAR])?;
        self.write_all_checked(&DEFAULT_MODE.to_le_bytes())?;
        self.write_times(times)
    }

    fn write_times(&mut self, times: EntryTimes) -> Result<()> {
        for slot in [times.atime, times.ctime, times.birthtime] {
            match slot {
                Some(v) => {
                    self.write_all_checked(&[1u8])?;
                    self.write_all_checked(&v.to_le_bytes())?;
                }
                None => self.write_all_checked(&[0u8])?,
            }
        }
        Ok(())
    }

    fn write_all_checked(&mut self, buf: &[u8]) -> Result<()> {
        let n = self
            .enc
            .write(buf)
            .map_err(|e| LpError::Write(e.to_string()))?;
        if n != buf.len() {
            return Err(LpError::Write(format!(
                "short write: wrote {n} of {} bytes",
                buf.len()
            )));
        }
        Ok(())
    }

    /// Closes the writer, flushing the compression stream and returning
    /// the underlying sink. Any queued sink error takes priority over the
    /// codec's own error string (§7 propagation policy).
    pub fn finish(self) -> Result<W> {
        self.enc.finish().map_err(|e| LpError::Close(e.to_string()))
    }
}

/// Reads framed entries back out of a single deflate stream.
pub struct ArchiveReader<R: Read> {
    dec: GzDecoder<R>,
    current_remaining: u64,
}

impl<R: Read> ArchiveReader<R> {
    /// Binds a reader over `source`, selecting the fixed compression
    /// filter; readers must reject any other filter (this codec only
    /// ever speaks one, so there is nothing else to detect).
    pub fn new(source: R) -> Self {
        Self {
            dec: GzDecoder::new(source),
            current_remaining: 0,
        }
    }

    /// Releases the codec and returns the underlying reader, so the
    /// caller can hand it back to the `Source` that owns it.
    pub fn into_inner(self) -> R {
        self.dec.into_inner()
    }

    /// Advances past any unread payload of the current entry, then reads
    /// the next entry's header. Returns `Ok(None)` at end of archive.
    pub fn next_header(&mut self) -> Result<Option<EntryHeader>> {
        self.skip_remaining()?;

        let mut len_buf = [0u8; 4];
        match self.read_exact_or_eof(&mut len_buf)? {
            false => return Ok(None),
            true => {}
        }
        let name_len = u32::from_le_bytes(len_buf) as usize;

        let mut name_buf = vec![0u8; name_len];
        self.dec
            .read_exact(&mut name_buf)
            .map_err(|e| LpError::Scan(e.to_string()))?;
        let pathname = String::from_utf8(name_buf)
            .map_err(|e| LpError::Scan(format!("invalid utf-8 pathname: {e}")))?;

        let mut size_buf = [0u8; 8];
        self.dec
            .read_exact(&mut size_buf)
            .map_err(|e| LpError::Scan(e.to_string()))?;
        let size = u64::from_le_bytes(size_buf);

        let mut type_mode = [0u8; 3];
        self.dec
            .read_exact(&mut type_mode)
            .map_err(|e| LpError::Scan(e.to_string()))?;

        let times = self.read_times()?;

        self.current_remaining = size;
        Ok(Some(EntryHeader {
            pathname,
            size,
            times,
        }))
    }

    fn read_times(&mut self) -> Result<EntryTimes> {
        let mut times = EntryTimes::default();
        for slot in [
            &mut times.atime,
            &mut times.ctime,
            &mut times.birthtime,
        ] {
            let mut flag = [0u8; 1];
            self.dec
                .read_exact(&mut flag)
                .map_err(|e| LpError::Scan(e.to_string()))?;
            if flag[0] == 1 {
                let mut v = [0u8; 8];
                self.dec
                    .read_exact(&mut v)
                    .map_err(|e| LpError::Scan(e.to_string()))?;
                *slot = Some(i64::from_le_bytes(v));
            }
        }
        Ok(times)
    }

    /// Reads bytes of the currently-positioned entry's payload into
    /// `buf`. Returns `0` at entry EOF.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.current_remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(self.current_remaining) as usize;
        let n = self
            .dec
            .read(&mut buf[..want])
            .map_err(|e| LpError::Scan(e.to_string()))?;
        self.current_remaining -= n as u64;
        Ok(n)
    }

    fn skip_remaining(&mut self) -> Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];
        while self.current_remaining > 0 {
            let want = self.current_remaining.min(CHUNK_SIZE as u64) as usize;
            self.dec
                .read_exact(&mut buf[..want])
                .map_err(|e| LpError::Scan(e.to_string()))?;
            self.current_remaining -= want as u64;
        }
        Ok(())
    }

    /// Reads `buf.len()` bytes, returning `Ok(false)` if the stream was
    /// already at a clean end-of-archive boundary (zero bytes read), or
    /// propagating any other short-read as a scan error.
    fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut read = 0;
        while read < buf.len() {
            match self.dec.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        return Ok(false);
                    }
                    return Err(LpError::Scan("truncated entry header".to_string()));
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LpError::Scan(e.to_string())),
            }
        }
        Ok(true)
    }
}
