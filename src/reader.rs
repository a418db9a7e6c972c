//! Reader VFS (C6): ingests one or more sealed packs into a unified
//! index and serves `contains`/`open`/`query_info` against the combined
//! namespace.
//!
//! Ingestion only walks headers (skipping each entry's payload) so that
//! indexing a pack costs one linear scan with no decompression of data
//! nobody asked for yet. Every `IndexEntry` keeps a shared handle to the
//! `Source` its originating pack came from; `open` and `query_info` each
//! re-open that `Source` and re-walk headers until they reach the target
//! pathname, since the archive format has no seek-by-name. This is also
//! what makes the busy-latch behavior on non-rewindable `Stream` sources
//! observable from the VFS: two concurrent `open` calls against entries
//! sharing such a source race on the same latch, and the loser gets
//! `SourceBusy` (§5, testable property 8).

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

use log::{debug, warn};

use crate::cancel::CancellationToken;
use crate::codec::ArchiveReader;
use crate::error::{LpError, Result};
use crate::path::{canonicalize_path, strip_root, MANIFEST_PATH};
use crate::source::{ReadSeek, Source, SourceReader};
use crate::stream::Stream;

struct IndexEntry {
    source: Source,
}

/// Attribute projection returned by `query_info`. Every field is an
/// `Option`: a field is `Some` only if its attribute key was present in
/// the query string passed to `query_info` (or the query was `"*"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Info {
    /// `standard::name` — basename of the entry's canonical path.
    pub name: Option<String>,
    /// `standard::display-name` — currently identical to `name`.
    pub display_name: Option<String>,
    /// `standard::edit-name` — currently identical to `name`.
    pub edit_name: Option<String>,
    /// `standard::copy-name` — the root-relative full path.
    pub copy_name: Option<String>,
    /// `standard::type` — always `"regular"`; the format carries no
    /// other entry types.
    pub file_type: Option<String>,
    /// `standard::is-hidden` — whether the basename starts with `.`.
    pub is_hidden: Option<bool>,
    /// `standard::size` — payload size in bytes.
    pub size: Option<u64>,
    /// `standard::allocated-size` — bytes actually allocated; equal to
    /// `size` for this format.
    pub allocated_size: Option<u64>,
    /// `standard::symlink-target` — always `None`; the format carries
    /// no symlink entries, but the attribute is still queryable.
    pub symlink_target: Option<Option<String>>,
    /// `access::can-read` — always `true`; every ingested entry is
    /// readable.
    pub readable: Option<bool>,
    /// `time::access` — last-access time, if the entry carried one.
    pub atime: Option<Option<i64>>,
    /// `time::changed` — last-metadata-change time, if the entry
    /// carried one.
    pub ctime: Option<Option<i64>>,
    /// `time::created` — creation time, if the entry carried one.
    pub birthtime: Option<Option<i64>>,
}

/// Parses a comma-separated attribute query string (GIO-style keys like
/// `standard::size`, or `*` for all attributes) into a lookup set.
struct AttrQuery {
    all: bool,
    keys: std::collections::HashSet<String>,
}

impl AttrQuery {
    fn parse(attrs: &str) -> Self {
        let trimmed = attrs.trim();
        if trimmed == "*" {
            return Self {
                all: true,
                keys: std::collections::HashSet::new(),
            };
        }
        let keys = trimmed
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { all: false, keys }
    }

    fn wants(&self, key: &str) -> bool {
        self.all || self.keys.contains(key)
    }
}

/// Ordered, thread-safe index of `canonical_path -> Source`, built by
/// ingesting one or more packs. A colliding canonical path fails with
/// `DuplicateEntry`; entries already inserted earlier in the *same* scan
/// are not rolled back (§4.6 non-atomicity), but entries from previously
/// completed ingestions are always left untouched.
pub struct Reader {
    index: RwLock<BTreeMap<String, IndexEntry>>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(BTreeMap::new()),
        }
    }

    /// Ingests a whole pack already held in memory.
    pub fn add_from_bytes(&mut self, bytes: impl Into<std::sync::Arc<[u8]>>) -> Result<()> {
        self.scanpack(Source::Bytes(bytes.into()), None)
    }

    /// Ingests a pack from a filesystem path, opened fresh for the scan
    /// and again on every later `open`/`query_info`.
    pub fn add_from_file(&mut self, path: &Path) -> Result<()> {
        self.scanpack(Source::from_file(path), None)
    }

    /// Thin adapter over `add_from_file` taking a filename.
    pub fn add_from_filename(&mut self, filename: &str) -> Result<()> {
        self.add_from_file(Path::new(filename))
    }

    /// Ingests a pack from a pre-opened seekable handle; the handle is
    /// kept open and reused by later `open`/`query_info` calls, latched
    /// against concurrent reopen since it cannot be read by two readers
    /// at once.
    pub fn add_from_stream(&mut self, stream: impl ReadSeek + Send + 'static) -> Result<()> {
        self.scanpack(Source::from_stream(stream), None)
    }

    /// Ingests a pack from a non-seekable reader by draining it into
    /// memory first, then delegating to `add_from_bytes`.
    pub fn add_from_reader(&mut self, mut reader: impl Read) -> Result<()> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.add_from_bytes(buf)
    }

    /// Same as `add_from_bytes`, but checks `token` at every header-walk
    /// checkpoint (§5). On observed cancellation, returns `Cancelled` and
    /// retains whatever entries this scan had already inserted.
    pub fn add_from_bytes_cancelable(
        &mut self,
        bytes: impl Into<std::sync::Arc<[u8]>>,
        token: &CancellationToken,
    ) -> Result<()> {
        self.scanpack(Source::Bytes(bytes.into()), Some(token))
    }

    /// Same as `add_from_file`, but checks `token` at every header-walk
    /// checkpoint, including before the initial file open (§5).
    pub fn add_from_file_cancelable(&mut self, path: &Path, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(LpError::Cancelled);
        }
        self.scanpack(Source::from_file(path), Some(token))
    }

    /// Same as `add_from_stream`, but checks `token` at every header-walk
    /// checkpoint (§5).
    pub fn add_from_stream_cancelable(
        &mut self,
        stream: impl ReadSeek + Send + 'static,
        token: &CancellationToken,
    ) -> Result<()> {
        self.scanpack(Source::from_stream(stream), Some(token))
    }

    fn scanpack(&mut self, source: Source, token: Option<&CancellationToken>) -> Result<()> {
        let raw = source.open_reader().map_err(|e| match e {
            LpError::Io(io_err) => LpError::Open(io_err.to_string()),
            other => other,
        })?;
        let mut archive = ArchiveReader::new(raw);
        let mut index = self.index.write().expect("reader index poisoned");

        loop {
            if token.is_some_and(|t| t.is_cancelled()) {
                let raw = archive.into_inner();
                source.close_reader(raw);
                return Err(LpError::Cancelled);
            }

            let header = match archive.next_header() {
                Ok(Some(h)) => h,
                Ok(None) => break,
                Err(e) => {
                    let raw = archive.into_inner();
                    source.close_reader(raw);
                    return Err(e);
                }
            };

            if header.pathname == MANIFEST_PATH {
                debug!("skipping manifest entry during scan");
                continue;
            }

            let canon = canonicalize_path(&header.pathname);
            if index.contains_key(&canon) {
                warn!("duplicate entry '{canon}' across ingested packs");
                let raw = archive.into_inner();
                source.close_reader(raw);
                return Err(LpError::DuplicateEntry(canon));
            }
            index.insert(
                canon,
                IndexEntry {
                    source: source.clone(),
                },
            );
        }

        let raw = archive.into_inner();
        source.close_reader(raw);
        Ok(())
    }

    /// Reports whether `path` (in any form `canonicalize_path` accepts)
    /// resolves to an ingested entry.
    pub fn contains(&self, path: &str) -> bool {
        let canon = canonicalize_path(path);
        self.index
            .read()
            .expect("reader index poisoned")
            .contains_key(&canon)
    }

    fn entry_source(&self, canon: &str) -> Result<Source> {
        let index = self.index.read().expect("reader index poisoned");
        index
            .get(canon)
            .map(|e| e.source.clone())
            .ok_or_else(|| LpError::NotFound(canon.to_string()))
    }

    /// Re-opens `source` and linearly walks headers until `canon` is
    /// reached, returning the positioned decoder together with the
    /// header it stopped on. Releases the source's busy latch itself on
    /// every error path; the caller owns release on success.
    fn locate(source: &Source, canon: &str) -> Result<(ArchiveReader<SourceReader>, crate::codec::EntryHeader)> {
        let raw = source.open_reader()?;
        let mut archive = ArchiveReader::new(raw);
        loop {
            match archive.next_header() {
                Ok(Some(h)) => {
                    if canonicalize_path(&h.pathname) == canon {
                        return Ok((archive, h));
                    }
                }
                Ok(None) => {
                    let raw = archive.into_inner();
                    source.close_reader(raw);
                    return Err(LpError::NotFound(canon.to_string()));
                }
                Err(e) => {
                    let raw = archive.into_inner();
                    source.close_reader(raw);
                    return Err(e);
                }
            }
        }
    }

    /// Opens a readable stream over the entry at `path`. Each call
    /// re-opens the originating pack's `Source` and re-walks its headers
    /// to the target entry — the format has no seek-by-name (§4.6).
    pub fn open(&self, path: &str) -> Result<Stream> {
        let canon = canonicalize_path(path);
        let source = self.entry_source(&canon)?;
        let (decoder, _header) = Self::locate(&source, &canon)?;
        Ok(Stream::new(source, decoder))
    }

    /// Populates an `Info` projection for `path`, restricted to the
    /// attributes named in `attrs` (a comma-separated list of keys like
    /// `standard::name,standard::size`, or `*` for every attribute).
    /// Fields whose key was not requested are left `None`.
    pub fn query_info(&self, path: &str, attrs: &str) -> Result<Info> {
        let canon = canonicalize_path(path);
        let source = self.entry_source(&canon)?;
        let (decoder, header) = Self::locate(&source, &canon)?;
        let raw = decoder.into_inner();
        source.close_reader(raw);

        let query = AttrQuery::parse(attrs);
        let root_relative = strip_root(&canon);
        let name = root_relative
            .rsplit('/')
            .next()
            .unwrap_or(root_relative)
            .to_string();

        let mut info = Info::default();
        if query.wants("standard::name") {
            info.name = Some(name.clone());
        }
        if query.wants("standard::display-name") {
            info.display_name = Some(name.clone());
        }
        if query.wants("standard::edit-name") {
            info.edit_name = Some(name.clone());
        }
        if query.wants("standard::copy-name") {
            info.copy_name = Some(root_relative.to_string());
        }
        if query.wants("standard::type") {
            info.file_type = Some("regular".to_string());
        }
        if query.wants("standard::is-hidden") {
            info.is_hidden = Some(name.starts_with('.'));
        }
        if query.wants("standard::size") {
            info.size = Some(header.size);
        }
        if query.wants("standard::allocated-size") {
            info.allocated_size = Some(header.size);
        }
        if query.wants("standard::symlink-target") {
            info.symlink_target = Some(None);
        }
        if query.wants("access::can-read") {
            info.readable = Some(true);
        }
        if query.wants("time::access") {
            info.atime = Some(header.times.atime);
        }
        if query.wants("time::changed") {
            info.ctime = Some(header.times.ctime);
        }
        if query.wants("time::created") {
            info.birthtime = Some(header.times.birthtime);
        }
        Ok(info)
    }
}

/// Convenience wrapper ingesting a pack straight from a filesystem path,
/// mirroring `Builder::write_to_file`'s symmetry on the write side.
pub fn open_pack_file(path: &Path) -> Result<Reader> {
    let mut reader = Reader::new();
    reader.add_from_file(path)?;
    Ok(reader)
}
