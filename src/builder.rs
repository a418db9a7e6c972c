//! Builder (C4): accumulates named byte sources under canonical logical
//! paths, then serializes them into a compressed, framed pack with a
//! leading manifest entry.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::debug;

use crate::cancel::CancellationToken;
use crate::codec::{ArchiveWriter, EntryTimes};
use crate::error::{LpError, Result};
use crate::path::{canonicalize_path, strip_root, MANIFEST_PATH};
use crate::source::Source;

/// The pack preamble: identity fields serialized as the first archive
/// entry under the reserved logical path `pack.manifest`.
#[derive(Debug, Clone, Default)]
pub struct ManifestRecord {
    /// The pack's declared name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
}

impl ManifestRecord {
    fn serialize(&self) -> Vec<u8> {
        let mut out = format!("[pack]\nname={}\n", self.name);
        if let Some(desc) = &self.description {
            out.push_str(&format!("description={desc}\n"));
        }
        out.into_bytes()
    }
}

struct Entry {
    source: Source,
    declared_size: u64,
}

/// Accumulates `(canonical_path -> Source + declared_size)` and seals them
/// into a pack. `add_*` calls with an existing canonical path overwrite
/// the previous entry (last-writer-wins), since callers may layer
/// defaults and then overrides.
pub struct Builder {
    manifest: ManifestRecord,
    entries: BTreeMap<String, Entry>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            manifest: ManifestRecord::default(),
            entries: BTreeMap::new(),
        }
    }

    /// Sets the pack's name.
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.manifest.name = name.into();
        self
    }

    /// Sets the pack's description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.manifest.description = Some(description.into());
        self
    }

    /// Adds `bytes` under `path`, wrapped as a `Source::Bytes`.
    pub fn add_from_bytes(&mut self, path: &str, bytes: impl Into<std::sync::Arc<[u8]>>) -> &mut Self {
        let bytes = bytes.into();
        let size = bytes.len() as u64;
        self.insert(path, Source::Bytes(bytes), size);
        self
    }

    /// Queries the size of `file` and adds it under `path`, wrapped as a
    /// `Source::File`.
    pub fn add_from_file(&mut self, path: &str, file: &Path) -> Result<&mut Self> {
        let size = file.metadata()?.len();
        self.insert(path, Source::from_file(file), size);
        Ok(self)
    }

    /// Thin adapter over `add_from_file` taking a filename.
    pub fn add_from_filename(&mut self, path: &str, filename: &str) -> Result<&mut Self> {
        self.add_from_file(path, Path::new(filename))
    }

    /// Adds a pre-opened, seekable stream under `path`. The caller must
    /// supply the declared size since the archive format requires
    /// length-prefixed entries.
    pub fn add_from_stream(
        &mut self,
        path: &str,
        stream: impl crate::source::ReadSeek + Send + 'static,
        size: u64,
    ) -> &mut Self {
        self.insert(path, Source::from_stream(stream), size);
        self
    }

    fn insert(&mut self, path: &str, source: Source, declared_size: u64) {
        let canon = canonicalize_path(path);
        self.entries.insert(
            canon,
            Entry {
                source,
                declared_size,
            },
        );
    }

    /// Emits the manifest then every entry, in ascending byte-lex order of
    /// canonical path, through the archive codec. Any write error aborts
    /// the remainder; the builder is not reusable after a failed seal.
    pub fn write_to(self, out: impl Write) -> Result<()> {
        self.write_to_inner(out, None)
    }

    /// Same as `write_to`, but checks `token` before writing each entry
    /// (§5's "write-loop entry boundary" checkpoint). On observed
    /// cancellation, returns `Cancelled`; whatever has already been
    /// written to `out` is left in place, exactly as any other aborted
    /// seal — the caller is expected to discard the partial output.
    pub fn write_to_cancelable(self, out: impl Write, token: &CancellationToken) -> Result<()> {
        self.write_to_inner(out, Some(token))
    }

    fn write_to_inner(self, out: impl Write, token: Option<&CancellationToken>) -> Result<()> {
        let mut writer = ArchiveWriter::new(out);

        let manifest_bytes = self.manifest.serialize();
        debug!("writing manifest for pack '{}'", self.manifest.name);
        writer.write_entry(
            MANIFEST_PATH,
            manifest_bytes.len() as u64,
            EntryTimes::default(),
            manifest_bytes.as_slice(),
        )?;

        for (canon, entry) in &self.entries {
            if token.is_some_and(|t| t.is_cancelled()) {
                return Err(LpError::Cancelled);
            }

            let root_relative = strip_root(canon);
            debug!(
                "writing entry '{root_relative}' ({} bytes)",
                entry.declared_size
            );
            let mut reader = entry.source.open_reader()?;
            let result = writer.write_entry(
                root_relative,
                entry.declared_size,
                EntryTimes::default(),
                &mut reader,
            );
            entry.source.close_reader(reader);
            result?;
        }

        writer.finish()?;
        Ok(())
    }

    /// Convenience wrapper sealing the builder directly to a filesystem
    /// path, creating or truncating the destination file.
    pub fn write_to_file(self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;
    use std::io::Read;

    #[test]
    fn deterministic_emission_order_is_byte_lex() {
        let mut builder = Builder::new();
        builder.set_name("demo");
        builder.add_from_bytes("/b", b"2".to_vec());
        builder.add_from_bytes("/a", b"1".to_vec());

        let mut out1 = Vec::new();
        builder.write_to(&mut out1).unwrap();

        let mut builder2 = Builder::new();
        builder2.set_name("demo");
        builder2.add_from_bytes("/b", b"2".to_vec());
        builder2.add_from_bytes("/a", b"1".to_vec());
        let mut out2 = Vec::new();
        builder2.write_to(&mut out2).unwrap();

        assert_eq!(out1, out2);
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let mut builder = Builder::new();
        builder.set_name("demo");
        builder.add_from_bytes("/a", b"v1".to_vec());
        builder.add_from_bytes("/a", b"v2".to_vec());

        let mut out = Vec::new();
        builder.write_to(&mut out).unwrap();

        let mut reader = Reader::new();
        reader.add_from_bytes(out).unwrap();
        let mut stream = reader.open("/a").unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"v2");
    }

    #[test]
    fn cancelled_token_aborts_seal_before_further_entries() {
        let mut builder = Builder::new();
        builder.set_name("demo");
        builder.add_from_bytes("/a", b"1".to_vec());
        builder.add_from_bytes("/b", b"2".to_vec());

        let token = CancellationToken::new();
        token.cancel();
        let err = builder
            .write_to_cancelable(Vec::new(), &token)
            .unwrap_err();
        assert!(matches!(err, LpError::Cancelled));
    }

    #[test]
    fn uncancelled_token_seals_normally() {
        let mut builder = Builder::new();
        builder.set_name("demo");
        builder.add_from_bytes("/a", b"1".to_vec());

        let token = CancellationToken::new();
        let mut out = Vec::new();
        builder.write_to_cancelable(&mut out, &token).unwrap();

        let mut reader = Reader::new();
        reader.add_from_bytes(out).unwrap();
        assert!(reader.contains("/a"));
    }

    #[test]
    fn minimal_pack_round_trips() {
        let mut builder = Builder::new();
        builder.set_name("demo");
        builder.add_from_bytes("/sources/main.lua", b"print('hi')\n".to_vec());

        let mut out = Vec::new();
        builder.write_to(&mut out).unwrap();

        let mut reader = Reader::new();
        reader.add_from_bytes(out).unwrap();
        assert!(reader.contains("/sources/main.lua"));
        let mut stream = reader.open("/sources/main.lua").unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"print('hi')\n");
    }
}
