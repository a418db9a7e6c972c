#![deny(missing_docs)]

//! A packaging engine and read-only virtual filesystem for compressed
//! archive packs.
//!
//! A `Builder` accumulates named sources under canonical logical paths and
//! seals them, in deterministic order, into a single-file pack. A `Reader`
//! ingests one or more sealed packs into a unified index and serves
//! `contains`/`open`/`query_info` against the combined namespace. A
//! `DescriptorLoader` turns a manifest-style input document into the
//! `(namespace, alias, source_filename)` mappings that drive a `Builder`.

mod builder;
mod cancel;
mod codec;
mod descriptor;
mod error;
mod path;
mod reader;
mod source;
mod stream;

pub use builder::{Builder, ManifestRecord};
pub use cancel::CancellationToken;
pub use codec::{EntryHeader, EntryTimes, DEFAULT_MODE, FILE_TYPE_REGULAR};
pub use descriptor::{Catalog, CatalogEntry, DescriptorLoader, KvDescriptorLoader};
pub use error::{LpError, Result};
pub use path::{canonicalize_alias, canonicalize_pack_name, canonicalize_path, strip_root, MANIFEST_PATH, PACK_EXTENSION};
pub use reader::{open_pack_file, Info, Reader};
pub use source::{ReadSeek, Source};
pub use stream::Stream;
