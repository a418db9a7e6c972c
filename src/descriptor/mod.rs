//! Descriptor loader (C5): parses the manifest input document and yields
//! a `Catalog` of `(namespace, alias, source_filename)` triples driving
//! the `Builder`.
//!
//! The reference loader (`kv`) is a pure static-data key/value document,
//! the variant spec.md explicitly allows in place of an embedded
//! expression-language evaluator (§6.1, §9).

mod kv;

pub use kv::KvDescriptorLoader;

use crate::error::Result;

/// One `(namespace, alias, source_filename)` mapping produced by a
/// descriptor loader. Canonical destination path is `/namespace/alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Destination namespace, e.g. `sources` or `resources`.
    pub namespace: String,
    /// Alias within the namespace; becomes the logical path's basename.
    pub alias: String,
    /// Filesystem path the `Builder` should read the payload from.
    pub source_filename: String,
}

/// The parsed descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    /// Declared pack name, copied into the `ManifestRecord`.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Optional entry-point alias, e.g. the main script.
    pub entry: Option<String>,
    /// All `(namespace, alias, source_filename)` mappings to build from.
    pub mappings: Vec<CatalogEntry>,
}

/// A pluggable capability mapping descriptor bytes to a `Catalog`.
///
/// The reference implementation is a restricted key/value document; an
/// embedded expression-language evaluator is an equally valid
/// implementation behind the same trait (spec.md §6.1, §6.4).
pub trait DescriptorLoader {
    /// Parses `bytes` into a `Catalog`.
    fn load(&self, bytes: &[u8]) -> Result<Catalog>;
}
