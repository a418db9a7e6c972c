//! Reference `DescriptorLoader`: a restricted key/value document, the
//! same document family as the pack manifest (spec.md §6.2), generalized
//! to carry namespace tables (spec.md §6.3).

use std::collections::HashMap;

use super::{Catalog, CatalogEntry, DescriptorLoader};
use crate::error::{LpError, Result};

/// Parses descriptor documents of the form:
///
/// ```text
/// [pack]
/// name=demo
/// description=a demo application
///
/// [sources]
/// main.lua=./main.lua
///
/// [resources]
/// icon.png=./assets/icon.png
/// splash=./assets/splash.png
/// ```
///
/// `[section]` headers name either the reserved `pack` group or a
/// namespace group. Blank lines and lines starting with `#` are ignored.
/// A namespace-group line with no `=` is a positional mapping: the
/// trimmed line is used as both alias and source_filename.
#[derive(Debug, Clone, Copy, Default)]
pub struct KvDescriptorLoader;

impl DescriptorLoader for KvDescriptorLoader {
    fn load(&self, bytes: &[u8]) -> Result<Catalog> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LpError::LoadFailed(format!("descriptor is not valid UTF-8: {e}")))?;
        parse(text)
    }
}

fn parse(text: &str) -> Result<Catalog> {
    let mut current_section: Option<String> = None;
    let mut pack_fields: HashMap<String, String> = HashMap::new();
    let mut mappings = Vec::new();
    let mut saw_namespace_section = false;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(LpError::InvalidField(format!(
                    "malformed section header at line {}",
                    lineno + 1
                )));
            }
            let name = line[1..line.len() - 1].trim();
            if name.is_empty() {
                return Err(LpError::InvalidField("section name".to_string()));
            }
            current_section = Some(name.to_string());
            continue;
        }

        match current_section.as_deref() {
            None => return Err(LpError::InvalidField("pack".to_string())),
            Some("pack") => {
                let (key, value) = split_pair(line, "pack")?;
                pack_fields.insert(key, value);
            }
            Some(namespace) => {
                saw_namespace_section = true;
                let entry = match line.split_once('=') {
                    Some((alias, source)) => {
                        let alias = alias.trim();
                        if alias.is_empty() {
                            return Err(LpError::InvalidField(namespace.to_string()));
                        }
                        CatalogEntry {
                            namespace: namespace.to_string(),
                            alias: alias.to_string(),
                            source_filename: source.trim().to_string(),
                        }
                    }
                    None => CatalogEntry {
                        namespace: namespace.to_string(),
                        alias: line.to_string(),
                        source_filename: line.to_string(),
                    },
                };
                mappings.push(entry);
            }
        }
    }

    if !saw_namespace_section {
        return Err(LpError::MissingField(
            "at least one namespace group".to_string(),
        ));
    }

    let name = pack_fields
        .get("name")
        .cloned()
        .ok_or_else(|| LpError::MissingField("name".to_string()))?;
    if name.is_empty() {
        return Err(LpError::InvalidField("name".to_string()));
    }

    Ok(Catalog {
        name,
        description: pack_fields.get("description").cloned(),
        entry: pack_fields.get("entry").cloned(),
        mappings,
    })
}

fn split_pair(line: &str, section: &str) -> Result<(String, String)> {
    match line.split_once('=') {
        Some((k, v)) => Ok((k.trim().to_string(), v.trim().to_string())),
        None => Err(LpError::InvalidField(section.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_descriptor() {
        let doc = "[pack]\nname=demo\n\n[sources]\nmain.lua=./main.lua\n";
        let catalog = KvDescriptorLoader.load(doc.as_bytes()).unwrap();
        assert_eq!(catalog.name, "demo");
        assert_eq!(catalog.mappings.len(), 1);
        assert_eq!(catalog.mappings[0].namespace, "sources");
        assert_eq!(catalog.mappings[0].alias, "main.lua");
        assert_eq!(catalog.mappings[0].source_filename, "./main.lua");
    }

    #[test]
    fn parses_positional_shorthand() {
        let doc = "[pack]\nname=demo\n\n[resources]\nsplash.png\n";
        let catalog = KvDescriptorLoader.load(doc.as_bytes()).unwrap();
        assert_eq!(catalog.mappings[0].alias, "splash.png");
        assert_eq!(catalog.mappings[0].source_filename, "splash.png");
    }

    #[test]
    fn missing_name_is_missing_field() {
        let doc = "[pack]\ndescription=x\n\n[sources]\na=b\n";
        let err = KvDescriptorLoader.load(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, LpError::MissingField(f) if f == "name"));
    }

    #[test]
    fn no_namespace_group_is_missing_field() {
        let doc = "[pack]\nname=demo\n";
        let err = KvDescriptorLoader.load(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, LpError::MissingField(_)));
    }

    #[test]
    fn value_before_any_section_is_invalid_field() {
        let doc = "name=demo\n[sources]\na=b\n";
        let err = KvDescriptorLoader.load(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, LpError::InvalidField(f) if f == "pack"));
    }

    #[test]
    fn description_and_entry_are_optional() {
        let doc = "[pack]\nname=demo\nentry=main.lua\n\n[sources]\nmain.lua=./main.lua\n";
        let catalog = KvDescriptorLoader.load(doc.as_bytes()).unwrap();
        assert_eq!(catalog.entry.as_deref(), Some("main.lua"));
        assert_eq!(catalog.description, None);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let doc = "# a comment\n[pack]\nname=demo\n\n# another\n[sources]\na=b\n";
        let catalog = KvDescriptorLoader.load(doc.as_bytes()).unwrap();
        assert_eq!(catalog.name, "demo");
    }
}
