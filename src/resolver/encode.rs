//! Lock file encoding and decoding.
//!
//! `kcl.mod.lock` is kept as a `toml_edit` document rather than a serde model:
//! entries an operation does not touch are carried through with their
//! original formatting, comments and order.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::core::SourceId;
use crate::resolver::errors::ResolveError;
use crate::resolver::resolve::ResolvedPackage;

/// Current lock file format version.
pub const LOCK_VERSION: i64 = 1;

const HEADER: &str = "# This file is automatically generated by kpm.\n\
                      # It is not intended for manual editing.\n\n";

/// A locked package entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    /// Dependency name
    pub name: String,

    /// Exact version
    pub version: String,

    /// Source the package was fetched from
    pub source: SourceId,

    /// Materialized package root
    pub local_path: PathBuf,

    /// Content checksum of remote packages
    pub sum: Option<String>,
}

impl From<&ResolvedPackage> for LockEntry {
    fn from(pkg: &ResolvedPackage) -> Self {
        LockEntry {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            source: pkg.source.clone(),
            local_path: pkg.path.clone(),
            sum: pkg.sum.clone(),
        }
    }
}

impl LockEntry {
    fn write_to(&self, table: &mut Table) {
        table.insert("name", value(self.name.as_str()));
        table.insert("version", value(self.version.as_str()));
        table.insert("source", value(self.source.to_url_string()));
        table.insert("local_path", value(self.local_path.display().to_string()));
        if let Some(ref sum) = self.sum {
            table.insert("sum", value(sum.as_str()));
        }
    }
}

/// The `kcl.mod.lock` document.
#[derive(Debug, Clone)]
pub struct LockFile {
    doc: DocumentMut,
    path: PathBuf,
}

impl LockFile {
    /// An empty lock file destined for `path`.
    pub fn new(path: &Path) -> Self {
        let doc = format!("{}version = {}\n", HEADER, LOCK_VERSION)
            .parse::<DocumentMut>()
            .unwrap_or_default();
        LockFile {
            doc,
            path: path.to_path_buf(),
        }
    }

    /// Load the lock file at `path`, or start an empty one if there is none.
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(path));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lock file: {}", path.display()))?;
        Ok(Self::parse(&content, path)?)
    }

    /// Parse lock file content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ResolveError> {
        let doc: DocumentMut = content
            .parse()
            .map_err(|e: toml_edit::TomlError| ResolveError::manifest_parse(path, e.message()))?;

        match doc.get("version").and_then(Item::as_integer) {
            Some(LOCK_VERSION) | None => {}
            Some(other) => {
                return Err(ResolveError::manifest_parse(
                    path,
                    format!("unsupported lock file version {}", other),
                ))
            }
        }

        Ok(LockFile {
            doc,
            path: path.to_path_buf(),
        })
    }

    /// Where this lock file lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locked names, in file order.
    pub fn names(&self) -> Vec<String> {
        self.dependencies()
            .map(|t| t.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Get the entry for `name`.
    pub fn entry(&self, name: &str) -> Result<Option<LockEntry>, ResolveError> {
        let Some(table) = self
            .dependencies()
            .and_then(|t| t.get(name))
            .and_then(Item::as_table_like)
        else {
            return Ok(None);
        };

        let field = |key: &str| {
            table
                .get(key)
                .and_then(Item::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ResolveError::manifest_parse(
                        &self.path,
                        format!("locked package `{}` has no `{}`", name, key),
                    )
                })
        };

        let source = field("source")?;
        let source = SourceId::parse(&source)
            .map_err(|e| ResolveError::manifest_parse(&self.path, format!("{:#}", e)))?;

        Ok(Some(LockEntry {
            name: field("name").unwrap_or_else(|_| name.to_string()),
            version: field("version")?,
            source,
            local_path: PathBuf::from(field("local_path")?),
            sum: field("sum").ok(),
        }))
    }

    /// Replace the entry for `entry.name`.
    ///
    /// An identical entry is left as it is; returns whether anything changed.
    pub fn set_entry(&mut self, entry: &LockEntry) -> Result<bool, ResolveError> {
        if self.entry(&entry.name)?.as_ref() == Some(entry) {
            return Ok(false);
        }

        let deps = self
            .doc
            .entry("dependencies")
            .or_insert_with(|| {
                let mut table = Table::new();
                table.set_implicit(true);
                Item::Table(table)
            })
            .as_table_mut()
            .ok_or_else(|| {
                ResolveError::manifest_parse(&self.path, "`dependencies` is not a table")
            })?;

        match deps.get_mut(&entry.name).and_then(Item::as_table_mut) {
            Some(existing) => {
                existing.clear();
                entry.write_to(existing);
            }
            None => {
                let mut table = Table::new();
                entry.write_to(&mut table);
                deps.insert(&entry.name, Item::Table(table));
            }
        }

        Ok(true)
    }

    fn dependencies(&self) -> Option<&Table> {
        self.doc.get("dependencies").and_then(Item::as_table)
    }
}

impl fmt::Display for LockFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)
    }
}
