//! Resolve - the selected package set.
//!
//! A Resolve is computed once per operation from the dependency graph and is
//! read-only afterwards. It feeds the lock file, the flat dependency map and
//! the JSON summary handed to the language toolchain.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::SourceId;
use crate::resolver::graph::ResolutionGraph;
use crate::resolver::select::select;
use crate::util::config::VersionStrategy;
use crate::util::hash::sha256_dir;

/// One selected package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    /// Dependency name
    pub name: String,

    /// Version declared by the package's manifest
    pub version: String,

    /// Where it came from
    pub source: SourceId,

    /// Package root on disk
    pub path: PathBuf,

    /// Content checksum, remote packages only
    pub sum: Option<String>,
}

/// The resolved dependency set of a root module.
#[derive(Debug, Clone)]
pub struct Resolve {
    root_name: String,
    root_path: PathBuf,
    packages: BTreeMap<String, ResolvedPackage>,
}

#[derive(Serialize)]
struct Summary<'a> {
    packages: BTreeMap<&'a str, SummaryEntry<'a>>,
}

#[derive(Serialize)]
struct SummaryEntry<'a> {
    name: &'a str,
    manifest_path: String,
}

impl Resolve {
    /// Select packages out of `graph` with `strategy`.
    pub fn from_graph(graph: &ResolutionGraph, strategy: VersionStrategy) -> Result<Self> {
        let selected = select(graph, strategy)?;

        let mut packages = BTreeMap::new();
        for (name, index) in selected {
            let node = graph.node(index);
            let sum = if node.source.is_remote() {
                Some(
                    sha256_dir(node.path())
                        .with_context(|| format!("failed to checksum {}", node.path().display()))?,
                )
            } else {
                None
            };

            packages.insert(
                name.clone(),
                ResolvedPackage {
                    name,
                    version: node.version().to_string(),
                    source: node.source.clone(),
                    path: node.path().to_path_buf(),
                    sum,
                },
            );
        }

        let root = graph.root_package();
        Ok(Resolve {
            root_name: root.name().to_string(),
            root_path: root.root().to_path_buf(),
            packages,
        })
    }

    /// Name of the root module.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Directory of the root module.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Get a package by name.
    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.get(name)
    }

    /// All packages, sorted by name.
    pub fn packages(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Flat name -> package root map.
    pub fn dependency_map(&self) -> BTreeMap<String, PathBuf> {
        self.packages
            .values()
            .map(|p| (p.name.clone(), p.path.clone()))
            .collect()
    }

    /// `{"packages":{"<name>":{"name":"<name>","manifest_path":"<dir>"}}}`
    pub fn summary_json(&self) -> Result<String> {
        let summary = Summary {
            packages: self
                .packages
                .values()
                .map(|p| {
                    (
                        p.name.as_str(),
                        SummaryEntry {
                            name: &p.name,
                            manifest_path: p.path.display().to_string(),
                        },
                    )
                })
                .collect(),
        };
        serde_json::to_string(&summary).context("failed to serialize resolution summary")
    }
}
