//! Dependency graph construction.
//!
//! The builder walks manifests depth-first in declaration order, fetching each
//! dependency through the [`SourceCache`] and loading its `kcl.mod`. A node is
//! one `(declared name, source identity)` pair: the same source reached along
//! several paths is loaded once and shared. Edges are stored in the order they
//! were discovered, which is the depth-first pre-order the version selector
//! relies on.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use petgraph::graph::{DiGraph, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use rayon::prelude::*;

use crate::core::{Package, SourceId};
use crate::resolver::errors::ResolveError;
use crate::sources::SourceCache;
use crate::util::config::RegistryConfig;

/// A loaded package in the graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Manifest and root directory
    pub package: Package,

    /// Where the package came from
    pub source: SourceId,
}

impl GraphNode {
    pub fn name(&self) -> &str {
        self.package.name()
    }

    pub fn version(&self) -> &str {
        self.package.version()
    }

    pub fn path(&self) -> &Path {
        self.package.root()
    }
}

/// A dependency edge: what the parent asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Name declared in the parent's manifest
    pub name: String,

    /// Version requested by the parent, if any
    pub version_req: Option<String>,
}

/// The graph of every package reachable from a root module.
#[derive(Debug)]
pub struct ResolutionGraph {
    graph: DiGraph<GraphNode, DependencyEdge>,
    root: NodeIndex,
    by_key: HashMap<String, NodeIndex>,
}

impl ResolutionGraph {
    fn new(root: GraphNode) -> Self {
        let key = node_key(root.name(), &root.source);
        let mut graph = DiGraph::new();
        let root = graph.add_node(root);
        let mut by_key = HashMap::new();
        by_key.insert(key, root);

        ResolutionGraph {
            graph,
            root,
            by_key,
        }
    }

    /// Index of the root module.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// The root module.
    pub fn root_package(&self) -> &Package {
        &self.graph[self.root].package
    }

    /// Get a node by index.
    pub fn node(&self, index: NodeIndex) -> &GraphNode {
        &self.graph[index]
    }

    /// All nodes, root included.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.graph
            .node_indices()
            .map(move |index| (index, &self.graph[index]))
    }

    /// Edges in discovery (depth-first pre-) order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeReference<'_, DependencyEdge>> {
        self.graph.edge_references()
    }

    /// Nodes the given node depends on, in declaration order.
    pub fn dependencies(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self.graph.edges(index).collect();
        edges.sort_by_key(|e| e.id());
        edges.into_iter().map(|e| e.target()).collect()
    }

    /// Number of packages, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Builds a [`ResolutionGraph`] by fetching and loading manifests.
pub struct GraphBuilder<'a> {
    cache: &'a SourceCache,
    registry: &'a RegistryConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(cache: &'a SourceCache, registry: &'a RegistryConfig) -> Self {
        GraphBuilder { cache, registry }
    }

    /// Build the graph rooted at `root`.
    pub fn build(&self, root: Package, source: SourceId) -> Result<ResolutionGraph> {
        let root_key = node_key(root.name(), &source);
        let root_name = root.name().to_string();
        let mut graph = ResolutionGraph::new(GraphNode {
            package: root,
            source,
        });

        let mut active = vec![(root_key, root_name)];
        let root_index = graph.root;
        self.expand(&mut graph, &mut active, root_index)?;

        tracing::debug!("dependency graph has {} packages", graph.len());
        Ok(graph)
    }

    fn expand(
        &self,
        graph: &mut ResolutionGraph,
        active: &mut Vec<(String, String)>,
        parent: NodeIndex,
    ) -> Result<()> {
        let deps = graph.graph[parent]
            .package
            .manifest()
            .dependencies(self.registry)?;

        // Siblings not seen yet are fetched concurrently; everything after
        // this point consumes the results in declaration order.
        let known = &graph.by_key;
        let mut fetched: Vec<Option<Result<std::path::PathBuf>>> = deps
            .par_iter()
            .map(|dep| {
                if known.contains_key(&node_key(dep.name(), dep.source_id())) {
                    None
                } else {
                    Some(self.cache.ensure_package(dep.name(), dep.source_id()))
                }
            })
            .collect();

        for (i, dep) in deps.iter().enumerate() {
            let key = node_key(dep.name(), dep.source_id());

            if let Some(pos) = active.iter().position(|(k, _)| k == &key) {
                let mut cycle: Vec<String> = active[pos..].iter().map(|(_, n)| n.clone()).collect();
                cycle.push(dep.name().to_string());
                return Err(ResolveError::CyclicDependency { cycle }.into());
            }

            let edge = DependencyEdge {
                name: dep.name().to_string(),
                version_req: dep.version_req().map(str::to_string),
            };

            if let Some(&child) = graph.by_key.get(&key) {
                tracing::debug!("reusing {} for {}", graph.graph[child].path().display(), dep);
                graph.graph.add_edge(parent, child, edge);
                continue;
            }

            let root = match fetched[i].take() {
                Some(result) => result?,
                None => self.cache.ensure_package(dep.name(), dep.source_id())?,
            };
            let package = load_package(&root)?;
            tracing::debug!(
                "loaded {} {} from {}",
                package.name(),
                package.version(),
                root.display()
            );

            let child = graph.graph.add_node(GraphNode {
                package,
                source: dep.source_id().clone(),
            });
            graph.by_key.insert(key.clone(), child);
            graph.graph.add_edge(parent, child, edge);

            active.push((key, dep.name().to_string()));
            self.expand(graph, active, child)?;
            active.pop();
        }

        Ok(())
    }
}

/// Identity of a graph node.
fn node_key(name: &str, source: &SourceId) -> String {
    format!("{}@{}", name, source.canonical_identity())
}

fn load_package(root: &Path) -> Result<Package> {
    Package::load(root).map_err(|e| {
        if e.downcast_ref::<ResolveError>().is_some() {
            e
        } else {
            ResolveError::manifest_parse(
                root.join(crate::core::MANIFEST_NAME),
                format!("{:#}", e),
            )
            .into()
        }
    })
}
