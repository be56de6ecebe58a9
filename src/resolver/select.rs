//! Version selection: one package per dependency name.
//!
//! Both strategies share a ranking of the graph's edges. Transitive edges are
//! ranked in depth-first pre-order, then the root's own edges are ranked after
//! them, and a node's rank is the rank of the last edge reaching it. Override
//! picks the highest-ranked node for each name. Mvs picks the highest
//! requested version and uses the rank only to break ties between nodes that
//! provide it, so both strategies agree on the path whenever they agree on the
//! version.
//!
//! Under Override a losing node's own dependencies are dropped with it: only
//! names reachable from the root through winners are kept.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::resolver::errors::ResolveError;
use crate::resolver::graph::ResolutionGraph;
use crate::resolver::version::{compare_versions, versions_match};
use crate::util::config::VersionStrategy;

/// Choose one node per dependency name.
pub fn select(
    graph: &ResolutionGraph,
    strategy: VersionStrategy,
) -> Result<BTreeMap<String, NodeIndex>, ResolveError> {
    check_requirements(graph)?;

    let ranks = rank_nodes(graph);
    let mut by_name: BTreeMap<String, Vec<NodeIndex>> = BTreeMap::new();
    for edge in graph.edges() {
        let candidates = by_name.entry(edge.weight().name.clone()).or_default();
        if !candidates.contains(&edge.target()) {
            candidates.push(edge.target());
        }
    }

    let mut selected = BTreeMap::new();
    for (name, candidates) in by_name {
        let winner = match strategy {
            VersionStrategy::Override => highest_rank(&candidates, &ranks),
            VersionStrategy::Mvs => {
                let wanted = max_requested(graph, &name);
                let providers: Vec<NodeIndex> = candidates
                    .iter()
                    .copied()
                    .filter(|&n| versions_match(&wanted, graph.node(n).version()))
                    .collect();
                highest_rank(&providers, &ranks)
            }
        };

        let Some(winner) = winner else {
            continue;
        };
        tracing::debug!(
            "selected {} {} from {}",
            name,
            graph.node(winner).version(),
            graph.node(winner).source
        );
        selected.insert(name, winner);
    }

    if strategy == VersionStrategy::Override {
        selected = reachable_from_root(graph, selected);
    }
    Ok(selected)
}

/// Restrict `selected` to the names reached by walking winners from the root.
fn reachable_from_root(
    graph: &ResolutionGraph,
    selected: BTreeMap<String, NodeIndex>,
) -> BTreeMap<String, NodeIndex> {
    let mut kept = BTreeMap::new();
    let mut visited = HashSet::new();
    let mut stack = vec![graph.root()];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        for edge in graph.edges().filter(|edge| edge.source() == node) {
            let name = &edge.weight().name;
            if let Some(&winner) = selected.get(name) {
                kept.entry(name.clone()).or_insert(winner);
                stack.push(winner);
            }
        }
    }

    for name in selected.keys().filter(|name| !kept.contains_key(*name)) {
        tracing::debug!("dropping {}, only required by overridden packages", name);
    }
    kept
}

/// Every constrained edge must point at a package providing that version.
fn check_requirements(graph: &ResolutionGraph) -> Result<(), ResolveError> {
    for edge in graph.edges() {
        let Some(requested) = edge.weight().version_req.as_deref() else {
            continue;
        };
        let provided = graph.node(edge.target()).version();
        if !versions_match(requested, provided) {
            tracing::debug!(
                "{} requests {} but its source provides {}",
                edge.weight().name,
                requested,
                provided
            );
            return Err(ResolveError::version_not_found(&edge.weight().name, requested));
        }
    }
    Ok(())
}

fn rank_nodes(graph: &ResolutionGraph) -> HashMap<NodeIndex, usize> {
    let root = graph.root();
    let (direct, transitive): (Vec<_>, Vec<_>) =
        graph.edges().partition(|edge| edge.source() == root);

    let mut ranks = HashMap::new();
    for (rank, edge) in transitive.into_iter().chain(direct).enumerate() {
        ranks.insert(edge.target(), rank);
    }
    ranks
}

fn highest_rank(nodes: &[NodeIndex], ranks: &HashMap<NodeIndex, usize>) -> Option<NodeIndex> {
    nodes
        .iter()
        .copied()
        .max_by_key(|n| ranks.get(n).copied().unwrap_or(0))
}

/// The highest version any edge asks for under `name`.
fn max_requested(graph: &ResolutionGraph, name: &str) -> String {
    graph
        .edges()
        .filter(|edge| edge.weight().name == name)
        .map(|edge| {
            edge.weight()
                .version_req
                .clone()
                .unwrap_or_else(|| graph.node(edge.target()).version().to_string())
        })
        .fold(None::<String>, |max, v| match max {
            Some(m) if compare_versions(&m, &v) != Ordering::Less => Some(m),
            _ => Some(v),
        })
        .unwrap_or_default()
}
