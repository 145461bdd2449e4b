//! Dependency graph over discovered addons
//!
//! Edges point from an addon to each of its effective dependencies (its
//! declared `depends` plus the implicit `base`). Addons with a dependency
//! that is missing or broken, directly or transitively, are excluded from
//! the graph and reported as unresolved.

use crate::registry::AddonRegistry;
use addonctl_core::types::{Diagnostic, DiagnosticCode, Diagnostics};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Traversal direction for closures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow dependencies
    Forward,
    /// Follow dependents
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Acyclic dependency graph of resolvable addons
///
/// The declared graph keeps every addon with a manifest, unresolved ones
/// included, so removals can still reach dependents that never resolved.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
    declared: DiGraph<String, ()>,
    declared_index: BTreeMap<String, NodeIndex>,
    /// Length of the longest dependency chain below each declared node
    depth: Vec<usize>,
    unresolved: BTreeMap<String, Diagnostic>,
}

impl DependencyGraph {
    /// Build the graph for every healthy addon in the registry
    ///
    /// Fails with `DependencyCycle` naming one offending cycle when the
    /// declared dependencies do not form a DAG, whether or not the addons
    /// on the cycle resolve.
    pub fn build(registry: &AddonRegistry) -> Result<Self, Diagnostic> {
        let (declared, declared_index) = edges_among(registry, |_| true);
        let declared_adjacency = sorted_adjacency(&declared);
        if let Some(cycle) = find_cycle(&declared, &declared_adjacency) {
            let names: Vec<String> = cycle.iter().map(|n| declared[*n].clone()).collect();
            return Err(Diagnostic::new(
                DiagnosticCode::DependencyCycle,
                format!("dependency cycle: {}", names.join(" -> ")),
            )
            .for_addon(&names[0])
            .with_context("cycle", names.join(",")));
        }

        let unresolved = find_unresolved(registry);
        let (graph, index) = edges_among(registry, |name| !unresolved.contains_key(name));

        // A resolved addon only reaches resolved addons, so its depth is the
        // same in both graphs
        let depth = compute_depth(&declared, &declared_adjacency);
        debug!(
            "Built dependency graph: {} addons, {} edges, {} unresolved",
            graph.node_count(),
            graph.edge_count(),
            unresolved.len()
        );

        Ok(Self {
            graph,
            index,
            declared,
            declared_index,
            depth,
            unresolved,
        })
    }

    /// Whether the addon is a resolvable node of the graph
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether the addon was excluded for an unresolved dependency
    pub fn is_unresolved(&self, name: &str) -> bool {
        self.unresolved.contains_key(name)
    }

    /// Diagnostic explaining why an addon is unresolved
    pub fn unresolved_reason(&self, name: &str) -> Option<&Diagnostic> {
        self.unresolved.get(name)
    }

    /// All unresolved diagnostics, ordered by addon name
    pub fn unresolved(&self) -> impl Iterator<Item = &Diagnostic> {
        self.unresolved.values()
    }

    pub fn unresolved_diagnostics(&self) -> Diagnostics {
        self.unresolved.values().cloned().collect()
    }

    /// All addon names in the graph, ordered by name
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Direct effective dependencies, ordered by name
    pub fn depends(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, petgraph::Direction::Outgoing)
    }

    /// Direct dependents, ordered by name
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, petgraph::Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: petgraph::Direction) -> Vec<&str> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Longest dependency chain below an addon (`base` is 0)
    pub fn depth(&self, name: &str) -> Option<usize> {
        if !self.index.contains_key(name) {
            return None;
        }
        self.declared_index.get(name).map(|n| self.depth[n.index()])
    }

    /// Every addon reachable from `names` in `direction`, including the
    /// starting addons themselves
    ///
    /// Names not in the graph are ignored.
    pub fn transitive_closure<I, S>(&self, names: I, direction: Direction) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        closure(&self.graph, &self.index, names, direction)
    }

    /// Like [`transitive_closure`](Self::transitive_closure), but over the
    /// declared dependencies of every addon with a manifest, unresolved
    /// addons included
    pub fn declared_closure<I, S>(&self, names: I, direction: Direction) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        closure(&self.declared, &self.declared_index, names, direction)
    }

    /// Order `names` so every addon follows all of its dependencies
    ///
    /// Sorted by dependency depth, then by name; the result is the same for
    /// any input order. Unresolved addons are ranked by their declared
    /// dependencies. Names without a manifest are dropped.
    pub fn topological_order<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranked: Vec<(usize, &str)> = names
            .into_iter()
            .filter_map(|name| {
                self.declared_index
                    .get_key_value(name.as_ref())
                    .map(|(key, n)| (self.depth[n.index()], key.as_str()))
            })
            .collect();
        ranked.sort_unstable();
        ranked.dedup();
        ranked.into_iter().map(|(_, name)| name.to_string()).collect()
    }
}

/// Graph over the registry addons accepted by `keep`, with an edge for each
/// effective dependency that is itself kept
fn edges_among(
    registry: &AddonRegistry,
    keep: impl Fn(&str) -> bool,
) -> (DiGraph<String, ()>, BTreeMap<String, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut index = BTreeMap::new();
    // Nodes are added in name order so index order equals name order
    for addon in registry.all() {
        if keep(&addon.name) {
            index.insert(addon.name.clone(), graph.add_node(addon.name.clone()));
        }
    }
    for addon in registry.all() {
        let Some(&from) = index.get(&addon.name) else {
            continue;
        };
        for dep in addon.manifest.effective_depends(&addon.name) {
            if let Some(&to) = index.get(&dep) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, index)
}

fn closure<I, S>(
    graph: &DiGraph<String, ()>,
    index: &BTreeMap<String, NodeIndex>,
    names: I,
    direction: Direction,
) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for name in names {
        let Some(&start) = index.get(name.as_ref()) else {
            continue;
        };
        if out.contains(name.as_ref()) {
            continue;
        }
        match direction {
            Direction::Forward => {
                let mut dfs = Dfs::new(graph, start);
                while let Some(n) = dfs.next(graph) {
                    out.insert(graph[n].clone());
                }
            }
            Direction::Reverse => {
                let reversed = Reversed(graph);
                let mut dfs = Dfs::new(reversed, start);
                while let Some(n) = dfs.next(reversed) {
                    out.insert(graph[n].clone());
                }
            }
        }
    }
    out
}

/// Mark every addon whose dependencies cannot all be satisfied
///
/// Runs to a fixpoint so an addon depending on an unresolved addon is
/// itself unresolved.
fn find_unresolved(registry: &AddonRegistry) -> BTreeMap<String, Diagnostic> {
    let mut unresolved: BTreeMap<String, Diagnostic> = BTreeMap::new();

    loop {
        let mut changed = false;
        for addon in registry.all() {
            if unresolved.contains_key(&addon.name) {
                continue;
            }
            let blocking = addon
                .manifest
                .effective_depends(&addon.name)
                .into_iter()
                .find_map(|dep| {
                    if registry.is_broken(&dep) {
                        Some((dep, "is broken"))
                    } else if !registry.contains(&dep) {
                        Some((dep, "is not available in any addons path"))
                    } else if unresolved.contains_key(&dep) {
                        Some((dep, "has unresolved dependencies"))
                    } else {
                        None
                    }
                });

            if let Some((dep, why)) = blocking {
                let diagnostic = Diagnostic::new(
                    DiagnosticCode::UnresolvedDependency,
                    format!("'{}' depends on '{}', which {}", addon.name, dep, why),
                )
                .for_addon(&addon.name)
                .with_context("dependency", &dep);
                unresolved.insert(addon.name.clone(), diagnostic);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    unresolved
}

/// Outgoing neighbors per node, sorted by node index (and so by name)
fn sorted_adjacency(graph: &DiGraph<String, ()>) -> Vec<Vec<NodeIndex>> {
    graph
        .node_indices()
        .map(|n| {
            let mut next: Vec<NodeIndex> = graph.neighbors(n).collect();
            next.sort_unstable();
            next.dedup();
            next
        })
        .collect()
}

/// Iterative three-color DFS in name order
///
/// Returns the first cycle found as a closed path, e.g. `[a, b, a]`.
fn find_cycle(graph: &DiGraph<String, ()>, adjacency: &[Vec<NodeIndex>]) -> Option<Vec<NodeIndex>> {
    let mut color = vec![Color::White; graph.node_count()];

    for start in graph.node_indices() {
        if color[start.index()] != Color::White {
            continue;
        }

        let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        color[start.index()] = Color::Gray;

        while let Some(&(node, next)) = stack.last() {
            let children = &adjacency[node.index()];
            if next < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[next];
                match color[child.index()] {
                    Color::White => {
                        color[child.index()] = Color::Gray;
                        stack.push((child, 0));
                    }
                    Color::Gray => {
                        let from = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                        let mut cycle: Vec<NodeIndex> = stack[from..].iter().map(|(n, _)| *n).collect();
                        cycle.push(child);
                        return Some(cycle);
                    }
                    Color::Black => {}
                }
            } else {
                color[node.index()] = Color::Black;
                stack.pop();
            }
        }
    }

    None
}

/// Longest path to a leaf for every node of an acyclic graph
fn compute_depth(graph: &DiGraph<String, ()>, adjacency: &[Vec<NodeIndex>]) -> Vec<usize> {
    let mut depth: Vec<Option<usize>> = vec![None; graph.node_count()];

    for start in graph.node_indices() {
        if depth[start.index()].is_some() {
            continue;
        }
        let mut stack = vec![start];
        while let Some(&node) = stack.last() {
            let pending: Vec<NodeIndex> = adjacency[node.index()]
                .iter()
                .copied()
                .filter(|c| depth[c.index()].is_none())
                .collect();
            if pending.is_empty() {
                let d = adjacency[node.index()]
                    .iter()
                    .filter_map(|c| depth[c.index()])
                    .map(|d| d + 1)
                    .max()
                    .unwrap_or(0);
                depth[node.index()] = Some(d);
                stack.pop();
            } else {
                stack.extend(pending);
            }
        }
    }

    depth.into_iter().map(|d| d.unwrap_or(0)).collect()
}
