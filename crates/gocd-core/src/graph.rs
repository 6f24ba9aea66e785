//! Dependency graph routines
//!
//! The server describes pipeline dependencies as name references inside
//! each pipeline's materials, never as links between objects. This module
//! turns such a flat collection into an adjacency structure and walks it:
//!
//! - [`build_graph`]: fills every node's predecessor and descendant lists
//! - [`graph_depth_walk`]: breadth-first reachability over any neighbor relation
//!
//! Both work on caller-owned data through callbacks and perform no I/O.

use std::collections::{HashSet, VecDeque};
use std::convert::Infallible;
use std::hash::Hash;

use tracing::debug;

/// A node that can be cross-linked by [`build_graph`]
///
/// Adjacency is stored as identities rather than references, so nodes stay
/// plainly owned by whatever collection holds them.
pub trait Linked {
    /// Stable identity of a node (a pipeline name, for instance)
    type Id: Clone + Eq + Hash;

    fn id(&self) -> Self::Id;

    /// Nodes this node's dependency descriptors refer to
    fn predecessors_mut(&mut self) -> &mut Vec<Self::Id>;

    /// Nodes whose dependency descriptors refer to this node
    fn descendants_mut(&mut self) -> &mut Vec<Self::Id>;
}

/// Cross-link `nodes` in place
///
/// For every node `P`, each descriptor returned by `dependencies(P)` is
/// tested against every node `U` with `matches(descriptor, U)`. On a match,
/// `U` becomes a predecessor of `P` and `P` a descendant of `U`. One edge is
/// recorded per matching descriptor.
///
/// Both adjacency lists of every node are replaced, never extended, so
/// relinking the same nodes gives the same result. A node whose descriptor
/// matches itself ends up as its own predecessor and descendant.
///
/// # Example
///
/// ```
/// use gocd_core::{build_graph, Material, Pipeline};
///
/// let mut pipelines = vec![
///     Pipeline::new("parent1").with_material(Material::pipeline("child1")),
///     Pipeline::new("child1"),
/// ];
///
/// build_graph(
///     &mut pipelines,
///     |p| p.materials.clone(),
///     |m: &Material, p: &Pipeline| m.upstream_pipeline() == Some(p.name.as_str()),
/// );
///
/// assert_eq!(pipelines[1].descendants, vec!["parent1".to_string()]);
/// assert_eq!(pipelines[0].predecessors, vec!["child1".to_string()]);
/// ```
pub fn build_graph<N, D, I, F, M>(nodes: &mut [N], mut dependencies: F, matches: M)
where
    N: Linked,
    F: FnMut(&N) -> I,
    I: IntoIterator<Item = D>,
    M: FnMut(&D, &N) -> bool,
{
    let linked: Result<(), Infallible> =
        try_build_graph(nodes, |node| Ok(dependencies(node)), matches);
    match linked {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Fallible form of [`build_graph`]
///
/// The first error returned by `dependencies` aborts linking and is handed
/// back unchanged. Edges are collected before any node is written, so on
/// error every node keeps the adjacency it had before the call.
///
/// Runs in O(n² · d) for n nodes with d descriptors each; `dependencies` is
/// called exactly once per node.
pub fn try_build_graph<N, D, I, E, F, M>(
    nodes: &mut [N],
    mut dependencies: F,
    mut matches: M,
) -> Result<(), E>
where
    N: Linked,
    F: FnMut(&N) -> Result<I, E>,
    I: IntoIterator<Item = D>,
    M: FnMut(&D, &N) -> bool,
{
    // (upstream, downstream) index pairs
    let mut edges = Vec::new();

    for (downstream, node) in nodes.iter().enumerate() {
        for descriptor in dependencies(node)? {
            for (upstream, candidate) in nodes.iter().enumerate() {
                if matches(&descriptor, candidate) {
                    edges.push((upstream, downstream));
                }
            }
        }
    }

    let ids: Vec<N::Id> = nodes.iter().map(Linked::id).collect();

    for node in nodes.iter_mut() {
        node.predecessors_mut().clear();
        node.descendants_mut().clear();
    }

    for &(upstream, downstream) in &edges {
        nodes[downstream].predecessors_mut().push(ids[upstream].clone());
        nodes[upstream].descendants_mut().push(ids[downstream].clone());
    }

    debug!("Linked {} nodes with {} edges", nodes.len(), edges.len());
    Ok(())
}

/// Collect every node reachable from `start`
///
/// `start` takes one root (`[root]`, `Some(root)`) or many. The walk is
/// breadth-first over `neighbors`; each node is visited once, so cycles
/// terminate. The roots are always part of the result.
///
/// ```
/// use std::collections::{HashMap, HashSet};
/// use gocd_core::graph_depth_walk;
///
/// let graph = HashMap::from([("x", vec!["y"]), ("y", vec!["x"])]);
/// let seen = graph_depth_walk(["x"], |n| graph[n].clone());
/// assert_eq!(seen, HashSet::from(["x", "y"]));
/// ```
pub fn graph_depth_walk<T, R, I, F>(start: R, mut neighbors: F) -> HashSet<T>
where
    T: Clone + Eq + Hash,
    R: IntoIterator<Item = T>,
    F: FnMut(&T) -> I,
    I: IntoIterator<Item = T>,
{
    let walked: Result<HashSet<T>, Infallible> =
        try_graph_depth_walk(start, |node| Ok(neighbors(node)));
    match walked {
        Ok(visited) => visited,
        Err(never) => match never {},
    }
}

/// Fallible form of [`graph_depth_walk`]
///
/// The first error returned by `neighbors` stops the walk and is handed
/// back unchanged.
pub fn try_graph_depth_walk<T, R, I, E, F>(start: R, mut neighbors: F) -> Result<HashSet<T>, E>
where
    T: Clone + Eq + Hash,
    R: IntoIterator<Item = T>,
    F: FnMut(&T) -> Result<I, E>,
    I: IntoIterator<Item = T>,
{
    let mut queue: VecDeque<T> = start.into_iter().collect();
    let mut visited = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.clone()) {
            continue;
        }

        for next in neighbors(&node)? {
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }

    Ok(visited)
}
