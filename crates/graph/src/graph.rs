use crate::error::{GraphError, Result};
use crate::types::{
    simple_name, DependencyKind, DependencyTarget, GraphNodeId, GraphStatistics, NodeRef,
    RelatedNode,
};
use context_syntax::{ClassFlavor, NodeKind, SyntaxNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Immutable dependency snapshot of a set of syntax trees.
///
/// Holds the raw adjacency (`id -> ordered targets`), the registry of
/// declarations, and a resolved petgraph view in which targets naming a
/// known class-like declaration become node-to-node edges.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Registration order
    pub(crate) order: Vec<GraphNodeId>,
    pub(crate) adjacency: HashMap<GraphNodeId, BTreeSet<DependencyTarget>>,
    pub(crate) registry: HashMap<GraphNodeId, NodeRef>,
    pub(crate) resolved: DiGraph<GraphNodeId, DependencyKind>,
    pub(crate) index: HashMap<GraphNodeId, NodeIndex>,
    /// Simple name -> class-like declarations
    pub(crate) classes: HashMap<String, Vec<NodeIndex>>,
}

impl DependencyGraph {
    pub(crate) fn register(&mut self, id: GraphNodeId, node_ref: NodeRef) {
        if self.registry.contains_key(&id) {
            return;
        }
        let idx = self.resolved.add_node(id.clone());
        if let Some(node) = node_ref.node() {
            if is_resolvable_class(node) {
                if let Some(name) = node.name() {
                    self.classes.entry(name.to_string()).or_default().push(idx);
                }
            }
        }
        self.index.insert(id.clone(), idx);
        self.adjacency.insert(id.clone(), BTreeSet::new());
        self.registry.insert(id.clone(), node_ref);
        self.order.push(id);
    }

    pub(crate) fn add_target(&mut self, id: &GraphNodeId, target: DependencyTarget) {
        if let Some(targets) = self.adjacency.get_mut(id) {
            targets.insert(target);
        }
    }

    /// Materialize resolved edges from the adjacency. Self edges are skipped.
    pub(crate) fn resolve_edges(&mut self) {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for id in &self.order {
            let (Some(&from), Some(targets)) = (self.index.get(id), self.adjacency.get(id)) else {
                continue;
            };
            for target in targets {
                for &to in self.resolve_indices(target) {
                    if to != from && seen.insert((from, to)) {
                        edges.push((from, to, target.kind));
                    }
                }
            }
        }
        for (from, to, kind) in edges {
            self.resolved.add_edge(from, to, kind);
        }
    }

    fn resolve_indices(&self, target: &DependencyTarget) -> &[NodeIndex] {
        self.classes
            .get(target.simple_name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn ids_of(&self, indices: impl IntoIterator<Item = NodeIndex>) -> Vec<GraphNodeId> {
        let mut indices: Vec<_> = indices.into_iter().collect();
        indices.sort();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|idx| self.resolved.node_weight(idx).cloned())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &GraphNodeId> {
        self.order.iter()
    }

    pub fn contains(&self, id: &GraphNodeId) -> bool {
        self.registry.contains_key(id)
    }

    /// Declaration registered under `id`
    pub fn node(&self, id: &GraphNodeId) -> Option<&SyntaxNode> {
        self.registry.get(id).and_then(NodeRef::node)
    }

    /// Outgoing targets of `id`, ordered; empty for unknown ids
    pub fn dependencies(&self, id: &GraphNodeId) -> Vec<DependencyTarget> {
        self.adjacency
            .get(id)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Declarations a target's name resolves to
    pub fn resolve_target(&self, target: &DependencyTarget) -> Vec<GraphNodeId> {
        self.ids_of(self.resolve_indices(target).iter().copied())
    }

    /// Ids with at least one target resolving to `id`
    pub fn dependents(&self, id: &GraphNodeId) -> Vec<GraphNodeId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.ids_of(self.resolved.neighbors_directed(idx, Direction::Incoming))
    }

    /// Breadth-first reachability over resolved edges
    pub fn has_path(&self, from: &GraphNodeId, to: &GraphNodeId) -> bool {
        if from == to {
            return true;
        }
        let (Some(&start), Some(&goal)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        let mut bfs = Bfs::new(&self.resolved, start);
        while let Some(idx) = bfs.next(&self.resolved) {
            if idx == goal {
                return true;
            }
        }
        false
    }

    /// Every cycle found by a depth-first walk from each unvisited node in
    /// registration order. A cycle is reported as the stack slice from the
    /// revisited node to the current one.
    pub fn detect_circular_dependencies(&self) -> Vec<Vec<GraphNodeId>> {
        let count = self.resolved.node_count();
        let mut visited = vec![false; count];
        let mut on_stack: Vec<Option<usize>> = vec![None; count];
        let mut cycles = Vec::new();

        for start in self.resolved.node_indices() {
            if visited[start.index()] {
                continue;
            }

            let mut path: Vec<NodeIndex> = Vec::new();
            let mut frames: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
            visited[start.index()] = true;
            on_stack[start.index()] = Some(0);
            path.push(start);
            frames.push((start, self.sorted_successors(start), 0));

            while let Some(frame) = frames.last_mut() {
                match frame.1.get(frame.2).copied() {
                    Some(next) => {
                        frame.2 += 1;
                        if let Some(pos) = on_stack[next.index()] {
                            cycles.push(self.ids_in_order(&path[pos..]));
                        } else if !visited[next.index()] {
                            visited[next.index()] = true;
                            on_stack[next.index()] = Some(path.len());
                            path.push(next);
                            frames.push((next, self.sorted_successors(next), 0));
                        }
                    }
                    None => {
                        if let Some((node, _, _)) = frames.pop() {
                            on_stack[node.index()] = None;
                        }
                        path.pop();
                    }
                }
            }
        }

        cycles
    }

    fn sorted_successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut next: Vec<_> = self.resolved.neighbors(idx).collect();
        next.sort();
        next.dedup();
        next
    }

    fn ids_in_order(&self, indices: &[NodeIndex]) -> Vec<GraphNodeId> {
        indices
            .iter()
            .filter_map(|&idx| self.resolved.node_weight(idx).cloned())
            .collect()
    }

    pub fn statistics(&self) -> GraphStatistics {
        let degrees: Vec<usize> = self.adjacency.values().map(BTreeSet::len).collect();
        let edge_count: usize = degrees.iter().sum();
        let node_count = self.order.len();
        GraphStatistics {
            node_count,
            edge_count,
            resolved_edge_count: self.resolved.edge_count(),
            avg_out_degree: if node_count == 0 {
                0.0
            } else {
                edge_count as f64 / node_count as f64
            },
            max_out_degree: degrees.into_iter().max().unwrap_or(0),
            cycle_count: self.detect_circular_dependencies().len(),
        }
    }

    /// Ids of declarations with the given name, in registration order
    pub fn find_by_name(&self, name: &str) -> Vec<GraphNodeId> {
        self.order
            .iter()
            .filter(|id| self.node(id).and_then(SyntaxNode::name) == Some(name))
            .cloned()
            .collect()
    }

    /// Resolve a user-supplied symbol: an exact id, or a declaration name.
    /// Among several same-named declarations a single class-like one wins.
    pub fn resolve_symbol(&self, symbol: &str) -> Result<GraphNodeId> {
        let exact = GraphNodeId::from(symbol);
        if self.contains(&exact) {
            return Ok(exact);
        }

        let mut candidates = self.find_by_name(symbol);
        if candidates.is_empty() {
            candidates = self.find_by_name(simple_name(symbol));
        }
        match candidates.len() {
            0 => Err(GraphError::NodeNotFound(symbol.to_string())),
            1 => Ok(candidates.remove(0)),
            _ => {
                let mut classes: Vec<_> = candidates
                    .iter()
                    .filter(|id| self.node(id).is_some_and(is_resolvable_class))
                    .cloned()
                    .collect();
                if classes.len() == 1 {
                    Ok(classes.remove(0))
                } else {
                    Err(GraphError::AmbiguousSymbol {
                        name: symbol.to_string(),
                        candidates,
                    })
                }
            }
        }
    }

    /// Nodes within `max_depth` hops of `id`, following resolved edges in
    /// both directions. Sorted by distance, then registration order.
    pub fn related(&self, id: &GraphNodeId, max_depth: usize) -> Vec<RelatedNode> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut distances: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let depth = distances[&current];
            if depth >= max_depth {
                continue;
            }
            for next in self.resolved.neighbors_undirected(current) {
                if !distances.contains_key(&next) {
                    distances.insert(next, depth + 1);
                    queue.push_back(next);
                }
            }
        }

        let mut related: Vec<_> = distances
            .into_iter()
            .filter(|(idx, _)| *idx != start)
            .collect();
        related.sort_by_key(|&(idx, distance)| (distance, idx));
        related
            .into_iter()
            .filter_map(|(idx, distance)| {
                self.resolved.node_weight(idx).map(|id| RelatedNode {
                    id: id.clone(),
                    distance,
                })
            })
            .collect()
    }
}

/// Class-like declarations that type names resolve to. `impl` blocks share
/// their target's name but do not declare it.
fn is_resolvable_class(node: &SyntaxNode) -> bool {
    node.kind() == NodeKind::Class
        && node.class_detail().and_then(|d| d.flavor) != Some(ClassFlavor::Impl)
}
