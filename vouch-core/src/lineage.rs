//! Lineage graph: append-only, acyclic parent→child relationships between
//! artifacts, with deterministic breadth-first ancestor/descendant queries.

use crate::error::LineageError;
use crate::types::{ArtifactType, RelationKind};
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A node in the lineage graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageNode {
    pub artifact_id: String,
    pub artifact_type: ArtifactType,
}

impl LineageNode {
    pub fn new(artifact_id: impl Into<String>, artifact_type: ArtifactType) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            artifact_type,
        }
    }
}

/// An edge in the lineage graph, pointing from parent to child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub relation: RelationKind,
}

/// Outcome of a successful edge insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted,
    /// The parent→child edge already existed; nothing changed.
    AlreadyPresent,
}

/// The lineage graph data structure.
pub struct LineageGraph {
    graph: DiGraph<LineageNode, LineageEdge>,
    id_index: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_index: HashMap::new(),
        }
    }

    /// Add a node if absent. An existing node keeps its original type.
    pub fn add_node(&mut self, node: LineageNode) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(&node.artifact_id) {
            return idx;
        }
        let id = node.artifact_id.clone();
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        idx
    }

    /// Insert `parent → child`, creating either node on first reference.
    ///
    /// Rejects self-loops and any edge whose child is already an ancestor of
    /// its parent. A rejected insert leaves the graph untouched.
    pub fn add_edge(
        &mut self,
        parent: LineageNode,
        child: LineageNode,
        relation: RelationKind,
    ) -> Result<EdgeInsert, LineageError> {
        let rejected = || LineageError::CycleRejected {
            parent: parent.artifact_id.clone(),
            child: child.artifact_id.clone(),
        };

        if parent.artifact_id == child.artifact_id {
            return Err(rejected());
        }

        if let (Some(&p), Some(&c)) = (
            self.id_index.get(&parent.artifact_id),
            self.id_index.get(&child.artifact_id),
        ) {
            if self.graph.find_edge(p, c).is_some() {
                return Ok(EdgeInsert::AlreadyPresent);
            }
            if has_path_connecting(&self.graph, c, p, None) {
                return Err(rejected());
            }
        }

        let p = self.add_node(parent);
        let c = self.add_node(child);
        self.graph.add_edge(p, c, LineageEdge { relation });
        Ok(EdgeInsert::Inserted)
    }

    pub fn node(&self, id: &str) -> Option<&LineageNode> {
        self.id_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    /// Direct parents with their relation kind, ordered by identifier.
    pub fn parents(&self, id: &str) -> Vec<(LineageNode, RelationKind)> {
        let Some(&idx) = self.id_index.get(id) else {
            return Vec::new();
        };
        let mut parents: Vec<(LineageNode, RelationKind)> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| (self.graph[edge.source()].clone(), edge.weight().relation))
            .collect();
        parents.sort_by(|a, b| a.0.artifact_id.cmp(&b.0.artifact_id));
        parents
    }

    /// Direct children with their relation kind, ordered by identifier.
    pub fn children(&self, id: &str) -> Vec<(LineageNode, RelationKind)> {
        let Some(&idx) = self.id_index.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<(LineageNode, RelationKind)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()].clone(), edge.weight().relation))
            .collect();
        children.sort_by(|a, b| a.0.artifact_id.cmp(&b.0.artifact_id));
        children
    }

    /// Every transitive parent, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<LineageNode> {
        self.breadth_first(id, Direction::Incoming)
    }

    /// Every transitive child, nearest first.
    pub fn descendants(&self, id: &str) -> Vec<LineageNode> {
        self.breadth_first(id, Direction::Outgoing)
    }

    /// Visits each reachable node once; siblings in identifier order.
    /// The start node is not included. Unknown ids yield nothing.
    fn breadth_first(&self, id: &str, direction: Direction) -> Vec<LineageNode> {
        let Some(&start) = self.id_index.get(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(idx) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, direction)
                .filter(|n| !visited.contains(n))
                .collect();
            next.sort_by(|a, b| self.graph[*a].artifact_id.cmp(&self.graph[*b].artifact_id));
            next.dedup();

            for n in next {
                if visited.insert(n) {
                    result.push(self.graph[n].clone());
                    queue.push_back(n);
                }
            }
        }

        result
    }

    /// Ancestors, descendants and every edge between the nodes they cover.
    pub fn view(&self, id: &str) -> LineageView {
        let ancestors = self.ancestors(id);
        let descendants = self.descendants(id);

        let mut edges = Vec::new();
        if let Some(&start) = self.id_index.get(id) {
            let covered: HashSet<NodeIndex> = ancestors
                .iter()
                .chain(descendants.iter())
                .filter_map(|n| self.id_index.get(&n.artifact_id).copied())
                .chain([start])
                .collect();
            edges = self
                .graph
                .edge_references()
                .filter(|e| covered.contains(&e.source()) && covered.contains(&e.target()))
                .map(|e| LineageLink {
                    parent: self.graph[e.source()].artifact_id.clone(),
                    child: self.graph[e.target()].artifact_id.clone(),
                    relation: e.weight().relation,
                })
                .collect();
            edges.sort_by(|a, b| (&a.parent, &a.child).cmp(&(&b.parent, &b.child)));
        }

        LineageView {
            artifact_id: id.to_string(),
            ancestors,
            descendants,
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Drop every node and edge. Only a full registry reset does this.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.id_index.clear();
    }
}

impl Default for LineageGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// One parent→child edge as reported in a [`LineageView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageLink {
    pub parent: String,
    pub child: String,
    pub relation: RelationKind,
}

/// Ancestors and descendants of one artifact, read under a single guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageView {
    pub artifact_id: String,
    pub ancestors: Vec<LineageNode>,
    pub descendants: Vec<LineageNode>,
    /// Edges among the artifact, its ancestors and its descendants, by parent then child.
    pub edges: Vec<LineageLink>,
}

/// Lineage graph shared between concurrent requests.
///
/// Writers take the lock for the whole cycle-check-then-insert, so readers
/// never see a half-applied edge.
#[derive(Clone, Default)]
pub struct SharedLineage {
    inner: Arc<RwLock<LineageGraph>>,
}

impl SharedLineage {
    pub fn new() -> Self {
        Self::default()
    }

    // Poison is ignored; every mutation is one petgraph call after its checks.
    fn read(&self) -> RwLockReadGuard<'_, LineageGraph> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LineageGraph> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_edge(
        &self,
        parent: LineageNode,
        child: LineageNode,
        relation: RelationKind,
    ) -> Result<EdgeInsert, LineageError> {
        self.write().add_edge(parent, child, relation)
    }

    pub fn add_node(&self, node: LineageNode) {
        self.write().add_node(node);
    }

    pub fn view(&self, id: &str) -> LineageView {
        self.read().view(id)
    }

    pub fn ancestors(&self, id: &str) -> Vec<LineageNode> {
        self.read().ancestors(id)
    }

    pub fn descendants(&self, id: &str) -> Vec<LineageNode> {
        self.read().descendants(id)
    }

    pub fn parents(&self, id: &str) -> Vec<(LineageNode, RelationKind)> {
        self.read().parents(id)
    }

    pub fn children(&self, id: &str) -> Vec<(LineageNode, RelationKind)> {
        self.read().children(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
