// Graph Store
//
// Owns the vertex/edge universe of one compilation and every `Graph` view over
// it. The universe is a petgraph `StableDiGraph` so ids stay valid across
// removals; per-kind extents keep creation order so passes can enumerate
// "every Process so far" without their own index.
//
// Creation is content-keyed: adding a vertex whose defining fields match a live
// vertex returns the existing one (and registers it into the active graphs).
// Vertices and edges may only be created while at least one graph is active.

use ahash::AHashMap;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use super::edge::{Edge, EdgeId, EdgeKey, EdgeKind, VertexId};
use super::vertex::{Vertex, VertexData, VertexKey, VertexKind};

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("No active graph: vertices and edges can only be created inside an active graph scope")]
    NoActiveGraph,

    #[error("Unknown graph {0}")]
    UnknownGraph(GraphId),

    #[error("Graph {0} is not live")]
    DeadGraph(GraphId),

    #[error("Graph {0} is still active")]
    GraphActive(GraphId),

    #[error("Exit without matching enter")]
    NotEntered,

    #[error("Vertex {0:?} does not exist")]
    MissingVertex(VertexId),

    #[error("Edge {0:?} does not exist")]
    MissingEdge(EdgeId),

    #[error("Expected exactly one {direction} '{kind}' edge on {vertex:?}, found {found}")]
    Relation {
        vertex: VertexId,
        kind: EdgeKind,
        direction: &'static str,
        found: usize,
    },

    #[error("Vertex {vertex:?} is a {found}, expected {expected}")]
    WrongKind {
        vertex: VertexId,
        expected: VertexKind,
        found: VertexKind,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================
// Graph views
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Vertex or edge, for operations that accept both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    Vertex(VertexId),
    Edge(EdgeId),
}

/// A content-holding view over part of the universe
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeSet<VertexId>,
    edges: BTreeSet<EdgeId>,
    /// Cross-cutting state (platform string, active build id, ...)
    pub data: serde_json::Map<String, serde_json::Value>,
    live: bool,
}

impl Graph {
    #[inline]
    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }

    #[inline]
    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.edges.contains(&e)
    }

    pub fn contains(&self, element: Element) -> bool {
        match element {
            Element::Vertex(v) => self.contains_vertex(v),
            Element::Edge(e) => self.contains_edge(e),
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Same vertex and edge sets
    pub fn same_content(&self, other: &Graph) -> bool {
        self.vertices == other.vertices && self.edges == other.edges
    }
}

/// Graph statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_vertices: usize,
    pub total_edges: usize,
    pub vertices_by_kind: BTreeMap<VertexKind, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
}

// ============================================================
// Store
// ============================================================

#[derive(Debug, Default)]
pub struct Store {
    universe: StableDiGraph<Vertex, Edge>,
    vertex_extents: AHashMap<VertexKind, Vec<VertexId>>,
    edge_extents: AHashMap<EdgeKind, Vec<EdgeId>>,
    vertex_keys: AHashMap<VertexKey, VertexId>,
    edge_keys: AHashMap<EdgeKey, EdgeId>,
    graphs: Vec<Graph>,
    active: Vec<GraphId>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------- graph lifecycle ----------------

    pub fn create_graph(&mut self) -> GraphId {
        let id = GraphId(self.graphs.len() as u32);
        self.graphs.push(Graph {
            live: true,
            ..Graph::default()
        });
        id
    }

    pub fn graph(&self, id: GraphId) -> StoreResult<&Graph> {
        self.graphs
            .get(id.0 as usize)
            .ok_or(StoreError::UnknownGraph(id))
    }

    pub fn graph_mut(&mut self, id: GraphId) -> StoreResult<&mut Graph> {
        self.graphs
            .get_mut(id.0 as usize)
            .ok_or(StoreError::UnknownGraph(id))
    }

    /// Release a graph's content; its id stays known but not live
    pub fn drop_graph(&mut self, id: GraphId) -> StoreResult<()> {
        if self.active.contains(&id) {
            return Err(StoreError::GraphActive(id));
        }
        let graph = self.graph_mut(id)?;
        graph.vertices.clear();
        graph.edges.clear();
        graph.data.clear();
        graph.live = false;
        Ok(())
    }

    /// Every graph ever created, with its liveness flag
    pub fn graphs_status(&self) -> Vec<(GraphId, bool)> {
        self.graphs
            .iter()
            .enumerate()
            .map(|(i, g)| (GraphId(i as u32), g.live))
            .collect()
    }

    // ---------------- activation ----------------

    pub fn enter(&mut self, id: GraphId) -> StoreResult<()> {
        if !self.graph(id)?.live {
            return Err(StoreError::DeadGraph(id));
        }
        self.active.push(id);
        Ok(())
    }

    pub fn exit(&mut self) -> StoreResult<GraphId> {
        self.active.pop().ok_or(StoreError::NotEntered)
    }

    /// Currently active graphs, innermost last
    pub fn active_graphs(&self) -> &[GraphId] {
        &self.active
    }

    /// Run `f` with `id` active; the graph is exited on every path
    pub fn with_active<R, E>(
        &mut self,
        id: GraphId,
        f: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        self.enter(id)?;
        let result = f(self);
        self.exit()?;
        result
    }

    fn require_active(&self) -> StoreResult<()> {
        if self.active.is_empty() {
            Err(StoreError::NoActiveGraph)
        } else {
            Ok(())
        }
    }

    fn register(&mut self, element: Element) {
        for gid in self.active.iter() {
            let graph = &mut self.graphs[gid.0 as usize];
            match element {
                Element::Vertex(v) => {
                    graph.vertices.insert(v);
                }
                Element::Edge(e) => {
                    graph.edges.insert(e);
                }
            }
        }
    }

    // ---------------- creation ----------------

    /// Create (or find) a vertex and register it into every active graph
    pub fn add_vertex(&mut self, data: VertexData) -> StoreResult<VertexId> {
        self.require_active()?;
        let key = data.key();
        if let Some(&existing) = self.vertex_keys.get(&key) {
            self.register(Element::Vertex(existing));
            return Ok(existing);
        }

        let kind = data.kind();
        let id = self.universe.add_node(Vertex::new(data));
        self.vertex_extents.entry(kind).or_default().push(id);
        self.vertex_keys.insert(key, id);
        self.register(Element::Vertex(id));
        Ok(id)
    }

    pub fn add_edge(&mut self, kind: EdgeKind, source: VertexId, target: VertexId) -> StoreResult<EdgeId> {
        self.add_edge_with(kind, source, target, AHashMap::new())
    }

    /// Create (or find) an edge; attributes are merged into an existing one
    pub fn add_edge_with(
        &mut self,
        kind: EdgeKind,
        source: VertexId,
        target: VertexId,
        attrs: AHashMap<String, serde_json::Value>,
    ) -> StoreResult<EdgeId> {
        self.require_active()?;
        for v in [source, target] {
            if !self.universe.contains_node(v) {
                return Err(StoreError::MissingVertex(v));
            }
        }
        // Endpoints belong to whatever graph receives the relation
        self.register(Element::Vertex(source));
        self.register(Element::Vertex(target));

        let key = EdgeKey::new(kind, source, target);
        if let Some(&existing) = self.edge_keys.get(&key) {
            if let Some(edge) = self.universe.edge_weight_mut(existing) {
                edge.attrs.extend(attrs);
            }
            self.register(Element::Edge(existing));
            return Ok(existing);
        }

        let id = self.universe.add_edge(
            source,
            target,
            Edge {
                kind,
                source,
                target,
                attrs,
            },
        );
        self.edge_extents.entry(kind).or_default().push(id);
        self.edge_keys.insert(key, id);
        self.register(Element::Edge(id));
        Ok(id)
    }

    /// Add an existing element to one graph, without activating it
    pub fn insert_into(&mut self, graph: GraphId, element: Element) -> StoreResult<()> {
        match element {
            Element::Vertex(v) if !self.universe.contains_node(v) => {
                return Err(StoreError::MissingVertex(v));
            }
            Element::Edge(e) if self.universe.edge_weight(e).is_none() => {
                return Err(StoreError::MissingEdge(e));
            }
            _ => {}
        }
        let graph_id = graph;
        let graph = self.graph_mut(graph_id)?;
        if !graph.live {
            return Err(StoreError::DeadGraph(graph_id));
        }
        match element {
            Element::Vertex(v) => {
                graph.vertices.insert(v);
            }
            Element::Edge(e) => {
                graph.edges.insert(e);
            }
        }
        Ok(())
    }

    // ---------------- removal ----------------

    /// Drop an element from one graph only
    pub fn remove_from(&mut self, graph: GraphId, element: Element) -> StoreResult<()> {
        let graph = self.graph_mut(graph)?;
        match element {
            Element::Vertex(v) => {
                graph.vertices.remove(&v);
            }
            Element::Edge(e) => {
                graph.edges.remove(&e);
            }
        }
        Ok(())
    }

    /// Delete an edge from the universe and from every graph referencing it
    pub fn delete_edge(&mut self, id: EdgeId) -> StoreResult<Edge> {
        let edge = self
            .universe
            .remove_edge(id)
            .ok_or(StoreError::MissingEdge(id))?;
        self.edge_keys
            .remove(&EdgeKey::new(edge.kind, edge.source, edge.target));
        if let Some(extent) = self.edge_extents.get_mut(&edge.kind) {
            extent.retain(|&e| e != id);
        }
        for graph in self.graphs.iter_mut() {
            graph.edges.remove(&id);
        }
        Ok(edge)
    }

    /// Delete a vertex, its incident edges, and every graph reference to them
    pub fn delete_vertex(&mut self, id: VertexId) -> StoreResult<Vertex> {
        if !self.universe.contains_node(id) {
            return Err(StoreError::MissingVertex(id));
        }
        let incident: Vec<EdgeId> = self.incident(id).map(|(e, _)| e).collect();
        for e in incident {
            self.delete_edge(e)?;
        }

        let vertex = self
            .universe
            .remove_node(id)
            .ok_or(StoreError::MissingVertex(id))?;
        self.vertex_keys.remove(&vertex.data.key());
        if let Some(extent) = self.vertex_extents.get_mut(&vertex.kind()) {
            extent.retain(|&v| v != id);
        }
        for graph in self.graphs.iter_mut() {
            graph.vertices.remove(&id);
        }
        Ok(vertex)
    }

    // ---------------- access ----------------

    #[inline]
    pub fn is_alive(&self, id: VertexId) -> bool {
        self.universe.contains_node(id)
    }

    pub fn vertex(&self, id: VertexId) -> StoreResult<&Vertex> {
        self.universe
            .node_weight(id)
            .ok_or(StoreError::MissingVertex(id))
    }

    /// Mutable access; callers must only touch additional fields
    pub fn vertex_mut(&mut self, id: VertexId) -> StoreResult<&mut Vertex> {
        self.universe
            .node_weight_mut(id)
            .ok_or(StoreError::MissingVertex(id))
    }

    pub fn data(&self, id: VertexId) -> StoreResult<&VertexData> {
        self.vertex(id).map(|v| &v.data)
    }

    pub fn data_mut(&mut self, id: VertexId) -> StoreResult<&mut VertexData> {
        self.vertex_mut(id).map(|v| &mut v.data)
    }

    pub fn kind_of(&self, id: VertexId) -> StoreResult<VertexKind> {
        self.vertex(id).map(Vertex::kind)
    }

    /// Fail unless `id` is a vertex of `expected` kind
    pub fn expect_kind(&self, id: VertexId, expected: VertexKind) -> StoreResult<&VertexData> {
        let data = self.data(id)?;
        if data.kind() != expected {
            return Err(StoreError::WrongKind {
                vertex: id,
                expected,
                found: data.kind(),
            });
        }
        Ok(data)
    }

    pub fn edge(&self, id: EdgeId) -> StoreResult<&Edge> {
        self.universe
            .edge_weight(id)
            .ok_or(StoreError::MissingEdge(id))
    }

    /// Live vertex with the given identity
    pub fn find(&self, key: &VertexKey) -> Option<VertexId> {
        self.vertex_keys.get(key).copied()
    }

    pub fn find_edge(&self, kind: EdgeKind, source: VertexId, target: VertexId) -> Option<EdgeId> {
        self.edge_keys
            .get(&EdgeKey::new(kind, source, target))
            .copied()
    }

    /// Every live vertex of a kind, in creation order
    pub fn extent(&self, kind: VertexKind) -> &[VertexId] {
        self.vertex_extents
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every live edge of a kind, in creation order
    pub fn edge_extent(&self, kind: EdgeKind) -> &[EdgeId] {
        self.edge_extents
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vertex_count(&self) -> usize {
        self.universe.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.universe.edge_count()
    }

    // ---------------- traversal ----------------

    pub fn out_edges(&self, v: VertexId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.universe
            .edges_directed(v, Direction::Outgoing)
            .map(|e| (e.id(), e.weight()))
    }

    pub fn in_edges(&self, v: VertexId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.universe
            .edges_directed(v, Direction::Incoming)
            .map(|e| (e.id(), e.weight()))
    }

    /// Edges touching `v` in either direction (self-loops once)
    pub fn incident(&self, v: VertexId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.out_edges(v)
            .chain(self.in_edges(v).filter(move |(_, e)| e.source != v))
    }

    /// Destinations of outgoing `kind` edges, plus the far end of undirected ones
    pub fn out_neighbors(&self, v: VertexId, kind: EdgeKind) -> Vec<VertexId> {
        if kind.is_directed() {
            self.out_edges(v)
                .filter(|(_, e)| e.kind == kind)
                .map(|(_, e)| e.target)
                .collect()
        } else {
            self.neighbors_by(v, kind)
        }
    }

    /// Sources of incoming `kind` edges, plus the far end of undirected ones
    pub fn in_neighbors(&self, v: VertexId, kind: EdgeKind) -> Vec<VertexId> {
        if kind.is_directed() {
            self.in_edges(v)
                .filter(|(_, e)| e.kind == kind)
                .map(|(_, e)| e.source)
                .collect()
        } else {
            self.neighbors_by(v, kind)
        }
    }

    fn neighbors_by(&self, v: VertexId, kind: EdgeKind) -> Vec<VertexId> {
        self.incident(v)
            .filter(|(_, e)| e.kind == kind)
            .map(|(_, e)| e.other(v))
            .collect()
    }

    /// Every adjacent vertex regardless of direction
    pub fn neighbors(&self, v: VertexId) -> Vec<VertexId> {
        self.incident(v).map(|(_, e)| e.other(v)).collect()
    }

    /// The single destination of an outgoing `kind` edge
    pub fn single_out(&self, v: VertexId, kind: EdgeKind) -> StoreResult<VertexId> {
        Self::exactly_one(v, kind, "outgoing", self.out_neighbors(v, kind))
    }

    /// The single source of an incoming `kind` edge
    pub fn single_in(&self, v: VertexId, kind: EdgeKind) -> StoreResult<VertexId> {
        Self::exactly_one(v, kind, "incoming", self.in_neighbors(v, kind))
    }

    fn exactly_one(
        vertex: VertexId,
        kind: EdgeKind,
        direction: &'static str,
        found: Vec<VertexId>,
    ) -> StoreResult<VertexId> {
        match found.as_slice() {
            [only] => Ok(*only),
            _ => Err(StoreError::Relation {
                vertex,
                kind,
                direction,
                found: found.len(),
            }),
        }
    }

    /// Incident edges that belong to `graph`
    pub fn incident_in<'a>(
        &'a self,
        graph: &'a Graph,
        v: VertexId,
    ) -> impl Iterator<Item = (EdgeId, &'a Edge)> + 'a {
        self.incident(v).filter(move |(id, _)| graph.contains_edge(*id))
    }

    // ---------------- reporting ----------------

    pub fn stats(&self, id: GraphId) -> StoreResult<GraphStats> {
        let graph = self.graph(id)?;
        let mut stats = GraphStats {
            total_vertices: graph.vertex_count(),
            total_edges: graph.edge_count(),
            ..GraphStats::default()
        };
        for v in graph.vertices() {
            if let Ok(kind) = self.kind_of(v) {
                *stats.vertices_by_kind.entry(kind).or_insert(0) += 1;
            }
        }
        for e in graph.edges() {
            if let Ok(edge) = self.edge(e) {
                *stats.edges_by_kind.entry(edge.kind).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}
