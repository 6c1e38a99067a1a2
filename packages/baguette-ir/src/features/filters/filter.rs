//! Filters and the predicates they bind

use std::fmt;
use tracing::debug;

use super::error::FilterResult;
use crate::shared::models::{Edge, Element, Graph, GraphId, Store, VertexId};

/// Acceptance test over the vertices and edges of one bound graph
pub trait GraphPredicate {
    fn accepts_vertex(&self, store: &Store, graph: &Graph, v: VertexId) -> bool;

    /// Edges are judged on their own; by default an edge is kept when both
    /// endpoints are
    fn accepts_edge(&self, store: &Store, graph: &Graph, edge: &Edge) -> bool {
        self.accepts_vertex(store, graph, edge.source)
            && self.accepts_vertex(store, graph, edge.target)
    }
}

/// Builds the predicate for one graph
pub type PredicateFactory = fn(&Store, &Graph) -> Box<dyn GraphPredicate>;

#[derive(Clone, Copy)]
pub struct Filter {
    name: &'static str,
    factory: PredicateFactory,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish()
    }
}

impl Filter {
    pub const fn new(name: &'static str, factory: PredicateFactory) -> Self {
        Self { name, factory }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Predicate bound to `graph`
    pub fn bind(&self, store: &Store, graph: GraphId) -> FilterResult<Box<dyn GraphPredicate>> {
        Ok((self.factory)(store, store.graph(graph)?))
    }

    /// Vertices then edges of `graph` the filter keeps
    pub fn accepted(&self, store: &Store, graph: GraphId) -> FilterResult<Vec<Element>> {
        let predicate = self.bind(store, graph)?;
        let view = store.graph(graph)?;

        let mut accepted: Vec<Element> = view
            .vertices()
            .filter(|v| predicate.accepts_vertex(store, view, *v))
            .map(Element::Vertex)
            .collect();
        for e in view.edges() {
            let edge = store.edge(e)?;
            if predicate.accepts_edge(store, view, edge) {
                accepted.push(Element::Edge(e));
            }
        }
        Ok(accepted)
    }

    /// New graph holding exactly the accepted content, with the same data bag
    pub fn apply(&self, store: &mut Store, graph: GraphId) -> FilterResult<GraphId> {
        let accepted = self.accepted(store, graph)?;
        let data = store.graph(graph)?.data.clone();

        let pruned = store.create_graph();
        store.graph_mut(pruned)?.data = data;
        for element in accepted.iter() {
            store.insert_into(pruned, *element)?;
        }

        let before = store.graph(graph)?;
        let after = store.graph(pruned)?;
        debug!(
            filter = self.name,
            vertices_removed = before.vertex_count() - after.vertex_count(),
            edges_removed = before.edge_count() - after.edge_count(),
            "Applied filter"
        );
        Ok(pruned)
    }
}
