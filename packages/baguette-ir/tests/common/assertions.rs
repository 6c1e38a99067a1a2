//! Graph queries and assertions

use baguette_ir::shared::models::{EdgeKind, VertexData, VertexId, VertexKind};
use baguette_ir::Baguette;

/// Vertices of `kind` in the compiled graph
pub fn members(baguette: &Baguette, kind: VertexKind) -> Vec<VertexId> {
    baguette.members(kind)
}

/// Number of `kind` edges in the compiled graph
pub fn edge_count(baguette: &Baguette, kind: EdgeKind) -> usize {
    baguette
        .stats()
        .expect("compiled graph")
        .edges_by_kind
        .get(&kind)
        .copied()
        .unwrap_or(0)
}

pub fn assert_vertex_count(baguette: &Baguette, kind: VertexKind, expected: usize) {
    let found = members(baguette, kind).len();
    assert_eq!(found, expected, "Expected {expected} {kind} vertices, got {found}");
}

pub fn assert_edge_count(baguette: &Baguette, kind: EdgeKind, expected: usize) {
    let found = edge_count(baguette, kind);
    assert_eq!(found, expected, "Expected {expected} {kind} edges, got {found}");
}

/// Call vertex whose API is `api` (first in integration order)
pub fn call_named(baguette: &Baguette, api: &str) -> VertexId {
    baguette
        .ordered_calls
        .iter()
        .copied()
        .find(|c| {
            baguette
                .store
                .data(*c)
                .ok()
                .and_then(VertexData::as_call)
                .map(|data| data.api() == api)
                .unwrap_or(false)
        })
        .unwrap_or_else(|| panic!("no {api} call"))
}

/// Vertex of `kind` whose label is `label`
pub fn vertex_labelled(baguette: &Baguette, kind: VertexKind, label: &str) -> VertexId {
    members(baguette, kind)
        .into_iter()
        .find(|v| {
            baguette
                .store
                .data(*v)
                .map(|data| data.label() == label)
                .unwrap_or(false)
        })
        .unwrap_or_else(|| panic!("no {kind} labelled {label}"))
}

pub fn assert_linked(baguette: &Baguette, kind: EdgeKind, source: VertexId, target: VertexId) {
    assert!(
        baguette.store.find_edge(kind, source, target).is_some(),
        "Expected {kind} edge {source:?} -> {target:?}"
    );
}
