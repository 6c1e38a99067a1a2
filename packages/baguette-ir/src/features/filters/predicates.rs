//! Provided filters

use ahash::AHashSet;
use serde_json::Value;

use super::filter::{Filter, GraphPredicate};
use crate::shared::models::{Edge, EdgeKind, Graph, Store, VertexData, VertexId, VertexKind};

pub fn provided() -> [Filter; 7] {
    [
        Filter::new("effectless-calls", |_, _| Box::new(EffectlessCalls)),
        Filter::new("data-nodes", |_, _| Box::new(DataNodes)),
        Filter::new("simple-imports", |_, _| Box::new(SimpleImports)),
        Filter::new("non-essential-handles", |_, _| Box::new(NonEssentialHandles)),
        Filter::new("non-injected-threads", |_, _| Box::new(NonInjectedThreads)),
        Filter::new("insignificant-processes", |store, graph| {
            Box::new(InsignificantProcesses::bind(store, graph))
        }),
        Filter::new("read-only-registry", |store, graph| {
            Box::new(ReadOnlyRegistry::bind(store, graph))
        }),
    ]
}

/// Keeps everything; used to copy a graph
pub(crate) fn identity() -> Filter {
    Filter::new("identity", |_, _| Box::new(KeepAll))
}

struct KeepAll;

impl GraphPredicate for KeepAll {
    fn accepts_vertex(&self, _: &Store, _: &Graph, _: VertexId) -> bool {
        true
    }

    fn accepts_edge(&self, _: &Store, _: &Graph, _: &Edge) -> bool {
        true
    }
}

fn kind(store: &Store, v: VertexId) -> Option<VertexKind> {
    store.kind_of(v).ok()
}

fn has_incoming(store: &Store, graph: &Graph, v: VertexId, kinds: &[EdgeKind]) -> bool {
    store
        .incident_in(graph, v)
        .any(|(_, e)| e.target == v && kinds.contains(&e.kind))
}

// ============================================================
// Local predicates
// ============================================================

/// A Call stays when it touches something other than another Call
struct EffectlessCalls;

impl GraphPredicate for EffectlessCalls {
    fn accepts_vertex(&self, store: &Store, graph: &Graph, v: VertexId) -> bool {
        if kind(store, v) != Some(VertexKind::Call) {
            return true;
        }
        store
            .incident_in(graph, v)
            .any(|(_, e)| kind(store, e.other(v)) != Some(VertexKind::Call))
    }
}

struct DataNodes;

impl GraphPredicate for DataNodes {
    fn accepts_vertex(&self, store: &Store, _: &Graph, v: VertexId) -> bool {
        kind(store, v) != Some(VertexKind::Data)
    }
}

/// An Import stays when its File is referenced by something other than
/// imports and the directory tree
struct SimpleImports;

impl GraphPredicate for SimpleImports {
    fn accepts_vertex(&self, store: &Store, graph: &Graph, v: VertexId) -> bool {
        if kind(store, v) != Some(VertexKind::Import) {
            return true;
        }
        store
            .incident_in(graph, v)
            .filter(|(_, e)| e.kind == EdgeKind::ImportsFile && e.source == v)
            .any(|(_, e)| {
                store.incident_in(graph, e.target).any(|(_, other)| {
                    !matches!(
                        other.kind,
                        EdgeKind::ImportsFile | EdgeKind::Contains | EdgeKind::HasDrive
                    )
                })
            })
    }
}

/// A handle stays when data flowed through it
struct NonEssentialHandles;

impl GraphPredicate for NonEssentialHandles {
    fn accepts_vertex(&self, store: &Store, graph: &Graph, v: VertexId) -> bool {
        if !kind(store, v).map(|k| k.is_handle()).unwrap_or(false) {
            return true;
        }
        has_incoming(
            store,
            graph,
            v,
            &[EdgeKind::Reads, EdgeKind::Writes, EdgeKind::UsesHandle],
        )
    }
}

/// A Thread stays when it was created from another process
struct NonInjectedThreads;

impl GraphPredicate for NonInjectedThreads {
    fn accepts_vertex(&self, store: &Store, graph: &Graph, v: VertexId) -> bool {
        if kind(store, v) != Some(VertexKind::Thread) {
            return true;
        }
        store.incident_in(graph, v).any(|(_, e)| {
            e.kind == EdgeKind::CreatesThread
                && e.target == v
                && e.attrs.get("remote") == Some(&Value::Bool(true))
        })
    }
}

// ============================================================
// Precomputed predicates
// ============================================================

/// A Process stays when it is a root of the process forest, has a neighbor
/// that is more than tree structure or an idle thread, or has such a
/// descendant
struct InsignificantProcesses {
    significant: AHashSet<VertexId>,
}

impl InsignificantProcesses {
    fn bind(store: &Store, graph: &Graph) -> Self {
        let processes: Vec<VertexId> = graph
            .vertices()
            .filter(|v| kind(store, *v) == Some(VertexKind::Process))
            .collect();

        let mut significant = AHashSet::new();
        let mut pending: Vec<VertexId> = Vec::new();
        for &p in processes.iter() {
            let is_root = !has_incoming(store, graph, p, &[EdgeKind::HasChildProcess]);
            if is_root || Self::has_effects(store, graph, p) {
                pending.push(p);
            }
        }

        // Significance flows from children up to every ancestor
        while let Some(p) = pending.pop() {
            if !significant.insert(p) {
                continue;
            }
            for (_, e) in store.incident_in(graph, p) {
                if e.kind == EdgeKind::HasChildProcess && e.target == p {
                    pending.push(e.source);
                }
            }
        }
        Self { significant }
    }

    fn has_effects(store: &Store, graph: &Graph, p: VertexId) -> bool {
        store.incident_in(graph, p).any(|(_, e)| match e.kind {
            EdgeKind::HasChildProcess | EdgeKind::SpawnedProcess => false,
            EdgeKind::HasThread => store
                .data(e.other(p))
                .ok()
                .and_then(VertexData::as_thread)
                .map(|t| t.n_calls > 0)
                .unwrap_or(false),
            _ => true,
        })
    }
}

impl GraphPredicate for InsignificantProcesses {
    fn accepts_vertex(&self, store: &Store, _: &Graph, v: VertexId) -> bool {
        kind(store, v) != Some(VertexKind::Process) || self.significant.contains(&v)
    }
}

/// Keys, entries and key handles stay when reachable from an entry that was
/// set or deleted (or a key that was deleted)
struct ReadOnlyRegistry {
    written: AHashSet<VertexId>,
}

impl ReadOnlyRegistry {
    fn bind(store: &Store, graph: &Graph) -> Self {
        let mut pending: Vec<VertexId> = graph
            .vertices()
            .filter(|v| match kind(store, *v) {
                Some(VertexKind::KeyEntry) => has_incoming(
                    store,
                    graph,
                    *v,
                    &[EdgeKind::SetsEntry, EdgeKind::DeletesEntry],
                ),
                Some(VertexKind::Key) => has_incoming(store, graph, *v, &[EdgeKind::DeletesKey]),
                _ => false,
            })
            .collect();

        let mut written = AHashSet::new();
        while let Some(v) = pending.pop() {
            if !written.insert(v) {
                continue;
            }
            for (_, e) in store.incident_in(graph, v) {
                let next = match e.kind {
                    // every version of a written value
                    EdgeKind::ChangesTowards => e.other(v),
                    // owning key and its ancestors
                    EdgeKind::HasEntry | EdgeKind::HasSubKey if e.target == v => e.source,
                    // handles on a kept key
                    EdgeKind::Designates if kind(store, v) == Some(VertexKind::Key) => e.other(v),
                    _ => continue,
                };
                pending.push(next);
            }
        }
        Self { written }
    }
}

impl GraphPredicate for ReadOnlyRegistry {
    fn accepts_vertex(&self, store: &Store, _: &Graph, v: VertexId) -> bool {
        match kind(store, v) {
            Some(VertexKind::Key) | Some(VertexKind::KeyEntry) | Some(VertexKind::KeyHandle) => {
                self.written.contains(&v)
            }
            _ => true,
        }
    }
}
