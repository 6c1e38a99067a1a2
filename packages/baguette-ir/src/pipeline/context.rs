// Build Context
//
// Everything one compilation mutates: the graph store and its build graph,
// the analysis host, the detected platform and the per-package state. Phases,
// call handlers and finalizer callbacks all receive it by `&mut`.

use ahash::AHashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use crate::config::BuildConfig;
use crate::features::trace_source::CallRecord;
use crate::shared::models::{EdgeId, EdgeKind, GraphId, Store, VertexData, VertexId, VertexKind};
use crate::shared::utils::args::value_as_u64;
use crate::shared::utils::{Extensions, Platform};

/// Graph data key holding the id of the build currently writing the graph
pub const BUILDER_KEY: &str = "builder";

/// Graph data key holding the platform string
pub const PLATFORM_KEY: &str = "platform";

/// One call, resolved to its owning thread and process
#[derive(Debug, Clone)]
pub struct Invocation {
    pub call: VertexId,
    pub seq: u64,
    pub record: Arc<CallRecord>,
    pub thread: VertexId,
    pub process: VertexId,
}

impl Invocation {
    #[inline]
    pub fn api(&self) -> &str {
        &self.record.api
    }

    #[inline]
    pub fn succeeded(&self) -> bool {
        self.record.status
    }

    /// Handle returned by a Win32 wrapper; native calls return an NTSTATUS
    pub fn returned_handle(&self) -> Option<u64> {
        if self.record.api.starts_with("Nt") {
            return None;
        }
        value_as_u64(&self.record.return_value)
            .filter(|h| *h != 0 && *h != u64::MAX && *h != 0xffff_ffff)
    }

    /// Source-data error tagged with this call
    pub fn unusable(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::source_data(
            format!(
                "{} (process {}, call {})",
                self.record.api, self.record.location.0, self.record.location.1
            ),
            reason,
        )
    }
}

#[derive(Debug)]
pub struct BuildContext {
    pub store: Store,
    pub graph: GraphId,
    pub config: Arc<BuildConfig>,
    pub platform: Platform,
    pub build_id: Uuid,
    /// Per-package tables (open handles, latest registry versions, ...)
    pub extensions: Extensions,
    host: Option<VertexId>,
    /// Thread -> owning process, filled during graph building
    owners: AHashMap<VertexId, VertexId>,
    /// Calls in global time order
    pub(crate) ordered_calls: Vec<VertexId>,
}

impl BuildContext {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        let mut store = Store::new();
        let graph = store.create_graph();
        let platform = Platform::detect(&config.default_platform);
        Self {
            store,
            graph,
            config,
            platform,
            build_id: Uuid::nil(),
            extensions: Extensions::new(),
            host: None,
            owners: AHashMap::new(),
            ordered_calls: Vec::new(),
        }
    }

    // ---------------- graph shorthands ----------------

    #[inline]
    pub fn add(&mut self, data: VertexData) -> PipelineResult<VertexId> {
        Ok(self.store.add_vertex(data)?)
    }

    #[inline]
    pub fn link(&mut self, kind: EdgeKind, source: VertexId, target: VertexId) -> PipelineResult<EdgeId> {
        Ok(self.store.add_edge(kind, source, target)?)
    }

    pub fn link_with(
        &mut self,
        kind: EdgeKind,
        source: VertexId,
        target: VertexId,
        attrs: impl IntoIterator<Item = (&'static str, serde_json::Value)>,
    ) -> PipelineResult<EdgeId> {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(self.store.add_edge_with(kind, source, target, attrs)?)
    }

    /// Live vertices of `kind` that belong to this build's graph
    pub fn members(&self, kind: VertexKind) -> Vec<VertexId> {
        let Ok(graph) = self.store.graph(self.graph) else {
            return Vec::new();
        };
        self.store
            .extent(kind)
            .iter()
            .copied()
            .filter(|v| graph.contains_vertex(*v))
            .collect()
    }

    // ---------------- host / ownership ----------------

    pub(crate) fn set_host(&mut self, host: VertexId) {
        self.host = Some(host);
    }

    /// The analysis host; missing only if network discovery never ran
    pub fn host(&self) -> PipelineResult<VertexId> {
        self.host.ok_or_else(|| {
            PipelineError::structural("host lookup", "no analysis host has been discovered")
        })
    }

    pub(crate) fn set_owner(&mut self, thread: VertexId, process: VertexId) {
        self.owners.insert(thread, process);
    }

    /// Process owning `thread`
    pub fn owner_of(&self, thread: VertexId) -> PipelineResult<VertexId> {
        match self.owners.get(&thread) {
            Some(process) => Ok(*process),
            None => Ok(self.store.single_in(thread, EdgeKind::HasThread)?),
        }
    }

    pub(crate) fn forget_owner(&mut self, thread: VertexId) {
        self.owners.remove(&thread);
    }
}
