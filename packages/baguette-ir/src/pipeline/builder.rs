// Builder
//
// Drives one compilation through its phases:
//
//   Initialization -> Network Discovery -> Input Parsing -> Graph Building
//   -> Call Ordering -> Call Interpretation -> Process Attribution
//   -> Call Skip-Linking -> Finalizer x N -> Teardown
//
// Each phase runs inside exactly one activation scope of the build graph and
// is announced on the toolchain bus before its own work starts. Teardown runs
// on every exit path; a failed build's partial graph is dropped.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{BuildContext, Invocation, BUILDER_KEY, PLATFORM_KEY};
use super::error::{PipelineError, PipelineResult};
use super::phase::*;
use super::progress::Progress;
use super::toolchain::Toolchain;
use crate::config::BuildConfig;
use crate::features::trace_source::{ProcessRecord, ThreadRecord, TraceSource};
use crate::features::{filesystem, imports, network};
use crate::shared::models::{
    time_bits, CallData, EdgeKind, Graph, GraphId, GraphStats, ProcessData, Store, StoreResult,
    ThreadData, VertexData, VertexId, VertexKind,
};
use crate::shared::utils::{Extensions, Platform};

/// A compiled behavior graph
#[derive(Debug)]
pub struct Baguette {
    pub store: Store,
    pub graph: GraphId,
    pub host: VertexId,
    pub platform: Platform,
    pub build_id: Uuid,
    /// Calls in the order they were integrated
    pub ordered_calls: Vec<VertexId>,
}

impl Baguette {
    pub fn view(&self) -> StoreResult<&Graph> {
        self.store.graph(self.graph)
    }

    pub fn stats(&self) -> StoreResult<GraphStats> {
        self.store.stats(self.graph)
    }

    /// Live vertices of `kind` in the compiled graph, in creation order
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
}

type ProcessKey = (u32, Option<u64>);

fn process_key(record: &ProcessRecord) -> ProcessKey {
    (record.pid, time_bits(record.start))
}

pub struct Builder {
    toolchain: Arc<Toolchain>,
    config: Arc<BuildConfig>,
    progress: Arc<Progress>,
}

impl Builder {
    pub fn new(toolchain: Arc<Toolchain>, config: BuildConfig) -> Self {
        Self {
            toolchain,
            config: Arc::new(config),
            progress: Arc::new(Progress::new()),
        }
    }

    /// Standard packages, default configuration
    pub fn standard() -> Self {
        Self::new(Toolchain::global(), BuildConfig::default())
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Shared progress handle, pollable while `build` runs
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn build(&self, source: &dyn TraceSource) -> PipelineResult<Baguette> {
        self.config.validate()?;
        let started = Instant::now();
        let mut ctx = BuildContext::new(Arc::clone(&self.config));

        let result = self.run(&mut ctx, source);
        self.teardown(&mut ctx);
        result?;

        let host = ctx.host()?;
        info!(
            build = %ctx.build_id,
            vertices = ctx.store.vertex_count(),
            edges = ctx.store.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Build complete"
        );
        Ok(Baguette {
            graph: ctx.graph,
            host,
            platform: ctx.platform,
            build_id: ctx.build_id,
            ordered_calls: ctx.ordered_calls,
            store: ctx.store,
        })
    }

    fn run(&self, ctx: &mut BuildContext, source: &dyn TraceSource) -> PipelineResult<()> {
        self.phase(ctx, INITIALIZATION, 0, |ctx| {
            ctx.build_id = Uuid::new_v4();
            let graph = ctx.graph;
            ctx.store
                .graph_mut(graph)?
                .data
                .insert(BUILDER_KEY.to_string(), ctx.build_id.to_string().into());
            Ok(())
        })?;

        self.phase(ctx, NETWORK_DISCOVERY, 0, |ctx| self.discover_network(ctx, source))?;

        let (tree, raw_total) = self.phase(ctx, INPUT_PARSING, 0, |_| {
            let tree = source.process_tree();
            let total: usize = tree.iter().map(|(_, p)| p.call_count()).sum();
            self.progress.reset(3 * total as u64);
            info!(processes = tree.len(), calls = total, "Parsed trace input");
            Ok((tree, total))
        })?;

        self.phase(ctx, GRAPH_BUILDING, 0, |ctx| {
            self.build_skeleton(ctx, &tree)?;
            self.declare_sample(ctx, source);
            Ok(())
        })?;

        self.phase(ctx, CALL_ORDERING, 0, |ctx| self.order_calls(ctx, raw_total))?;
        self.phase(ctx, CALL_INTERPRETATION, 0, |ctx| self.interpret(ctx))?;
        self.phase(ctx, PROCESS_ATTRIBUTION, 0, attribute_processes)?;

        if self.config.skip_linking {
            self.phase(ctx, CALL_SKIP_LINKING, 0, link_significant_calls)?;
        }

        if self.config.finalizers {
            let rounds = self.toolchain.reservations().count();
            for round in 0..rounds {
                self.phase(ctx, FINALIZER, round, |_| Ok(()))?;
            }
        }
        Ok(())
    }

    /// Run `body` inside one activation scope, after announcing the phase
    fn phase<R>(
        &self,
        ctx: &mut BuildContext,
        major: &'static str,
        minor: usize,
        body: impl FnOnce(&mut BuildContext) -> PipelineResult<R>,
    ) -> PipelineResult<R> {
        info!(phase = major, round = minor, "Entering phase");
        let started = Instant::now();

        ctx.store.enter(ctx.graph)?;
        let result = self
            .toolchain
            .bus()
            .throw_event(ctx, BuildingPhase::new(major, minor))
            .map_err(PipelineError::from)
            .and_then(|_| body(ctx));
        let exited = ctx.store.exit();

        let value = result?;
        exited?;
        debug!(
            phase = major,
            round = minor,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Phase done"
        );
        Ok(value)
    }

    fn teardown(&self, ctx: &mut BuildContext) {
        let graph = ctx.graph;
        if let Ok(graph) = ctx.store.graph_mut(graph) {
            graph.data.remove(BUILDER_KEY);
        }
        while ctx.store.exit().is_ok() {}
        ctx.extensions = Extensions::new();
        debug!(build = %ctx.build_id, "Teardown");
    }

    // ============================================================
    // Network Discovery
    // ============================================================

    fn discover_network(&self, ctx: &mut BuildContext, source: &dyn TraceSource) -> PipelineResult<()> {
        let platform = match source.platform().trim() {
            "" => self.config.default_platform.clone(),
            named => named.to_string(),
        };
        ctx.platform = Platform::detect(&platform);
        let graph = ctx.graph;
        ctx.store
            .graph_mut(graph)?
            .data
            .insert(PLATFORM_KEY.to_string(), platform.into());

        let primary = source.host();
        let host = ctx.add(VertexData::Host(network::host_data(primary, true)))?;
        ctx.set_host(host);

        let mut peers = 0;
        for machine in source.machines() {
            if !primary.address.is_empty() && machine.address == primary.address {
                continue;
            }
            if machine.address.is_empty() && machine.hostname.is_empty() {
                continue;
            }
            ctx.add(VertexData::Host(network::host_data(machine, false)))?;
            peers += 1;
        }
        info!(platform = ?ctx.platform, peers, "Discovered machines");
        Ok(())
    }

    // ============================================================
    // Graph Building
    // ============================================================

    fn build_skeleton(
        &self,
        ctx: &mut BuildContext,
        tree: &[(Option<&ProcessRecord>, &ProcessRecord)],
    ) -> PipelineResult<()> {
        let known: AHashSet<ProcessKey> = tree.iter().map(|(_, p)| process_key(p)).collect();
        let mut children: AHashMap<ProcessKey, Vec<&ProcessRecord>> = AHashMap::new();
        let mut roots = Vec::new();
        for (parent, process) in tree.iter().copied() {
            match parent {
                Some(parent)
                    if known.contains(&process_key(parent))
                        && process_key(parent) != process_key(process) =>
                {
                    children.entry(process_key(parent)).or_default().push(process)
                }
                _ => roots.push(process),
            }
        }

        let mut seq = 0u64;
        let mut visited = AHashSet::new();
        for root in roots {
            self.visit_tree(ctx, root, &children, &mut visited, &mut seq)?;
        }
        // Parent links forming a cycle never reach a root
        for (_, process) in tree.iter() {
            if !visited.contains(&process_key(process)) {
                warn!(pid = process.pid, "Process unreachable from any root, attaching as root");
                self.visit_tree(ctx, process, &children, &mut visited, &mut seq)?;
            }
        }
        debug!(calls = seq, "Built process skeleton");
        Ok(())
    }

    /// Parent before children, depth first
    fn visit_tree<'a>(
        &self,
        ctx: &mut BuildContext,
        root: &'a ProcessRecord,
        children: &AHashMap<ProcessKey, Vec<&'a ProcessRecord>>,
        visited: &mut AHashSet<ProcessKey>,
        seq: &mut u64,
    ) -> PipelineResult<()> {
        let mut stack: Vec<(&ProcessRecord, Option<VertexId>)> = vec![(root, None)];
        while let Some((record, parent)) = stack.pop() {
            if !visited.insert(process_key(record)) {
                continue;
            }
            let process = self.build_process(ctx, record, parent, seq)?;
            if let Some(kids) = children.get(&process_key(record)) {
                stack.extend(kids.iter().rev().map(|kid| (*kid, Some(process))));
            }
        }
        Ok(())
    }

    fn build_process(
        &self,
        ctx: &mut BuildContext,
        record: &ProcessRecord,
        parent: Option<VertexId>,
        seq: &mut u64,
    ) -> PipelineResult<VertexId> {
        let process = ctx.add(VertexData::Process(ProcessData {
            pid: record.pid,
            start: record.start,
            command_line: record.command_line.clone(),
            executable: record.executable.clone(),
            stop: record.stop,
        }))?;
        if let Some(parent) = parent {
            ctx.link(EdgeKind::HasChildProcess, parent, process)?;
        }
        imports::attach_static(ctx, process, &record.imports)?;
        for thread in &record.threads {
            self.build_thread(ctx, process, thread, seq)?;
        }
        Ok(process)
    }

    /// Thread vertex plus its `FollowedBy` call chain
    fn build_thread(
        &self,
        ctx: &mut BuildContext,
        process: VertexId,
        record: &ThreadRecord,
        seq: &mut u64,
    ) -> PipelineResult<VertexId> {
        let thread = ctx.add(VertexData::Thread(ThreadData::new(
            process,
            record.tid,
            record.start,
            record.stop,
        )))?;
        ctx.link(EdgeKind::HasThread, process, thread)?;
        ctx.set_owner(thread, process);

        // Recorded order, then stable by time
        let mut numbered: Vec<(u64, _)> = record
            .calls
            .iter()
            .map(|call| {
                let n = *seq;
                *seq += 1;
                (n, call)
            })
            .collect();
        numbered.sort_by(|a, b| a.1.time.total_cmp(&b.1.time));

        // A thread listed twice by the same process continues its chain
        let mut prev = ctx
            .store
            .data(thread)?
            .as_thread()
            .and_then(|t| t.last);
        let mut chain = Vec::with_capacity(numbered.len());
        for (n, call) in numbered {
            let vertex = ctx.add(VertexData::Call(CallData {
                seq: n,
                record: Arc::clone(call),
                thread: None,
            }))?;
            if let Some(prev) = prev {
                ctx.link(EdgeKind::FollowedBy, prev, vertex)?;
            }
            prev = Some(vertex);
            chain.push(vertex);
            self.progress.advance(1);
        }

        for &call in &chain {
            if let Some(data) = ctx.store.data_mut(call)?.as_call_mut() {
                data.thread = Some(thread);
            }
        }
        if let Some(data) = ctx.store.data_mut(thread)?.as_thread_mut() {
            if data.first.is_none() {
                data.first = chain.first().copied();
            }
            if let Some(last) = chain.last() {
                data.last = Some(*last);
            }
            data.n_calls += chain.len();
        }
        Ok(thread)
    }

    /// Mark the sample as an existing file executed by its process
    ///
    /// Best effort: every failure here is logged and tolerated.
    fn declare_sample(&self, ctx: &mut BuildContext, source: &dyn TraceSource) {
        let path = match source.sample_file_path() {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "Sample file path unavailable");
                return;
            }
        };
        let file = match filesystem::declare_existing(ctx, &path) {
            Ok(Some(file)) => file,
            Ok(None) => {
                warn!(path = %path, "Sample file path cannot be normalized");
                return;
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Could not declare sample file");
                return;
            }
        };

        let folded = ctx.platform.fold(&path);
        let executing = ctx.members(VertexKind::Process).into_iter().find(|p| {
            ctx.store
                .data(*p)
                .ok()
                .and_then(VertexData::as_process)
                .and_then(|data| data.executable.as_deref())
                .map(|exe| ctx.platform.fold(exe) == folded)
                .unwrap_or(false)
        });
        match executing {
            Some(process) => {
                if let Err(err) = ctx.link(EdgeKind::Executes, process, file) {
                    warn!(error = %err, "Could not link sample to its process");
                }
            }
            None => warn!(path = %path, "No traced process executes the sample"),
        }
    }

    // ============================================================
    // Call Ordering / Interpretation
    // ============================================================

    fn order_calls(&self, ctx: &mut BuildContext, raw_total: usize) -> PipelineResult<()> {
        let mut flat: Vec<(f64, VertexId)> = Vec::with_capacity(raw_total);
        for thread in ctx.members(VertexKind::Thread) {
            let (first, n_calls) = match ctx.store.data(thread)?.as_thread() {
                Some(data) => (data.first, data.n_calls),
                None => continue,
            };
            let mut cursor = first;
            let mut walked = 0;
            while let Some(call) = cursor {
                if walked == n_calls {
                    break;
                }
                let time = ctx
                    .store
                    .data(call)?
                    .as_call()
                    .map(|c| c.time())
                    .ok_or_else(|| {
                        PipelineError::structural(CALL_ORDERING, "call chain reaches a non-call vertex")
                    })?;
                flat.push((time, call));
                walked += 1;
                cursor = ctx
                    .store
                    .out_neighbors(call, EdgeKind::FollowedBy)
                    .first()
                    .copied();
            }
        }

        // par_sort_by is stable: ties keep chain order
        flat.par_sort_by(|a, b| a.0.total_cmp(&b.0));

        if flat.len() < raw_total {
            warn!(
                expected = raw_total,
                found = flat.len(),
                forgotten = raw_total - flat.len(),
                "Forgotten calls"
            );
        }
        self.progress.set_total((raw_total + 2 * flat.len()) as u64);
        self.progress.advance(flat.len() as u64);
        ctx.ordered_calls = flat.into_iter().map(|(_, call)| call).collect();
        Ok(())
    }

    fn interpret(&self, ctx: &mut BuildContext) -> PipelineResult<()> {
        let calls = std::mem::take(&mut ctx.ordered_calls);
        let dispatch = self.toolchain.dispatch();
        let mut handled = 0usize;

        for &call in &calls {
            let (seq, record, thread) = {
                let data = ctx.store.data(call)?.as_call().ok_or_else(|| {
                    PipelineError::structural(CALL_INTERPRETATION, "ordered entry is not a call")
                })?;
                let thread = data.thread.ok_or_else(|| {
                    PipelineError::structural(CALL_INTERPRETATION, "call is not bound to a thread")
                })?;
                (data.seq, Arc::clone(&data.record), thread)
            };
            let process = ctx.owner_of(thread)?;
            let invocation = Invocation {
                call,
                seq,
                record,
                thread,
                process,
            };
            handled += dispatch.integrate(ctx, &invocation)?;
            self.progress.advance(1);
        }

        info!(calls = calls.len(), handled, "Interpreted calls");
        ctx.ordered_calls = calls;
        Ok(())
    }
}

// ============================================================
// Process Attribution / Skip-Linking
// ============================================================

fn attribute_processes(ctx: &mut BuildContext) -> PipelineResult<()> {
    let host = ctx.host()?;
    let mut roots = 0;
    for process in ctx.members(VertexKind::Process) {
        if ctx
            .store
            .in_neighbors(process, EdgeKind::HasChildProcess)
            .is_empty()
        {
            ctx.link(EdgeKind::SpawnedProcess, host, process)?;
            roots += 1;
        }
    }
    debug!(roots, "Attributed root processes to the host");
    Ok(())
}

/// A call is significant when it has any relation besides call chaining
pub fn is_significant(store: &Store, call: VertexId) -> bool {
    store.incident(call).any(|(_, edge)| !edge.kind.is_chain())
}

fn link_significant_calls(ctx: &mut BuildContext) -> PipelineResult<()> {
    let mut links = 0;
    for thread in ctx.members(VertexKind::Thread) {
        let (first, n_calls) = match ctx.store.data(thread)?.as_thread() {
            Some(data) => (data.first, data.n_calls),
            None => continue,
        };
        let mut previous: Option<VertexId> = None;
        let mut cursor = first;
        let mut walked = 0;
        while let Some(call) = cursor {
            if walked == n_calls {
                break;
            }
            walked += 1;
            let next = ctx
                .store
                .out_neighbors(call, EdgeKind::FollowedBy)
                .first()
                .copied();
            if is_significant(&ctx.store, call) {
                if let Some(previous) = previous {
                    ctx.link(EdgeKind::NextSignificantCall, previous, call)?;
                    links += 1;
                }
                previous = Some(call);
            }
            cursor = next;
        }
    }
    debug!(links, "Linked significant calls");
    Ok(())
}
