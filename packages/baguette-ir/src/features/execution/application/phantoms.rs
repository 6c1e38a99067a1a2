use tracing::{debug, info};

use crate::pipeline::{BuildContext, PipelineResult};
use crate::shared::models::{EdgeKind, VertexData, VertexId, VertexKind};

fn is_call(ctx: &BuildContext, vertex: VertexId) -> bool {
    matches!(ctx.store.kind_of(vertex), Ok(VertexKind::Call))
}

/// Some call reached `vertex`: opened it, injected into it, ...
fn targeted_by_call(ctx: &BuildContext, vertex: VertexId) -> bool {
    ctx.store
        .in_edges(vertex)
        .any(|(_, edge)| is_call(ctx, edge.source))
}

/// A process has genuine effects when one of its threads recorded calls, or
/// when a call points at it or at one of its threads
fn has_genuine_effects(ctx: &BuildContext, process: VertexId) -> bool {
    if targeted_by_call(ctx, process) {
        return true;
    }
    ctx.store
        .out_neighbors(process, EdgeKind::HasThread)
        .into_iter()
        .any(|t| {
            let recorded = ctx
                .store
                .data(t)
                .ok()
                .and_then(VertexData::as_thread)
                .map(|data| data.n_calls > 0)
                .unwrap_or(false);
            recorded || targeted_by_call(ctx, t)
        })
}

/// Drop placeholder processes: no parent, no executable, no effects
///
/// Children are re-parented to the host first; the phantom's own threads go
/// with it.
pub(crate) fn remove_phantoms(ctx: &mut BuildContext) -> PipelineResult<()> {
    let host = ctx.host()?;
    let mut removed = 0;

    for process in ctx.members(VertexKind::Process) {
        let Some(data) = ctx.store.data(process)?.as_process() else {
            continue;
        };
        if data.executable.is_some() {
            continue;
        }
        if !ctx
            .store
            .in_neighbors(process, EdgeKind::HasChildProcess)
            .is_empty()
        {
            continue;
        }
        if has_genuine_effects(ctx, process) {
            continue;
        }

        for child in ctx.store.out_neighbors(process, EdgeKind::HasChildProcess) {
            ctx.link(EdgeKind::SpawnedProcess, host, child)?;
        }
        for thread in ctx.store.out_neighbors(process, EdgeKind::HasThread) {
            ctx.store.delete_vertex(thread)?;
            ctx.forget_owner(thread);
        }
        let vertex = ctx.store.delete_vertex(process)?;
        debug!(process = %vertex.data.label(), "Removed phantom process");
        removed += 1;
    }

    info!(removed, "Phantom process removal done");
    Ok(())
}
