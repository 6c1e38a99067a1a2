// Filesystem tree finalizer
//
// 1. Promotion: a File is really a Directory when another observed path lies
//    below it, when a Directory of the same path exists, or when it is a
//    root. Its relations move to the Directory and the File is deleted.
// 2. Tree: every File/Directory is chained to the analysis host, creating the
//    intermediate directories nobody touched.

use ahash::AHashSet;
use tracing::{debug, info, warn};

use super::super::domain::FsPath;
use crate::pipeline::{BuildContext, PipelineResult};
use crate::shared::models::{EdgeKind, Store, VertexData, VertexId, VertexKey, VertexKind};
use crate::shared::utils::Platform;

pub(crate) fn build_tree(ctx: &mut BuildContext) -> PipelineResult<()> {
    let promoted = promote_directories(ctx)?;
    let host = ctx.host()?;

    let mut nodes = ctx.members(VertexKind::Directory);
    nodes.extend(ctx.members(VertexKind::File));
    let mut attached = 0;
    for node in nodes {
        let Some(path) = stored_path(&ctx.store, node, ctx.platform) else {
            warn!(vertex = ?node, "Filesystem vertex with an unparsable path");
            continue;
        };
        attach(ctx, host, node, &path)?;
        attached += 1;
    }
    info!(promoted, attached, "Filesystem tree built");
    Ok(())
}

fn stored_path(store: &Store, node: VertexId, platform: Platform) -> Option<FsPath> {
    let data = store.data(node).ok()?.as_path()?;
    FsPath::parse(&data.path, platform)
}

fn promote_directories(ctx: &mut BuildContext) -> PipelineResult<usize> {
    let mut parents: AHashSet<String> = AHashSet::new();
    for kind in [VertexKind::File, VertexKind::Directory] {
        for node in ctx.members(kind) {
            if let Some(path) = stored_path(&ctx.store, node, ctx.platform) {
                parents.extend(path.ancestors().map(|a| a.folded()));
            }
        }
    }

    let mut promoted = 0;
    for file in ctx.members(VertexKind::File) {
        let Some(path) = stored_path(&ctx.store, file, ctx.platform) else {
            continue;
        };
        let folded = path.folded();
        let is_directory = path.is_root()
            || parents.contains(&folded)
            || ctx.store.find(&VertexKey::Directory(folded)).is_some();
        if is_directory {
            promote(ctx, file, &path)?;
            promoted += 1;
        }
    }
    Ok(promoted)
}

/// Replace `file` by a Directory of the same path, keeping every relation
fn promote(ctx: &mut BuildContext, file: VertexId, path: &FsPath) -> PipelineResult<VertexId> {
    let exists = ctx.store.data(file)?.as_path().and_then(|p| p.exists);
    let relations: Vec<_> = ctx
        .store
        .incident(file)
        .map(|(_, edge)| (edge.kind, edge.source, edge.target, edge.attrs.clone()))
        .collect();

    ctx.store.delete_vertex(file)?;
    let directory = ctx.add(VertexData::Directory(path.to_path_data(exists)))?;
    if let Some(data) = ctx.store.data_mut(directory)?.as_path_mut() {
        data.exists = data.exists.or(exists);
    }

    let swap = |v: VertexId| if v == file { directory } else { v };
    for (kind, source, target, attrs) in relations {
        ctx.store
            .add_edge_with(kind, swap(source), swap(target), attrs)?;
    }
    debug!(path = %path.display(), "Promoted file to directory");
    Ok(directory)
}

fn has_parent(store: &Store, node: VertexId) -> bool {
    !store.in_neighbors(node, EdgeKind::Contains).is_empty()
        || !store.in_neighbors(node, EdgeKind::HasDrive).is_empty()
}

/// Directory vertex for `path`, created when missing
fn ensure_directory(ctx: &mut BuildContext, path: &FsPath) -> PipelineResult<VertexId> {
    ctx.add(VertexData::Directory(path.to_path_data(None)))
}

/// Chain `node` up to the host, stopping at the first ancestor already placed
fn attach(ctx: &mut BuildContext, host: VertexId, node: VertexId, path: &FsPath) -> PipelineResult<()> {
    let mut child = node;
    let mut current = path.clone();
    loop {
        match current.parent() {
            None => {
                ctx.link(EdgeKind::HasDrive, host, child)?;
                return Ok(());
            }
            Some(parent) => {
                let directory = ensure_directory(ctx, &parent)?;
                let placed = has_parent(&ctx.store, directory);
                ctx.link(EdgeKind::Contains, directory, child)?;
                if placed {
                    return Ok(());
                }
                child = directory;
                current = parent;
            }
        }
    }
}

/// Resolve `path` by walking the tree from `host`, one component at a time
///
/// Returns the File or Directory at the end of the walk, or `None` as soon
/// as a component is missing.
pub fn walk(store: &Store, host: VertexId, path: &FsPath) -> Option<VertexId> {
    let child_with = |parent: VertexId, relation: EdgeKind, folded: &str| {
        store
            .out_neighbors(parent, relation)
            .into_iter()
            .find(|v| {
                store
                    .data(*v)
                    .ok()
                    .and_then(VertexData::as_path)
                    .map(|p| p.folded == folded)
                    .unwrap_or(false)
            })
    };

    let mut current = child_with(host, EdgeKind::HasDrive, &path.prefix(0).folded())?;
    for depth in 1..=path.parts().len() {
        current = child_with(current, EdgeKind::Contains, &path.prefix(depth).folded())?;
    }
    Some(current)
}
