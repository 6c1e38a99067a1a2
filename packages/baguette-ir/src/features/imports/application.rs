//! Static import attachment and module load handlers

use super::domain::resolve_module;
use crate::features::filesystem::touch_path;
use crate::features::trace_source::ImportRecord;
use crate::pipeline::{BuildContext, DispatchTable, Invocation, PipelineResult};
use crate::shared::models::{EdgeKind, ImportData, VertexData, VertexId, VertexKind};
use crate::shared::utils::CallArgs;

const MODULE_NAME: &[&str] = &[
    "ModuleFileName",
    "module_name",
    "FileName",
    "DllName",
    "lpLibFileName",
    "lpFileName",
    "library",
];

pub(crate) fn register(dispatch: &DispatchTable) {
    dispatch.register(
        [
            "LdrLoadDll",
            "LdrGetDllHandle",
            "LoadLibraryA",
            "LoadLibraryW",
            "LoadLibraryExA",
            "LoadLibraryExW",
        ],
        load_module,
    );
}

/// Import vertex for a module, linked to its File when the path resolves
pub fn import_vertex(
    ctx: &mut BuildContext,
    raw: &str,
    size: Option<u64>,
) -> PipelineResult<VertexId> {
    let resolved = resolve_module(raw, ctx.platform, &ctx.config.system_directory);
    let data = match &resolved {
        Some(path) => ImportData {
            path: path.display(),
            folded: path.folded(),
            size,
        },
        None => ImportData {
            path: raw.to_string(),
            folded: ctx.platform.fold(raw),
            size,
        },
    };
    let import = ctx.add(VertexData::Import(data))?;
    if let Some(path) = resolved {
        let file = touch_path(ctx, &path, VertexKind::File, Some(true))?;
        ctx.link(EdgeKind::ImportsFile, import, file)?;
    }
    Ok(import)
}

/// Link a process to the modules its image imports
pub fn attach_static(
    ctx: &mut BuildContext,
    process: VertexId,
    imports: &[ImportRecord],
) -> PipelineResult<()> {
    for record in imports {
        if record.path.trim().is_empty() {
            continue;
        }
        let import = import_vertex(ctx, &record.path, record.size)?;
        ctx.link(EdgeKind::Imports, process, import)?;
    }
    Ok(())
}

fn load_module(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let name = inv
        .record
        .arg_str(MODULE_NAME)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| inv.unusable("no module name"))?;
    let import = import_vertex(ctx, &name, None)?;
    ctx.link(EdgeKind::LoadsImport, inv.call, import)?;
    ctx.link(EdgeKind::Imports, inv.process, import)?;
    Ok(())
}
