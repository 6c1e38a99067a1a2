//! Filesystem call handlers

use ahash::AHashMap;
use sha2::{Digest, Sha256};

use super::super::domain::FsPath;
use crate::pipeline::{BuildContext, DispatchTable, Invocation, MatchKey, PipelineResult};
use crate::shared::models::{
    DataBlob, EdgeKind, HandleData, VertexData, VertexId, VertexKey, VertexKind,
};
use crate::shared::utils::CallArgs;

const FILE_NAME: &[&str] = &["FileName", "filepath", "ObjectAttributes", "lpFileName", "file_path"];
const FILE_HANDLE: &[&str] = &["FileHandle", "file_handle", "hFile"];
const CLOSED_HANDLE: &[&str] = &["Handle", "handle", "hObject"];
const CREATE_OPTIONS: &[&str] = &["CreateOptions", "create_options"];
const BUFFER: &[&str] = &["Buffer", "buffer", "lpBuffer"];
const MOVE_SOURCE: &[&str] = &["ExistingFileName", "oldfilepath", "lpExistingFileName"];
const MOVE_TARGET: &[&str] = &["NewFileName", "newfilepath", "lpNewFileName"];
const DIRECTORY_NAME: &[&str] = &["DirectoryName", "dirpath", "lpPathName", "PathName"];

/// `FILE_DIRECTORY_FILE` create option
const FILE_DIRECTORY_FILE: u64 = 0x1;

/// Open file handles, keyed by (owning process, handle value)
#[derive(Debug, Default)]
pub struct FileHandles {
    table: AHashMap<(VertexId, u64), VertexId>,
}

impl FileHandles {
    pub fn insert(&mut self, owner: VertexId, handle: u64, vertex: VertexId) {
        self.table.insert((owner, handle), vertex);
    }

    pub fn resolve(&self, owner: VertexId, handle: u64) -> Option<VertexId> {
        self.table.get(&(owner, handle)).copied()
    }

    pub fn close(&mut self, owner: VertexId, handle: u64) -> Option<VertexId> {
        self.table.remove(&(owner, handle))
    }
}

pub(crate) fn register(dispatch: &DispatchTable) {
    dispatch.register(["NtCreateFile", "CreateFileA", "CreateFileW"], |ctx, inv| {
        open_file(ctx, inv, EdgeKind::CreatesFile)
    });
    dispatch.register(["NtOpenFile"], |ctx, inv| {
        open_file(ctx, inv, EdgeKind::OpensFile)
    });
    dispatch.register(["NtReadFile", "ReadFile"], read_file);
    dispatch.register(["NtWriteFile", "WriteFile"], write_file);
    dispatch.register(["NtClose", "CloseHandle"], close_file);
    dispatch.register(["NtDeleteFile", "DeleteFileA", "DeleteFileW"], delete_file);
    dispatch.register(
        [
            "NtQueryAttributesFile",
            "NtQueryFullAttributesFile",
            "GetFileAttributesA",
            "GetFileAttributesW",
            "GetFileAttributesExA",
            "GetFileAttributesExW",
        ],
        query_file,
    );
    dispatch.register([MatchKey::contains("MoveFile")], move_file);
    dispatch.register(
        ["CreateDirectoryA", "CreateDirectoryW", "CreateDirectoryExA", "CreateDirectoryExW"],
        create_directory,
    );
    dispatch.register(
        ["FindFirstFileA", "FindFirstFileW", "FindFirstFileExA", "FindFirstFileExW"],
        list_directory,
    );
}

// ============================================================
// Shared helpers
// ============================================================

fn path_arg(ctx: &BuildContext, inv: &Invocation, names: &[&str]) -> PipelineResult<FsPath> {
    let raw = inv
        .record
        .arg_str(names)
        .ok_or_else(|| inv.unusable("no path argument"))?;
    FsPath::parse(&raw, ctx.platform)
        .ok_or_else(|| inv.unusable(format!("path {:?} does not normalize", raw)))
}

/// File or Directory vertex for `path`, updating its existence flag
///
/// A File request is served by an existing Directory of the same path.
pub fn touch_path(
    ctx: &mut BuildContext,
    path: &FsPath,
    kind: VertexKind,
    exists: Option<bool>,
) -> PipelineResult<VertexId> {
    let as_directory = kind == VertexKind::Directory
        || ctx
            .store
            .find(&VertexKey::Directory(path.folded()))
            .is_some();
    let data = path.to_path_data(exists);
    let vertex = if as_directory {
        ctx.add(VertexData::Directory(data))?
    } else {
        ctx.add(VertexData::File(data))?
    };
    if let Some(exists) = exists {
        if let Some(data) = ctx.store.data_mut(vertex)?.as_path_mut() {
            data.exists = Some(exists);
        }
    }
    Ok(vertex)
}

/// Declare a file as existing, e.g. the sample itself
///
/// `Ok(None)` when the path does not normalize.
pub fn declare_existing(ctx: &mut BuildContext, raw: &str) -> PipelineResult<Option<VertexId>> {
    match FsPath::parse(raw, ctx.platform) {
        Some(path) => touch_path(ctx, &path, VertexKind::File, Some(true)).map(Some),
        None => Ok(None),
    }
}

fn known_handle(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<VertexId> {
    let handle = inv
        .record
        .arg_int(FILE_HANDLE)
        .ok_or_else(|| inv.unusable("no file handle"))?;
    ctx.extensions
        .get_or_default::<FileHandles>()
        .resolve(inv.process, handle)
        .ok_or_else(|| inv.unusable(format!("unknown file handle {:#x}", handle)))
}

fn data_blob(bytes: &[u8], preview_len: usize) -> DataBlob {
    let digest = Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    DataBlob {
        digest,
        length: bytes.len(),
        preview: String::from_utf8_lossy(bytes).chars().take(preview_len).collect(),
    }
}

// ============================================================
// Handle lifecycle
// ============================================================

fn open_file(ctx: &mut BuildContext, inv: &Invocation, relation: EdgeKind) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let path = path_arg(ctx, inv, FILE_NAME)?;
    let handle = inv
        .record
        .arg_int(FILE_HANDLE)
        .or_else(|| inv.returned_handle())
        .ok_or_else(|| inv.unusable("no file handle"))?;
    let is_directory = inv
        .record
        .arg_int(CREATE_OPTIONS)
        .map(|options| options & FILE_DIRECTORY_FILE != 0)
        .unwrap_or(false);
    let kind = if is_directory {
        VertexKind::Directory
    } else {
        VertexKind::File
    };

    let node = touch_path(ctx, &path, kind, Some(true))?;
    let handle_vertex = ctx.add(VertexData::FileHandle(HandleData::new(
        inv.process,
        handle,
        inv.seq,
    )))?;
    ctx.link(relation, inv.call, handle_vertex)?;
    ctx.link(EdgeKind::OwnsHandle, inv.process, handle_vertex)?;
    ctx.link(EdgeKind::Designates, handle_vertex, node)?;

    ctx.extensions
        .get_or_default::<FileHandles>()
        .insert(inv.process, handle, handle_vertex);
    Ok(())
}

fn read_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let handle = known_handle(ctx, inv)?;
    if let Some(data) = ctx.store.data_mut(handle)?.as_handle_mut() {
        data.reads = true;
    }
    ctx.link(EdgeKind::Reads, inv.call, handle)?;
    Ok(())
}

fn write_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let handle = known_handle(ctx, inv)?;
    if let Some(data) = ctx.store.data_mut(handle)?.as_handle_mut() {
        data.writes = true;
    }
    ctx.link(EdgeKind::Writes, inv.call, handle)?;

    if let Some(buffer) = inv.record.arg_str(BUFFER) {
        let blob = data_blob(buffer.as_bytes(), ctx.config.data_preview_len);
        let data = ctx.add(VertexData::Data(blob))?;
        ctx.link(EdgeKind::HasData, inv.call, data)?;
    }
    Ok(())
}

/// Closing a handle this package never saw is not an error: it may be a
/// registry or process handle
fn close_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let Some(handle) = inv.record.arg_int(CLOSED_HANDLE) else {
        return Ok(());
    };
    let Some(vertex) = ctx
        .extensions
        .get_or_default::<FileHandles>()
        .close(inv.process, handle)
    else {
        return Ok(());
    };
    if let Some(data) = ctx.store.data_mut(vertex)?.as_handle_mut() {
        data.closed = true;
    }
    ctx.link(EdgeKind::Closes, inv.call, vertex)?;
    Ok(())
}

// ============================================================
// Path operations
// ============================================================

fn delete_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let path = path_arg(ctx, inv, FILE_NAME)?;
    let file = touch_path(ctx, &path, VertexKind::File, Some(false))?;
    ctx.link(EdgeKind::DeletesFile, inv.call, file)?;
    Ok(())
}

/// A failed attribute query tells us the file is missing
fn query_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    let path = path_arg(ctx, inv, FILE_NAME)?;
    let file = touch_path(ctx, &path, VertexKind::File, Some(inv.succeeded()))?;
    ctx.link(EdgeKind::QueriesFile, inv.call, file)?;
    Ok(())
}

fn move_file(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let from = path_arg(ctx, inv, MOVE_SOURCE)?;
    let to = path_arg(ctx, inv, MOVE_TARGET)?;
    let source = touch_path(ctx, &from, VertexKind::File, Some(false))?;
    let target = touch_path(ctx, &to, VertexKind::File, Some(true))?;
    ctx.link(EdgeKind::MovesFrom, inv.call, source)?;
    ctx.link(EdgeKind::MovesTo, inv.call, target)?;
    Ok(())
}

fn create_directory(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let path = path_arg(ctx, inv, DIRECTORY_NAME)?;
    let directory = touch_path(ctx, &path, VertexKind::Directory, Some(true))?;
    ctx.link(EdgeKind::CreatesDirectory, inv.call, directory)?;
    Ok(())
}

/// `C:\dir\*.dll` lists `C:\dir`
fn list_directory(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let pattern = path_arg(ctx, inv, FILE_NAME)?;
    let path = match pattern.has_wildcard() {
        true => pattern
            .parent()
            .ok_or_else(|| inv.unusable("search pattern without a directory"))?,
        false => pattern,
    };
    let directory = touch_path(ctx, &path, VertexKind::Directory, Some(true))?;
    ctx.link(EdgeKind::ListsDirectory, inv.call, directory)?;
    Ok(())
}
