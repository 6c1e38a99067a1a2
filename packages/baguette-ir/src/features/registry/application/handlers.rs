//! Registry call handlers

use super::super::domain::{predefined_root, EntryVersions, KeyHandles, KeyPath};
use crate::pipeline::{BuildContext, DispatchTable, Invocation, PipelineError, PipelineResult};
use crate::shared::models::{
    value::reg_type, EdgeKind, HandleData, KeyData, KeyEntryData, RegValue, VertexData, VertexId,
};
use crate::shared::utils::{args::value_as_string, CallArgs};

/// Handle created by an open/create call
const OPENED_HANDLE: &[&str] = &["KeyHandle", "key_handle", "phkResult", "hkResult"];
/// Handle a relative key name is resolved against
const BASE_HANDLE: &[&str] = &["RootDirectory", "root_directory", "hKey", "base_handle"];
/// Handle a value or enumeration call operates on
const USED_HANDLE: &[&str] = &["KeyHandle", "key_handle", "hKey", "Handle"];
const CLOSED_HANDLE: &[&str] = &["Handle", "handle", "hObject", "hKey", "KeyHandle"];
const KEY_NAME: &[&str] = &["ObjectAttributes", "ObjectName", "KeyName", "lpSubKey", "SubKey", "sub_key"];
const SUB_KEY: &[&str] = &["lpSubKey", "SubKey", "sub_key"];
/// Full key (or value) path, when the monitor resolved it
const FULL_PATH: &[&str] = &["regkey", "key_path", "FullName"];
const VALUE_NAME: &[&str] = &["ValueName", "value_name", "lpValueName"];
const VALUE_TYPE: &[&str] = &["Type", "reg_type", "dwType", "lpType"];
const VALUE_DATA: &[&str] = &["Buffer", "buffer", "Data", "lpData", "value"];

pub(crate) fn register(dispatch: &DispatchTable) {
    dispatch.register(
        [
            "NtOpenKey",
            "NtOpenKeyEx",
            "RegOpenKeyA",
            "RegOpenKeyW",
            "RegOpenKeyExA",
            "RegOpenKeyExW",
        ],
        |ctx, inv| open_key(ctx, inv, EdgeKind::OpensKey),
    );
    dispatch.register(
        [
            "NtCreateKey",
            "RegCreateKeyA",
            "RegCreateKeyW",
            "RegCreateKeyExA",
            "RegCreateKeyExW",
        ],
        |ctx, inv| open_key(ctx, inv, EdgeKind::CreatesKey),
    );
    dispatch.register(["NtClose", "RegCloseKey"], close_key);
    dispatch.register(
        ["NtSetValueKey", "RegSetValueExA", "RegSetValueExW", "RegSetValueA", "RegSetValueW"],
        set_entry,
    );
    dispatch.register(
        [
            "NtQueryValueKey",
            "RegQueryValueExA",
            "RegQueryValueExW",
            "RegQueryValueA",
            "RegQueryValueW",
            "RegGetValueA",
            "RegGetValueW",
        ],
        query_entry,
    );
    dispatch.register(
        ["NtDeleteValueKey", "RegDeleteValueA", "RegDeleteValueW"],
        delete_entry,
    );
    dispatch.register(
        ["NtDeleteKey", "RegDeleteKeyA", "RegDeleteKeyW", "RegDeleteKeyExA", "RegDeleteKeyExW"],
        delete_key,
    );
    dispatch.register(
        [
            "NtEnumerateKey",
            "NtEnumerateValueKey",
            "RegEnumKeyA",
            "RegEnumKeyW",
            "RegEnumKeyExA",
            "RegEnumKeyExW",
            "RegEnumValueA",
            "RegEnumValueW",
        ],
        enumerate_key,
    );
}

// ============================================================
// Keys
// ============================================================

/// Key vertex for `path`, creating the hive and sub key chain above it
pub fn ensure_key(ctx: &mut BuildContext, path: &KeyPath) -> PipelineResult<VertexId> {
    let host = ctx.host()?;
    let hive = key_vertex(ctx, &path.prefix(0))?;
    ctx.link(EdgeKind::HasHive, host, hive)?;

    let mut parent = hive;
    for depth in 1..=path.parts().len() {
        let key = key_vertex(ctx, &path.prefix(depth))?;
        ctx.link(EdgeKind::HasSubKey, parent, key)?;
        parent = key;
    }
    Ok(parent)
}

fn key_vertex(ctx: &mut BuildContext, path: &KeyPath) -> PipelineResult<VertexId> {
    ctx.add(VertexData::Key(KeyData {
        path: path.display(),
        folded: path.folded(),
    }))
}

/// Key path behind a handle held by the calling process
fn resolve_handle(ctx: &mut BuildContext, inv: &Invocation, handle: u64) -> PipelineResult<KeyPath> {
    if let Some(hive) = predefined_root(handle) {
        return Ok(KeyPath::hive(hive));
    }
    ctx.extensions
        .get_or_default::<KeyHandles>()
        .resolve(inv.process, handle)
        .map(|(_, path)| path.clone())
        .ok_or_else(|| inv.unusable(format!("unknown key handle {:#x}", handle)))
}

fn parse_full(inv: &Invocation, raw: &str) -> PipelineResult<KeyPath> {
    KeyPath::parse(raw).ok_or_else(|| inv.unusable(format!("key path {:?} has no known hive", raw)))
}

/// Key named by an open/create call: a resolved full path, or a name relative
/// to a base handle, or an absolute name
fn opened_path(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<KeyPath> {
    if let Some(full) = inv.record.arg_str(FULL_PATH) {
        return parse_full(inv, &full);
    }
    let name = inv.record.arg_str(KEY_NAME).unwrap_or_default();
    match inv.record.arg_int(BASE_HANDLE).filter(|h| *h != 0) {
        Some(base) => Ok(resolve_handle(ctx, inv, base)?.join(&name)),
        None => parse_full(inv, &name),
    }
}

/// Key an operation targets through a handle, optionally with a sub key
fn used_key(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<KeyPath> {
    let handle = inv
        .record
        .arg_int(USED_HANDLE)
        .ok_or_else(|| inv.unusable("no key handle"))?;
    let key = resolve_handle(ctx, inv, handle)?;
    Ok(match inv.record.arg_str(SUB_KEY) {
        Some(sub) => key.join(&sub),
        None => key,
    })
}

fn open_key(ctx: &mut BuildContext, inv: &Invocation, relation: EdgeKind) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let path = opened_path(ctx, inv)?;
    let handle = inv
        .record
        .arg_int(OPENED_HANDLE)
        .ok_or_else(|| inv.unusable("no key handle"))?;

    let key = ensure_key(ctx, &path)?;
    let handle_vertex = ctx.add(VertexData::KeyHandle(HandleData::new(
        inv.process,
        handle,
        inv.seq,
    )))?;
    ctx.link(relation, inv.call, handle_vertex)?;
    ctx.link(EdgeKind::OwnsHandle, inv.process, handle_vertex)?;
    ctx.link(EdgeKind::Designates, handle_vertex, key)?;

    ctx.extensions
        .get_or_default::<KeyHandles>()
        .insert(inv.process, handle, handle_vertex, path);
    Ok(())
}

fn close_key(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let Some(handle) = inv.record.arg_int(CLOSED_HANDLE) else {
        return Ok(());
    };
    let Some((vertex, _)) = ctx
        .extensions
        .get_or_default::<KeyHandles>()
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

/// Record a use of the handle the call went through, when it is one we track
fn link_used_handle(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    let Some(handle) = inv.record.arg_int(USED_HANDLE) else {
        return Ok(());
    };
    let vertex = ctx
        .extensions
        .get_or_default::<KeyHandles>()
        .resolve(inv.process, handle)
        .map(|(vertex, _)| *vertex);
    if let Some(vertex) = vertex {
        ctx.link(EdgeKind::UsesHandle, inv.call, vertex)?;
    }
    Ok(())
}

fn delete_key(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let path = match inv.record.arg_str(FULL_PATH) {
        Some(full) => parse_full(inv, &full)?,
        None => used_key(ctx, inv)?,
    };
    let key = ensure_key(ctx, &path)?;
    ctx.store
        .vertex_mut(key)?
        .attrs
        .insert("deleted".to_string(), serde_json::Value::Bool(true));
    ctx.link(EdgeKind::DeletesKey, inv.call, key)?;
    link_used_handle(ctx, inv)
}

/// Enumeration ends on a failing call (no more entries), so status is ignored
fn enumerate_key(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    let path = used_key(ctx, inv)?;
    let key = ensure_key(ctx, &path)?;
    ctx.link(EdgeKind::EnumeratesKey, inv.call, key)?;
    link_used_handle(ctx, inv)
}

// ============================================================
// Entries
// ============================================================

/// Key and value name an entry operation targets
fn entry_target(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<(KeyPath, String)> {
    if inv.record.arg(USED_HANDLE).is_some() {
        let key = used_key(ctx, inv)?;
        let name = inv.record.arg_str(VALUE_NAME).unwrap_or_default();
        return Ok((key, name));
    }
    let full = inv
        .record
        .arg_str(FULL_PATH)
        .ok_or_else(|| inv.unusable("no key handle or value path"))?;
    parse_full(inv, &full)?
        .split_last()
        .ok_or_else(|| inv.unusable("value path names a hive"))
}

fn logged_value(inv: &Invocation) -> Option<RegValue> {
    let data = inv.record.arg(VALUE_DATA)?;
    let type_code = inv
        .record
        .arg(VALUE_TYPE)
        .and_then(value_as_string)
        .and_then(|raw| reg_type::parse(&raw));
    Some(RegValue::decode(type_code, Some(data)))
}

fn new_version(
    ctx: &mut BuildContext,
    key: VertexId,
    path: &KeyPath,
    name: &str,
    version: u32,
    value: RegValue,
) -> PipelineResult<VertexId> {
    let entry = ctx.add(VertexData::KeyEntry(KeyEntryData {
        key: path.folded(),
        name: name.to_string(),
        version,
        value,
        deleted: false,
    }))?;
    ctx.link(EdgeKind::HasEntry, key, entry)?;
    ctx.extensions
        .get_or_default::<EntryVersions>()
        .advance(&path.folded(), name, entry);
    Ok(entry)
}

/// Entry version an observation of `value` refers to
///
/// An unchanged (or unknown) value refers to the latest live version. A
/// different value, or any value after a deletion, starts the next version.
pub(crate) fn observe_entry(
    ctx: &mut BuildContext,
    path: &KeyPath,
    name: &str,
    value: Option<RegValue>,
) -> PipelineResult<VertexId> {
    let key = ensure_key(ctx, path)?;
    let latest = ctx
        .extensions
        .get_or_default::<EntryVersions>()
        .latest(&path.folded(), name);

    let Some(latest) = latest else {
        return new_version(ctx, key, path, name, 0, value.unwrap_or(RegValue::None));
    };
    let (version, unchanged) = {
        let entry = ctx
            .store
            .data(latest)?
            .as_entry()
            .ok_or_else(|| PipelineError::internal("entry table holds a non-entry"))?;
        let unchanged = !entry.deleted && value.as_ref().map_or(true, |v| *v == entry.value);
        (entry.version, unchanged)
    };
    if unchanged {
        return Ok(latest);
    }
    let next = new_version(
        ctx,
        key,
        path,
        name,
        version + 1,
        value.unwrap_or(RegValue::None),
    )?;
    ctx.link(EdgeKind::ChangesTowards, latest, next)?;
    Ok(next)
}

fn set_entry(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let (path, name) = entry_target(ctx, inv)?;
    let value = logged_value(inv).unwrap_or(RegValue::None);
    let entry = observe_entry(ctx, &path, &name, Some(value))?;
    ctx.link(EdgeKind::SetsEntry, inv.call, entry)?;
    link_used_handle(ctx, inv)
}

fn query_entry(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let (path, name) = entry_target(ctx, inv)?;
    let entry = observe_entry(ctx, &path, &name, logged_value(inv))?;
    ctx.link(EdgeKind::QueriesEntry, inv.call, entry)?;
    link_used_handle(ctx, inv)
}

fn delete_entry(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let (path, name) = entry_target(ctx, inv)?;
    let latest = ctx
        .extensions
        .get_or_default::<EntryVersions>()
        .latest(&path.folded(), &name);
    let already_deleted = match latest {
        Some(latest) => ctx.store.data(latest)?.as_entry().map_or(false, |e| e.deleted),
        None => false,
    };
    // Deleting twice supersedes nothing
    let entry = match latest {
        Some(latest) if already_deleted => latest,
        _ => observe_entry(ctx, &path, &name, None)?,
    };
    if let Some(data) = ctx.store.data_mut(entry)?.as_entry_mut() {
        data.deleted = true;
    }
    ctx.link(EdgeKind::DeletesEntry, inv.call, entry)?;
    link_used_handle(ctx, inv)
}
