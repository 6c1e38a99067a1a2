//! Process and thread call handlers

use serde_json::json;
use tracing::debug;

use super::super::domain::*;
use crate::pipeline::{BuildContext, DispatchTable, Invocation, PipelineResult};
use crate::shared::models::{EdgeKind, ProcessData, ThreadData, VertexData, VertexId, VertexKind};
use crate::shared::utils::{split_command_line, CallArgs};

pub(crate) fn register(dispatch: &DispatchTable) {
    dispatch.register(["NtOpenProcess", "OpenProcess"], open_process);
    dispatch.register(
        [
            "NtCreateUserProcess",
            "NtCreateProcess",
            "NtCreateProcessEx",
            "CreateProcessInternalW",
            "CreateProcessW",
            "CreateProcessA",
        ],
        create_process,
    );
    dispatch.register(
        [
            "NtCreateThreadEx",
            "NtCreateThread",
            "RtlCreateUserThread",
            "CreateRemoteThread",
            "CreateRemoteThreadEx",
            "CreateThread",
        ],
        create_thread,
    );
    dispatch.register(["NtClose", "CloseHandle"], close_handle);
}

fn processes_with_pid(ctx: &BuildContext, pid: u32) -> Vec<(VertexId, Option<f64>)> {
    ctx.members(VertexKind::Process)
        .into_iter()
        .filter_map(|p| {
            let data = ctx.store.data(p).ok()?.as_process()?;
            (data.pid == pid).then_some((p, data.start))
        })
        .collect()
}

/// The process with `pid` running at `time`: latest start not after it
///
/// `None` when every traced process with that pid started later.
fn running_process(ctx: &BuildContext, pid: u32, time: f64) -> Option<VertexId> {
    processes_with_pid(ctx, pid)
        .into_iter()
        .filter(|(_, start)| start.map(|s| s <= time).unwrap_or(true))
        .max_by(|a, b| {
            let a = a.1.unwrap_or(f64::NEG_INFINITY);
            let b = b.1.unwrap_or(f64::NEG_INFINITY);
            a.total_cmp(&b)
        })
        .map(|(p, _)| p)
}

/// The process with `pid` spawned at `time`: earliest start not before it
fn spawned_process(ctx: &BuildContext, pid: u32, time: f64) -> Option<VertexId> {
    let candidates = processes_with_pid(ctx, pid);
    candidates
        .iter()
        .filter(|(_, start)| start.map(|s| s >= time).unwrap_or(false))
        .min_by(|a, b| {
            let a = a.1.unwrap_or(f64::INFINITY);
            let b = b.1.unwrap_or(f64::INFINITY);
            a.total_cmp(&b)
        })
        .or_else(|| candidates.last())
        .map(|(p, _)| *p)
}

fn open_process(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let pid = inv
        .record
        .arg_int(PROCESS_ID)
        .ok_or_else(|| inv.unusable("no target process id"))? as u32;

    let target = match running_process(ctx, pid, inv.record.time) {
        Some(process) => process,
        None => {
            debug!(pid, "Opening an untraced process, adding a placeholder");
            ctx.add(VertexData::Process(ProcessData::phantom(pid)))?
        }
    };
    ctx.link(EdgeKind::OpensProcess, inv.call, target)?;

    if let Some(handle) = inv.record.arg_int(PROCESS_HANDLE).or_else(|| inv.returned_handle()) {
        ctx.extensions
            .get_or_default::<ProcessHandles>()
            .insert(inv.process, handle, target);
    }
    Ok(())
}

fn create_process(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let pid = inv
        .record
        .arg_int(PROCESS_ID)
        .ok_or_else(|| inv.unusable("no child process id"))? as u32;

    let child = match spawned_process(ctx, pid, inv.record.time) {
        Some(child) => child,
        None => ctx.add(VertexData::Process(ProcessData {
            pid,
            start: Some(inv.record.time),
            command_line: inv
                .record
                .arg_str(COMMAND_LINE)
                .map(|line| split_command_line(&line))
                .unwrap_or_default(),
            executable: inv.record.arg_str(IMAGE_PATH),
            stop: None,
        }))?,
    };

    if child != inv.process
        && ctx
            .store
            .in_neighbors(child, EdgeKind::HasChildProcess)
            .is_empty()
    {
        ctx.link(EdgeKind::HasChildProcess, inv.process, child)?;
    }
    ctx.link(EdgeKind::CreatesProcess, inv.call, child)?;

    if let Some(handle) = inv.record.arg_int(PROCESS_HANDLE) {
        ctx.extensions
            .get_or_default::<ProcessHandles>()
            .insert(inv.process, handle, child);
    }
    Ok(())
}

fn create_thread(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    let target = match inv.record.arg_int(PROCESS_HANDLE) {
        None => inv.process,
        Some(handle) if is_current_process(handle) => inv.process,
        Some(handle) => ctx
            .extensions
            .get_or_default::<ProcessHandles>()
            .resolve(inv.process, handle)
            .ok_or_else(|| inv.unusable(format!("unknown process handle {:#x}", handle)))?,
    };
    let tid = inv
        .record
        .arg_int(THREAD_ID)
        .ok_or_else(|| inv.unusable("no thread id"))? as u32;

    let existing = ctx
        .store
        .out_neighbors(target, EdgeKind::HasThread)
        .into_iter()
        .find(|t| {
            ctx.store
                .data(*t)
                .ok()
                .and_then(VertexData::as_thread)
                .map(|data| data.tid == tid)
                .unwrap_or(false)
        });
    let thread = match existing {
        Some(thread) => thread,
        None => {
            let thread = ctx.add(VertexData::Thread(ThreadData::new(
                target,
                tid,
                Some(inv.record.time),
                None,
            )))?;
            ctx.link(EdgeKind::HasThread, target, thread)?;
            ctx.set_owner(thread, target);
            thread
        }
    };

    let remote = target != inv.process;
    ctx.link_with(
        EdgeKind::CreatesThread,
        inv.call,
        thread,
        [("remote", json!(remote))],
    )?;
    Ok(())
}

fn close_handle(ctx: &mut BuildContext, inv: &Invocation) -> PipelineResult<()> {
    if !inv.succeeded() {
        return Ok(());
    }
    if let Some(handle) = inv.record.arg_int(CLOSED_HANDLE) {
        ctx.extensions
            .get_or_default::<ProcessHandles>()
            .close(inv.process, handle);
    }
    Ok(())
}
