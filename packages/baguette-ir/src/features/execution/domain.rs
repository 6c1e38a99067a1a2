//! Process handle bookkeeping and argument names

use ahash::AHashMap;

use crate::shared::models::VertexId;

pub(crate) const PROCESS_HANDLE: &[&str] = &["ProcessHandle", "process_handle", "hProcess"];
pub(crate) const PROCESS_ID: &[&str] = &["ProcessId", "process_identifier", "dwProcessId", "pid"];
pub(crate) const THREAD_ID: &[&str] = &["ThreadId", "thread_identifier", "lpThreadId", "tid"];
pub(crate) const IMAGE_PATH: &[&str] = &[
    "ImagePathName",
    "ProcessFileName",
    "filepath",
    "lpApplicationName",
    "ApplicationName",
];
pub(crate) const COMMAND_LINE: &[&str] = &["CommandLine", "command_line", "lpCommandLine"];
pub(crate) const CLOSED_HANDLE: &[&str] = &["Handle", "handle", "hObject"];

/// `GetCurrentProcess()` pseudo handle, as logged by 64 and 32 bit monitors
pub fn is_current_process(handle: u64) -> bool {
    handle == u64::MAX || handle == 0xffff_ffff
}

/// Open process handles, keyed by (owning process, handle value)
#[derive(Debug, Default)]
pub struct ProcessHandles {
    table: AHashMap<(VertexId, u64), VertexId>,
}

impl ProcessHandles {
    pub fn insert(&mut self, owner: VertexId, handle: u64, target: VertexId) {
        self.table.insert((owner, handle), target);
    }

    pub fn resolve(&self, owner: VertexId, handle: u64) -> Option<VertexId> {
        self.table.get(&(owner, handle)).copied()
    }

    pub fn close(&mut self, owner: VertexId, handle: u64) -> Option<VertexId> {
        self.table.remove(&(owner, handle))
    }
}
