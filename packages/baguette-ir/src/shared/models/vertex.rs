// Vertex Models
//
// Every vertex kind is a member of a closed set. Each variant struct splits its
// fields into "defining" fields (identity, see `VertexData::key`) and
// "additional" fields that may be updated after creation.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::edge::VertexId;
use super::value::RegValue;
use crate::features::trace_source::CallRecord;

/// Closed set of vertex kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexKind {
    Host,
    Process,
    Thread,
    Call,
    File,
    Directory,
    FileHandle,
    KeyHandle,
    Import,
    Key,
    KeyEntry,
    Data,
}

impl VertexKind {
    pub const ALL: [VertexKind; 12] = [
        VertexKind::Host,
        VertexKind::Process,
        VertexKind::Thread,
        VertexKind::Call,
        VertexKind::File,
        VertexKind::Directory,
        VertexKind::FileHandle,
        VertexKind::KeyHandle,
        VertexKind::Import,
        VertexKind::Key,
        VertexKind::KeyEntry,
        VertexKind::Data,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Host => "Host",
            Self::Process => "Process",
            Self::Thread => "Thread",
            Self::Call => "Call",
            Self::File => "File",
            Self::Directory => "Directory",
            Self::FileHandle => "FileHandle",
            Self::KeyHandle => "KeyHandle",
            Self::Import => "Import",
            Self::Key => "Key",
            Self::KeyEntry => "KeyEntry",
            Self::Data => "Data",
        }
    }

    /// Filesystem and registry handles are distinct kinds sharing one role
    #[inline]
    pub fn is_handle(&self) -> bool {
        matches!(self, Self::FileHandle | Self::KeyHandle)
    }

    #[inline]
    pub fn is_filesystem_node(&self) -> bool {
        matches!(self, Self::File | Self::Directory)
    }
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit pattern of a timestamp, usable inside hashed identity keys
#[inline]
pub fn time_bits(t: Option<f64>) -> Option<u64> {
    t.map(f64::to_bits)
}

// ============================================================
// Identity
// ============================================================

/// Identity of a vertex, built from its defining fields only
///
/// Two vertices with the same key are the same vertex: the store hands back
/// the existing one instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VertexKey {
    Host(String),
    Process { pid: u32, start: Option<u64> },
    Thread { process: VertexId, tid: u32, start: Option<u64> },
    Call(u64),
    File(String),
    Directory(String),
    FileHandle { process: VertexId, handle: u64, opened_at: u64 },
    KeyHandle { process: VertexId, handle: u64, opened_at: u64 },
    Import(String),
    Key(String),
    KeyEntry { key: String, name: String, version: u32 },
    Data(String),
}

// ============================================================
// Variant payloads
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostData {
    pub address: String,
    pub hostname: String,
    pub domain: String,
    /// Machine the trace was recorded on
    pub is_analysis_host: bool,
}

impl HostData {
    fn identity(&self) -> String {
        if self.address.is_empty() {
            self.hostname.to_lowercase()
        } else {
            self.address.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessData {
    pub pid: u32,
    pub start: Option<f64>,
    pub command_line: Vec<String>,
    pub executable: Option<String>,
    pub stop: Option<f64>,
}

impl ProcessData {
    /// Placeholder for a process only known through a reference in a call
    pub fn phantom(pid: u32) -> Self {
        Self {
            pid,
            start: None,
            command_line: Vec::new(),
            executable: None,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadData {
    /// Owning process (defining: tids are only unique per process)
    pub process: VertexId,
    pub tid: u32,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    /// Head of the `FollowedBy` chain, filled during graph building
    pub first: Option<VertexId>,
    pub last: Option<VertexId>,
    pub n_calls: usize,
}

impl ThreadData {
    pub fn new(process: VertexId, tid: u32, start: Option<f64>, stop: Option<f64>) -> Self {
        Self {
            process,
            tid,
            start,
            stop,
            first: None,
            last: None,
            n_calls: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallData {
    /// Position of the call in the trace as read (defining)
    pub seq: u64,
    pub record: Arc<CallRecord>,
    /// Owning thread, bound right after the thread's chain is built
    pub thread: Option<VertexId>,
}

impl CallData {
    #[inline]
    pub fn api(&self) -> &str {
        &self.record.api
    }

    #[inline]
    pub fn time(&self) -> f64 {
        self.record.time
    }
}

/// File or Directory payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    /// Normalized display path
    pub path: String,
    /// Identity form (case-folded on case-insensitive platforms)
    pub folded: String,
    /// Existence as observed in the trace (None when never checked)
    pub exists: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleData {
    pub process: VertexId,
    pub handle: u64,
    /// Sequence number of the call that opened the handle
    pub opened_at: u64,
    pub reads: bool,
    pub writes: bool,
    pub closed: bool,
}

impl HandleData {
    pub fn new(process: VertexId, handle: u64, opened_at: u64) -> Self {
        Self {
            process,
            handle,
            opened_at,
            reads: false,
            writes: false,
            closed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportData {
    pub path: String,
    pub folded: String,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyData {
    pub path: String,
    pub folded: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEntryData {
    /// Folded path of the owning key
    pub key: String,
    pub name: String,
    pub version: u32,
    pub value: RegValue,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBlob {
    /// Hex SHA-256 of the payload
    pub digest: String,
    pub length: usize,
    pub preview: String,
}

/// Vertex payload, one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VertexData {
    Host(HostData),
    Process(ProcessData),
    Thread(ThreadData),
    Call(CallData),
    File(PathData),
    Directory(PathData),
    FileHandle(HandleData),
    KeyHandle(HandleData),
    Import(ImportData),
    Key(KeyData),
    KeyEntry(KeyEntryData),
    Data(DataBlob),
}

impl VertexData {
    pub fn kind(&self) -> VertexKind {
        match self {
            Self::Host(_) => VertexKind::Host,
            Self::Process(_) => VertexKind::Process,
            Self::Thread(_) => VertexKind::Thread,
            Self::Call(_) => VertexKind::Call,
            Self::File(_) => VertexKind::File,
            Self::Directory(_) => VertexKind::Directory,
            Self::FileHandle(_) => VertexKind::FileHandle,
            Self::KeyHandle(_) => VertexKind::KeyHandle,
            Self::Import(_) => VertexKind::Import,
            Self::Key(_) => VertexKind::Key,
            Self::KeyEntry(_) => VertexKind::KeyEntry,
            Self::Data(_) => VertexKind::Data,
        }
    }

    /// Identity key from the defining fields
    pub fn key(&self) -> VertexKey {
        match self {
            Self::Host(h) => VertexKey::Host(h.identity()),
            Self::Process(p) => VertexKey::Process {
                pid: p.pid,
                start: time_bits(p.start),
            },
            Self::Thread(t) => VertexKey::Thread {
                process: t.process,
                tid: t.tid,
                start: time_bits(t.start),
            },
            Self::Call(c) => VertexKey::Call(c.seq),
            Self::File(p) => VertexKey::File(p.folded.clone()),
            Self::Directory(p) => VertexKey::Directory(p.folded.clone()),
            Self::FileHandle(h) => VertexKey::FileHandle {
                process: h.process,
                handle: h.handle,
                opened_at: h.opened_at,
            },
            Self::KeyHandle(h) => VertexKey::KeyHandle {
                process: h.process,
                handle: h.handle,
                opened_at: h.opened_at,
            },
            Self::Import(i) => VertexKey::Import(i.folded.clone()),
            Self::Key(k) => VertexKey::Key(k.folded.clone()),
            Self::KeyEntry(e) => VertexKey::KeyEntry {
                key: e.key.clone(),
                name: e.name.to_lowercase(),
                version: e.version,
            },
            Self::Data(d) => VertexKey::Data(d.digest.clone()),
        }
    }

    /// Short human-readable label
    pub fn label(&self) -> String {
        match self {
            Self::Host(h) if h.hostname.is_empty() => h.address.clone(),
            Self::Host(h) => h.hostname.clone(),
            Self::Process(p) => match &p.executable {
                Some(exe) => format!("{} ({})", exe, p.pid),
                None => format!("<pid {}>", p.pid),
            },
            Self::Thread(t) => format!("tid {}", t.tid),
            Self::Call(c) => c.api().to_string(),
            Self::File(p) | Self::Directory(p) => p.path.clone(),
            Self::FileHandle(h) | Self::KeyHandle(h) => format!("{:#x}", h.handle),
            Self::Import(i) => i.path.clone(),
            Self::Key(k) => k.path.clone(),
            Self::KeyEntry(e) => format!("{} v{}", e.name, e.version),
            Self::Data(d) => format!("{} bytes", d.length),
        }
    }

    pub fn as_process(&self) -> Option<&ProcessData> {
        match self {
            Self::Process(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&ThreadData> {
        match self {
            Self::Thread(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_thread_mut(&mut self) -> Option<&mut ThreadData> {
        match self {
            Self::Thread(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&CallData> {
        match self {
            Self::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_call_mut(&mut self) -> Option<&mut CallData> {
        match self {
            Self::Call(c) => Some(c),
            _ => None,
        }
    }

    /// File or Directory payload
    pub fn as_path(&self) -> Option<&PathData> {
        match self {
            Self::File(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_path_mut(&mut self) -> Option<&mut PathData> {
        match self {
            Self::File(p) | Self::Directory(p) => Some(p),
            _ => None,
        }
    }

    /// FileHandle or KeyHandle payload
    pub fn as_handle(&self) -> Option<&HandleData> {
        match self {
            Self::FileHandle(h) | Self::KeyHandle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_handle_mut(&mut self) -> Option<&mut HandleData> {
        match self {
            Self::FileHandle(h) | Self::KeyHandle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostData> {
        match self {
            Self::Host(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_import(&self) -> Option<&ImportData> {
        match self {
            Self::Import(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&KeyData> {
        match self {
            Self::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&KeyEntryData> {
        match self {
            Self::KeyEntry(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut KeyEntryData> {
        match self {
            Self::KeyEntry(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataBlob> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }
}

/// A vertex stored in the universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub data: VertexData,
    /// Free-form metadata, never identity-affecting
    pub attrs: AHashMap<String, serde_json::Value>,
}

impl Vertex {
    pub fn new(data: VertexData) -> Self {
        Self {
            data,
            attrs: AHashMap::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> VertexKind {
        self.data.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_identity_falls_back_to_hostname() {
        let by_address = VertexData::Host(HostData {
            address: "10.0.0.1".into(),
            hostname: "box".into(),
            domain: String::new(),
            is_analysis_host: true,
        });
        let by_name = VertexData::Host(HostData {
            address: String::new(),
            hostname: "Example.COM".into(),
            domain: String::new(),
            is_analysis_host: false,
        });

        assert_eq!(by_address.key(), VertexKey::Host("10.0.0.1".into()));
        assert_eq!(by_name.key(), VertexKey::Host("example.com".into()));
    }

    #[test]
    fn test_additional_fields_do_not_change_identity() {
        let mut a = ThreadData::new(VertexId::new(1), 7, Some(1.5), None);
        let b = ThreadData::new(VertexId::new(1), 7, Some(1.5), Some(9.0));
        a.n_calls = 12;

        assert_eq!(
            VertexData::Thread(a).key(),
            VertexData::Thread(b).key()
        );
    }

    #[test]
    fn test_same_tid_in_two_processes_is_two_threads() {
        let a = ThreadData::new(VertexId::new(1), 5, None, None);
        let b = ThreadData::new(VertexId::new(2), 5, None, None);
        assert_ne!(VertexData::Thread(a).key(), VertexData::Thread(b).key());
    }

    #[test]
    fn test_entry_name_is_case_insensitive() {
        let entry = |name: &str| {
            VertexData::KeyEntry(KeyEntryData {
                key: "hkey_local_machine\\software".into(),
                name: name.into(),
                version: 0,
                value: RegValue::None,
                deleted: false,
            })
        };
        assert_eq!(entry("Run").key(), entry("RUN").key());
    }
}
