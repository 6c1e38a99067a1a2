//! Trace source contract
//!
//! A source exposes the analysis host, the platform string, peer machines,
//! the process tree as (parent, process) pairs, and the sample file path.
//! Each process carries its threads, each thread its calls in recorded order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed trace report: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Cannot determine a report parser for {0}")]
    UnknownFormat(String),

    #[error("Sample file path unavailable: {0}")]
    NoSample(String),
}

/// Host or peer machine descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One recorded system/API invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub api: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, Value>,
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
    #[serde(default = "default_status")]
    pub status: bool,
    #[serde(default)]
    pub return_value: Value,
    pub time: f64,
    /// (process index, call index), diagnostics only
    #[serde(default)]
    pub location: (usize, usize),
}

fn default_status() -> bool {
    true
}

impl Default for CallRecord {
    fn default() -> Self {
        Self {
            api: String::new(),
            arguments: BTreeMap::new(),
            flags: BTreeMap::new(),
            status: true,
            return_value: Value::Null,
            time: 0.0,
            location: (0, 0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub tid: u32,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
    #[serde(default)]
    pub calls: Vec<Arc<CallRecord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    /// Parent PID as reported; the tree itself comes from `process_tree`
    #[serde(default)]
    pub ppid: Option<u32>,
    #[serde(default)]
    pub command_line: Vec<String>,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub stop: Option<f64>,
    #[serde(default)]
    pub imports: Vec<ImportRecord>,
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

impl ProcessRecord {
    pub fn call_count(&self) -> usize {
        self.threads.iter().map(|t| t.calls.len()).sum()
    }
}

/// Abstract recorded execution trace
pub trait TraceSource {
    fn host(&self) -> &MachineRecord;

    fn platform(&self) -> &str;

    fn machines(&self) -> &[MachineRecord];

    /// (parent, process) pairs covering the whole tree
    fn process_tree(&self) -> Vec<(Option<&ProcessRecord>, &ProcessRecord)>;

    /// Path of the file under analysis; failure is tolerated by the builder
    fn sample_file_path(&self) -> Result<String, SourceError>;
}
