//! JSON trace report
//!
//! Neutral, already-decoded trace format:
//!
//! ```json
//! {
//!   "host": {"address": "192.168.56.101", "hostname": "box", "domain": ""},
//!   "platform": "windows",
//!   "machines": [{"address": "10.0.0.5"}],
//!   "sample": "C:\\Users\\x\\sample.exe",
//!   "processes": [
//!     {"pid": 10, "ppid": 4, "command_line": ["sample.exe"], "executable": "C:\\Users\\x\\sample.exe",
//!      "start": 1.0, "threads": [{"tid": 11, "calls": [{"api": "NtClose", "time": 1.2}]}]}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::features::trace_source::ports::{MachineRecord, ProcessRecord, SourceError, TraceSource};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceReport {
    #[serde(default)]
    pub host: MachineRecord,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub machines: Vec<MachineRecord>,
    #[serde(default)]
    pub sample: Option<String>,
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

impl TraceReport {
    pub fn from_json_str(raw: &str) -> Result<Self, SourceError> {
        let mut report: TraceReport = serde_json::from_str(raw)?;
        report.tag_locations();
        Ok(report)
    }

    /// Stamp every call with its (process index, call index) position
    pub fn tag_locations(&mut self) {
        for (pi, process) in self.processes.iter_mut().enumerate() {
            let mut ci = 0;
            for thread in process.threads.iter_mut() {
                for call in thread.calls.iter_mut() {
                    Arc::make_mut(call).location = (pi, ci);
                    ci += 1;
                }
            }
        }
    }

    /// Parent record: same PID as `ppid`, latest start not after the child
    fn parent_of(&self, child: &ProcessRecord) -> Option<&ProcessRecord> {
        let ppid = child.ppid?;
        self.processes
            .iter()
            .filter(|p| p.pid == ppid && !std::ptr::eq(*p, child))
            .filter(|p| match (p.start, child.start) {
                (Some(parent_start), Some(child_start)) => parent_start <= child_start,
                _ => true,
            })
            .max_by(|a, b| {
                a.start
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&b.start.unwrap_or(f64::NEG_INFINITY))
            })
    }
}

impl TraceSource for TraceReport {
    fn host(&self) -> &MachineRecord {
        &self.host
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn machines(&self) -> &[MachineRecord] {
        &self.machines
    }

    fn process_tree(&self) -> Vec<(Option<&ProcessRecord>, &ProcessRecord)> {
        self.processes
            .iter()
            .map(|process| (self.parent_of(process), process))
            .collect()
    }

    fn sample_file_path(&self) -> Result<String, SourceError> {
        self.sample
            .clone()
            .filter(|path| !path.is_empty())
            .ok_or_else(|| SourceError::NoSample("report carries no sample path".to_string()))
    }
}

/// Pick a parser for `path` and decode it
///
/// Only JSON reports are understood; anything else is a structural error.
pub fn open_report(path: impl AsRef<Path>) -> Result<TraceReport, SourceError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: shown.clone(),
        source,
    })?;

    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let by_content = raw.trim_start().starts_with('{');
    if !by_extension && !by_content {
        return Err(SourceError::UnknownFormat(shown));
    }

    debug!(path = %shown, bytes = raw.len(), "Decoding JSON trace report");
    TraceReport::from_json_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REPORT: &str = r#"{
        "host": {"address": "192.168.56.101", "hostname": "box"},
        "platform": "windows",
        "processes": [
            {"pid": 10, "start": 1.0, "threads": [
                {"tid": 11, "calls": [{"api": "A", "time": 1.1}, {"api": "B", "time": 1.2}]},
                {"tid": 12, "calls": [{"api": "C", "time": 1.3, "status": false}]}
            ]},
            {"pid": 20, "ppid": 10, "start": 2.0}
        ]
    }"#;

    #[test]
    fn test_decode_and_tag_locations() {
        let report = TraceReport::from_json_str(REPORT).unwrap();
        let calls: Vec<_> = report.processes[0]
            .threads
            .iter()
            .flat_map(|t| t.calls.iter())
            .collect();
        assert_eq!(calls[2].location, (0, 2));
        assert!(calls[0].status);
        assert!(!calls[2].status);
        assert_eq!(report.processes[0].call_count(), 3);
    }

    #[test]
    fn test_process_tree_pairs() {
        let report = TraceReport::from_json_str(REPORT).unwrap();
        let tree = report.process_tree();
        assert!(tree[0].0.is_none());
        assert_eq!(tree[1].0.map(|p| p.pid), Some(10));
        assert!(report.sample_file_path().is_err());
    }

    #[test]
    fn test_open_rejects_unknown_format() {
        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        write!(file, "<report/>").unwrap();
        let err = open_report(file.path()).unwrap_err();
        assert!(matches!(err, SourceError::UnknownFormat(_)));
    }

    #[test]
    fn test_open_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", REPORT).unwrap();
        let report = open_report(file.path()).unwrap();
        assert_eq!(report.platform, "windows");
    }
}
