//! Trace builders

use baguette_ir::features::trace_source::{
    CallRecord, ImportRecord, MachineRecord, ProcessRecord, ThreadRecord, TraceReport,
};
use serde_json::Value;
use std::sync::Arc;

/// One call with JSON-object arguments
pub fn call(api: &str, time: f64, arguments: Value) -> Arc<CallRecord> {
    let arguments = match arguments {
        Value::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };
    Arc::new(CallRecord {
        api: api.to_string(),
        arguments,
        time,
        ..CallRecord::default()
    })
}

/// Same as `call`, with a failing status
pub fn failed_call(api: &str, time: f64, arguments: Value) -> Arc<CallRecord> {
    let mut record = call(api, time, arguments);
    Arc::make_mut(&mut record).status = false;
    record
}

pub fn thread(tid: u32, calls: Vec<Arc<CallRecord>>) -> ThreadRecord {
    ThreadRecord {
        tid,
        start: calls.first().map(|c| c.time),
        stop: None,
        calls,
    }
}

/// Builder for ProcessRecord
#[derive(Debug, Default)]
pub struct ProcessBuilder {
    record: ProcessRecord,
}

impl ProcessBuilder {
    pub fn new(pid: u32) -> Self {
        Self {
            record: ProcessRecord {
                pid,
                ..ProcessRecord::default()
            },
        }
    }

    pub fn parent(mut self, ppid: u32) -> Self {
        self.record.ppid = Some(ppid);
        self
    }

    pub fn executable(mut self, path: &str) -> Self {
        self.record.executable = Some(path.to_string());
        self.record.command_line = vec![path.to_string()];
        self
    }

    pub fn start(mut self, time: f64) -> Self {
        self.record.start = Some(time);
        self
    }

    pub fn import(mut self, path: &str) -> Self {
        self.record.imports.push(ImportRecord {
            path: path.to_string(),
            size: None,
        });
        self
    }

    pub fn thread(mut self, thread: ThreadRecord) -> Self {
        self.record.threads.push(thread);
        self
    }

    pub fn build(self) -> ProcessRecord {
        self.record
    }
}

/// Builder for TraceReport
#[derive(Debug)]
pub struct TraceBuilder {
    report: TraceReport,
}

impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceBuilder {
    /// Windows trace recorded on 192.168.56.101
    pub fn new() -> Self {
        Self {
            report: TraceReport {
                host: MachineRecord {
                    address: "192.168.56.101".to_string(),
                    hostname: "sandbox".to_string(),
                    domain: String::new(),
                },
                platform: "windows".to_string(),
                ..TraceReport::default()
            },
        }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.report.platform = platform.to_string();
        self
    }

    pub fn machine(mut self, address: &str) -> Self {
        self.report.machines.push(MachineRecord {
            address: address.to_string(),
            ..MachineRecord::default()
        });
        self
    }

    pub fn sample(mut self, path: &str) -> Self {
        self.report.sample = Some(path.to_string());
        self
    }

    pub fn process(mut self, process: ProcessBuilder) -> Self {
        self.report.processes.push(process.build());
        self
    }

    pub fn build(mut self) -> TraceReport {
        self.report.tag_locations();
        self.report
    }
}
