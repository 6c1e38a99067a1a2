//! Trace source port
//!
//! The builder consumes an abstract recorded execution trace. Vendor report
//! decoders live outside this crate; the JSON trace report adapter is the
//! neutral format used by the CLI and the tests.

pub mod infrastructure;
pub mod ports;

pub use infrastructure::{open_report, TraceReport};
pub use ports::{
    CallRecord, ImportRecord, MachineRecord, ProcessRecord, SourceError, ThreadRecord,
    TraceSource,
};
