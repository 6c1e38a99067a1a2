pub mod json_report;

pub use json_report::{open_report, TraceReport};
