//! Feature modules
//!
//! - trace_source/ - the trace port and the JSON report adapter
//! - execution/, filesystem/, imports/, registry/, network/ - type packages.
//!   Each contributes vertex and edge semantics, call handlers and optional
//!   finalizer rounds through `load(&Toolchain)`.
//! - filters/ - named graph filters applied after compilation

pub mod trace_source;

// Type packages, in standard load order
pub mod execution;
pub mod filesystem;
pub mod imports;
pub mod registry;
pub mod network;

pub mod filters;
