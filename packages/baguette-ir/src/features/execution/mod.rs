// Execution package
//
// Processes, threads and the calls that create or open them. Contributes the
// phantom-process finalizer: placeholder processes created for PIDs the trace
// only mentions are dropped unless they carry calls of their own.

pub mod application;
pub mod domain;

pub use domain::ProcessHandles;

use crate::pipeline::Toolchain;

pub fn load(toolchain: &Toolchain) {
    application::handlers::register(toolchain.dispatch());
    toolchain.add_finalizer("phantom-processes", application::phantoms::remove_phantoms);
}
