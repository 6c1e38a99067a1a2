// Imports package
//
// Modules a process links statically (from the trace's import list, attached
// during graph building) or loads at run time. Each Import points at the
// File it maps, so the filesystem tree places it like any other file.

pub mod application;
pub mod domain;

pub use application::{attach_static, import_vertex};
pub use domain::resolve_module;

use crate::pipeline::Toolchain;

pub fn load(toolchain: &Toolchain) {
    application::register(toolchain.dispatch());
}
