// Registry package
//
// Keys, versioned value entries and the handles processes hold on keys.
// Entry versions form `ChangesTowards` chains: observing an unchanged value
// reuses the latest version, a different value (or any value after a
// deletion) creates the next one. The finalizer links entries whose content
// names an observed file or directory.

pub mod application;
pub mod domain;

pub use domain::{predefined_root, EntryVersions, KeyHandles, KeyPath};

use crate::pipeline::Toolchain;

pub fn load(toolchain: &Toolchain) {
    application::handlers::register(toolchain.dispatch());
    toolchain.add_finalizer("registry-path-links", application::path_links::link_paths);
}
