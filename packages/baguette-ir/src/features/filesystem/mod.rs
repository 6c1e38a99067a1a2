// Filesystem package
//
// Files, directories and the handles processes hold on them. Call handlers
// track the handle lifecycle (create/open -> read/write -> close); the
// finalizer promotes files that turned out to be directories and assembles
// the tree: Host -HasDrive-> root -Contains-> ... -Contains-> entry.

pub mod application;
pub mod domain;

pub use application::handlers::{declare_existing, touch_path, FileHandles};
pub use application::tree::walk;
pub use domain::FsPath;

use crate::pipeline::Toolchain;

pub fn load(toolchain: &Toolchain) {
    application::handlers::register(toolchain.dispatch());
    toolchain.add_finalizer("filesystem-tree", application::tree::build_tree);
}
