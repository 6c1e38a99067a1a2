pub mod key_path;
pub mod state;

pub use key_path::{predefined_root, KeyPath};
pub use state::{EntryVersions, KeyHandles};
