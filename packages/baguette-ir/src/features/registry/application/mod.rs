pub mod handlers;
pub mod path_links;

pub use handlers::ensure_key;
