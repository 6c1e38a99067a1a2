pub mod handlers;
pub mod tree;
