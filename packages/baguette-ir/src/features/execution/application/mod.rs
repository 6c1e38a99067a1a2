pub mod handlers;
pub mod phantoms;
