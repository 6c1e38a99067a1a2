//! Shared building blocks used by the pipeline and every type package

pub mod events;
pub mod models;
pub mod utils;
