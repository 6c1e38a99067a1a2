//! Crate-level error type
//!
//! Each layer keeps its own error enum; this one joins them for callers that
//! drive a whole compile (load config, open trace, build, filter).

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::filters::FilterError;
use crate::features::trace_source::SourceError;
use crate::pipeline::PipelineError;
use crate::shared::models::StoreError;

#[derive(Debug, Error)]
pub enum BaguetteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trace source error: {0}")]
    Source(#[from] SourceError),

    #[error("Build failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Graph store error: {0}")]
    Store(#[from] StoreError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BaguetteError>;
