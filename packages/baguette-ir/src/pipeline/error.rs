//! Typed build errors
//!
//! Two families matter to the builder:
//! - source-data errors: a call references a handle, path or process the
//!   trace never introduced. The dispatch table logs them and skips the call.
//! - everything else is structural and aborts the build.

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::trace_source::SourceError;
use crate::shared::events::EventError;
use crate::shared::models::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A call refers to something the trace does not explain
    #[error("Unusable call data in {api}: {reason}")]
    SourceData { api: String, reason: String },

    /// Graph store misuse or a broken structural expectation
    #[error("Graph store error: {0}")]
    Store(#[from] StoreError),

    /// The trace source could not be read or decoded
    #[error("Trace source error: {0}")]
    Source(#[from] SourceError),

    /// One or more phase callbacks failed
    #[error("Phase callbacks failed: {0}")]
    Callbacks(#[from] EventError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Phase logic found the graph in a state it cannot continue from
    #[error("Structural error during {phase}: {reason}")]
    Structural { phase: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn source_data(api: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceData {
            api: api.into(),
            reason: reason.into(),
        }
    }

    pub fn structural(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Structural {
            phase: phase.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Whether the build must stop
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SourceData { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::SourceData { .. } => "source_data",
            Self::Store(_) => "store",
            Self::Source(_) => "source",
            Self::Callbacks(_) => "callbacks",
            Self::Config(_) => "config",
            Self::Structural { .. } => "structural",
            Self::Internal(_) => "internal",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
