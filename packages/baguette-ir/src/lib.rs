/*
 * Baguette IR - behavior graphs from sandbox execution traces
 *
 * Feature-First Architecture:
 * - shared/      : Graph store, vertex/edge models, event bus, argument helpers
 * - features/    : Trace source + type packages (execution, filesystem,
 *                  imports, registry, network) + filter layer
 * - pipeline/    : Builder phase machine, call dispatch, toolchain
 * - config/      : BuildConfig (YAML)
 */

#![allow(clippy::type_complexity)] // Handler and callback signatures
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Trace source, type packages and filters
pub mod features;

/// Build pipeline
pub mod pipeline;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::BuildConfig;
pub use errors::{BaguetteError, Result};
pub use features::filters::{Filter, FilterRegistry};
pub use features::trace_source::{open_report, TraceReport, TraceSource};
pub use pipeline::{Baguette, Builder, Toolchain};
pub use shared::models::{EdgeKind, GraphId, Store, VertexId, VertexKind};

/// Compile a trace with the standard toolchain and the given configuration
pub fn compile(source: &dyn TraceSource, config: BuildConfig) -> Result<Baguette> {
    Ok(Builder::new(Toolchain::global(), config).build(source)?)
}
