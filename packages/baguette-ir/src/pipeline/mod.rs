//! Build pipeline
//!
//! `Builder` runs the phase state machine over a trace; type packages plug
//! into it through the `Toolchain` (dispatch table, phase bus, finalizer
//! reservations) and mutate the `BuildContext` it threads through.

pub mod builder;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod phase;
pub mod progress;
pub mod toolchain;

pub use builder::{is_significant, Baguette, Builder};
pub use context::{BuildContext, Invocation, BUILDER_KEY, PLATFORM_KEY};
pub use dispatch::{DispatchTable, Handler, MatchKey};
pub use error::{PipelineError, PipelineResult};
pub use phase::{BuildingPhase, PhaseReservations, BUILDING_PHASE};
pub use progress::Progress;
pub use toolchain::Toolchain;
