//! Building phases
//!
//! Every major phase is announced on the toolchain's bus as a
//! [`BuildingPhase`]. Finalizer rounds repeat the `Finalizer` phase with an
//! increasing `minor` index; type packages reserve an index once, at load
//! time, through [`PhaseReservations`].

use parking_lot::Mutex;
use std::any::Any;

use crate::shared::events::{Event, EventClass, EVENT};

pub static BUILDING_PHASE: EventClass = EventClass::derive("BuildingPhase", &EVENT);

pub const INITIALIZATION: &str = "Initialization";
pub const NETWORK_DISCOVERY: &str = "Network Discovery";
pub const INPUT_PARSING: &str = "Input Parsing";
pub const GRAPH_BUILDING: &str = "Graph Building";
pub const CALL_ORDERING: &str = "Call Ordering";
pub const CALL_INTERPRETATION: &str = "Call Interpretation";
pub const PROCESS_ATTRIBUTION: &str = "Process Attribution";
pub const CALL_SKIP_LINKING: &str = "Call Skip-Linking";
pub const FINALIZER: &str = "Finalizer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingPhase {
    pub major: &'static str,
    pub minor: usize,
}

impl BuildingPhase {
    pub fn new(major: &'static str, minor: usize) -> Self {
        Self { major, minor }
    }

    #[inline]
    pub fn is_finalizer(&self, index: usize) -> bool {
        self.major == FINALIZER && self.minor == index
    }
}

impl Event for BuildingPhase {
    fn class(&self) -> &'static EventClass {
        &BUILDING_PHASE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Finalizer round counter
///
/// Its final value is the number of `Finalizer` rounds a build runs.
#[derive(Debug, Default)]
pub struct PhaseReservations {
    count: Mutex<usize>,
}

impl PhaseReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next finalizer index
    pub fn request_finalizing_phase(&self) -> usize {
        let mut count = self.count.lock();
        let index = *count;
        *count += 1;
        index
    }

    pub fn count(&self) -> usize {
        *self.count.lock()
    }
}
