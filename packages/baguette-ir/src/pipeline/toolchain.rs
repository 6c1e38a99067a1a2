// Toolchain
//
// What type packages contribute to every build: call handlers in the
// dispatch table, callbacks on the phase bus and reserved finalizer rounds.
// Packages only talk to each other through the graph and through this bus.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

use super::context::BuildContext;
use super::dispatch::DispatchTable;
use super::error::PipelineResult;
use super::phase::{BuildingPhase, PhaseReservations, BUILDING_PHASE};
use crate::features::{execution, filesystem, imports, network, registry};
use crate::shared::events::{CallbackError, EventBus};

static GLOBAL: Lazy<Arc<Toolchain>> = Lazy::new(|| Arc::new(Toolchain::standard()));

#[derive(Debug, Default)]
pub struct Toolchain {
    dispatch: DispatchTable,
    bus: EventBus<BuildContext>,
    reservations: PhaseReservations,
}

impl Toolchain {
    /// No packages loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Execution, filesystem, imports, registry and network, in that order
    pub fn standard() -> Self {
        let toolchain = Self::new();
        execution::load(&toolchain);
        filesystem::load(&toolchain);
        imports::load(&toolchain);
        registry::load(&toolchain);
        network::load(&toolchain);
        debug!(
            handlers = toolchain.dispatch.registration_count(),
            finalizers = toolchain.reservations.count(),
            "Loaded standard type packages"
        );
        toolchain
    }

    /// Process-wide standard toolchain, built on first use
    pub fn global() -> Arc<Toolchain> {
        Arc::clone(&GLOBAL)
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn bus(&self) -> &EventBus<BuildContext> {
        &self.bus
    }

    pub fn reservations(&self) -> &PhaseReservations {
        &self.reservations
    }

    /// Reserve a finalizer round and run `pass` when it comes
    ///
    /// Returns the reserved round index.
    pub fn add_finalizer<F>(&self, name: &'static str, pass: F) -> usize
    where
        F: Fn(&mut BuildContext) -> PipelineResult<()> + Send + Sync + 'static,
    {
        let index = self.reservations.request_finalizing_phase();
        self.bus.add_callback(&BUILDING_PHASE, move |ctx, event| {
            let Some(phase) = event.downcast_ref::<BuildingPhase>() else {
                return Ok(());
            };
            if !phase.is_finalizer(index) {
                return Ok(());
            }
            debug!(finalizer = name, round = index, "Running finalizer");
            pass(ctx).map_err(|err| Box::new(err) as CallbackError)
        });
        index
    }
}
